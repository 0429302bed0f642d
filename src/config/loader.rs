use std::path::{Path, PathBuf};

use super::error::HiveSpecError;
use super::hive_spec::HiveSpec;

pub trait HiveSpecLoader {
    fn load(&self) -> Result<HiveSpec, HiveSpecError>;
}

pub struct HiveSpecLoaderFile {
    file_path: PathBuf,
}

impl HiveSpecLoaderFile {
    pub fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
        }
    }
}

impl HiveSpecLoader for HiveSpecLoaderFile {
    fn load(&self) -> Result<HiveSpec, HiveSpecError> {
        let f = std::fs::File::open(&self.file_path)?;
        let spec: HiveSpec = serde_yaml::from_reader(f)?;
        spec.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::hive_spec::RestartPolicy;

    fn load_str(yaml: &str) -> Result<HiveSpec, HiveSpecError> {
        let mut tmp_file = NamedTempFile::new().unwrap();
        write!(tmp_file, "{}", yaml).unwrap();
        HiveSpecLoaderFile::new(tmp_file.path()).load()
    }

    #[test]
    fn load_full_spec() {
        let spec = load_str(
            r#"
kind: Hive
metadata:
  name: demo
spec:
  processes:
    - name: sleeper
      forwardOsEnv: true
      env:
        - name: GREETING
          value: hello
        - name: TOKEN
          valueFrom:
            secretKeyRef:
              name: vault
              key: token
      cmd: ["sleep", "{unique-in-sequence:1-3}"]
      restart: Always
      replicas: 3
    - name: one-shot
      cmd: ["true"]
      restart: Never
"#,
        )
        .unwrap();

        assert_eq!("Hive", spec.kind);
        assert_eq!("demo", spec.metadata.name);
        assert_eq!(2, spec.spec.processes.len());

        let sleeper = &spec.spec.processes[0];
        assert!(sleeper.forward_os_env);
        assert_eq!(3, sleeper.replicas);
        assert_eq!(RestartPolicy::Always, sleeper.restart);
        assert_eq!(2, sleeper.env.len());
        assert_eq!(Some("hello".to_string()), sleeper.env[0].value);
        let secret = sleeper.env[1]
            .value_from
            .as_ref()
            .and_then(|s| s.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!("vault", secret.name);
        assert_eq!("token", secret.key);

        // replicas defaults to 0, forwardOsEnv to false
        let one_shot = &spec.spec.processes[1];
        assert_eq!(0, one_shot.replicas);
        assert!(!one_shot.forward_os_env);
    }

    #[test]
    fn unknown_restart_policy_is_rejected() {
        let result = load_str(
            r#"
spec:
  processes:
    - name: p
      cmd: ["true"]
      restart: WheneverConvenient
      replicas: 1
"#,
        );
        assert!(matches!(result, Err(HiveSpecError::SerdeYamlError(_))));
    }

    #[test]
    fn missing_restart_policy_is_rejected() {
        let result = load_str(
            r#"
spec:
  processes:
    - name: p
      cmd: ["true"]
      replicas: 1
"#,
        );
        assert!(matches!(result, Err(HiveSpecError::SerdeYamlError(_))));
    }

    #[test]
    fn empty_cmd_is_rejected_at_load() {
        let result = load_str(
            r#"
spec:
  processes:
    - name: armless
      cmd: []
      restart: Never
"#,
        );
        assert!(matches!(result, Err(HiveSpecError::EmptyCmd(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = HiveSpecLoaderFile::new(Path::new("/definitely/not/here.yml")).load();
        assert!(matches!(result, Err(HiveSpecError::IOError(_))));
    }
}
