use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::HiveSpecError;

/// Declarative definition of a group of processes to run on one machine.
/// Executing a `HiveSpec` produces a hive run, which is assigned an id once
/// registered in the store. Immutable after load.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HiveSpec {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub spec: Spec,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Spec {
    #[serde(default)]
    pub processes: Vec<ProcessSpec>,
}

/// One declared kind of process. `replicas` copies of it are materialized
/// per run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProcessSpec {
    pub name: String,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// When true the child inherits the host environment in addition to
    /// the declared `env` pairs.
    #[serde(default, rename = "forwardOsEnv")]
    pub forward_os_env: bool,
    /// Element 0 is the executable, the remainder are argument templates.
    pub cmd: Vec<String>,
    pub restart: RestartPolicy,
    #[serde(default)]
    pub replicas: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(
        default,
        rename = "valueFrom",
        skip_serializing_if = "Option::is_none"
    )]
    pub value_from: Option<EnvVarSource>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnvVarSource {
    #[serde(rename = "secretKeyRef")]
    pub secret_key_ref: Option<SecretKeyRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

/// What to do when a replica's child process terminates. Unknown values are
/// rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
}

impl HiveSpec {
    /// Load-time validation beyond what serde enforces.
    pub(super) fn validate(self) -> Result<Self, HiveSpecError> {
        for process in &self.spec.processes {
            if process.cmd.is_empty() {
                return Err(HiveSpecError::EmptyCmd(process.name.clone()));
            }
        }
        Ok(self)
    }

    /// Total number of replicas this spec materializes.
    pub fn replica_count(&self) -> usize {
        self.spec.processes.iter().map(|p| p.replicas).sum()
    }
}

impl ProcessSpec {
    /// Environment pairs declared by this spec, in declaration order.
    /// Entries carrying only a secret reference are skipped: resolving
    /// secrets is the job of an external collaborator not wired in here.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.env.len());
        for var in &self.env {
            match (&var.value, &var.value_from) {
                (Some(value), _) => pairs.push((var.name.clone(), value.clone())),
                (None, Some(_)) => {
                    warn!(
                        process = %self.name,
                        env = %var.name,
                        "env entry references a secret but no secret resolver is configured, skipping"
                    );
                }
                (None, None) => pairs.push((var.name.clone(), String::new())),
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(name: &str) -> ProcessSpec {
        ProcessSpec {
            name: name.to_string(),
            env: Vec::new(),
            forward_os_env: false,
            cmd: vec!["true".to_string()],
            restart: RestartPolicy::Never,
            replicas: 1,
        }
    }

    #[test]
    fn replica_count_sums_processes() {
        let spec = HiveSpec {
            kind: "Hive".to_string(),
            metadata: Metadata::default(),
            spec: Spec {
                processes: vec![
                    ProcessSpec {
                        replicas: 2,
                        ..process("a")
                    },
                    ProcessSpec {
                        replicas: 3,
                        ..process("b")
                    },
                ],
            },
        };
        assert_eq!(5, spec.replica_count());
    }

    #[test]
    fn env_pairs_keep_declaration_order() {
        let spec = ProcessSpec {
            env: vec![
                EnvVar {
                    name: "A".to_string(),
                    value: Some("1".to_string()),
                    value_from: None,
                },
                EnvVar {
                    name: "B".to_string(),
                    value: Some("2".to_string()),
                    value_from: None,
                },
            ],
            ..process("p")
        };
        assert_eq!(
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "2".to_string())
            ],
            spec.env_pairs()
        );
    }

    #[test]
    fn env_pairs_skip_unresolvable_secret_refs() {
        let spec = ProcessSpec {
            env: vec![
                EnvVar {
                    name: "SECRET".to_string(),
                    value: None,
                    value_from: Some(EnvVarSource {
                        secret_key_ref: Some(SecretKeyRef {
                            name: "vault".to_string(),
                            key: "token".to_string(),
                        }),
                    }),
                },
                EnvVar {
                    name: "EMPTY".to_string(),
                    value: None,
                    value_from: None,
                },
            ],
            ..process("p")
        };
        assert_eq!(vec![("EMPTY".to_string(), String::new())], spec.env_pairs());
    }

    #[test]
    fn empty_cmd_is_rejected() {
        let spec = HiveSpec {
            kind: String::new(),
            metadata: Metadata::default(),
            spec: Spec {
                processes: vec![ProcessSpec {
                    cmd: Vec::new(),
                    ..process("broken")
                }],
            },
        };
        assert!(matches!(
            spec.validate(),
            Err(HiveSpecError::EmptyCmd(name)) if name == "broken"
        ));
    }
}
