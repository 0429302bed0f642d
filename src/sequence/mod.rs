use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::config::HiveSpec;

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("argument `{template}` cannot be allocated a value, every integer in {from}-{to} is already reserved")]
    Exhausted {
        template: String,
        from: u64,
        to: u64,
    },
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{unique-in-sequence:(?P<from>\d+)-(?P<to>\d+)\}")
            .expect("placeholder regex is valid")
    })
}

/// Resolves `{unique-in-sequence:from-to}` placeholders in an argument
/// template list. A matching element is replaced whole by the smallest
/// integer in the declared range not yet present in `used`; the pick is
/// recorded in `used` so later replicas of the same run cannot reuse it.
/// Non-matching elements pass through unchanged and order is preserved.
pub fn resolve_args(
    templates: &[String],
    used: &mut HashSet<u64>,
) -> Result<Vec<String>, SequenceError> {
    let mut resolved = Vec::with_capacity(templates.len());

    for template in templates {
        let Some(captures) = placeholder().captures(template) else {
            resolved.push(template.clone());
            continue;
        };

        // Bounded by \d+, so the only parse failure mode is overflow;
        // such an element is not a usable placeholder and passes through.
        let (Ok(mut from), Ok(mut to)) = (
            captures["from"].parse::<u64>(),
            captures["to"].parse::<u64>(),
        ) else {
            resolved.push(template.clone());
            continue;
        };
        if from > to {
            std::mem::swap(&mut from, &mut to);
        }

        let pick = (from..=to).find(|candidate| !used.contains(candidate));
        match pick {
            Some(value) => {
                used.insert(value);
                resolved.push(value.to_string());
            }
            None => return Err(exhausted(template, from, to)),
        }
    }

    Ok(resolved)
}

/// Dry resolution pass over every replica of every process, in the same
/// spec-declaration order the supervisor spawns them. Detects
/// over-subscribed sequences before any process is spawned; the `used` set
/// built here is discarded.
pub fn validate_allocation(spec: &HiveSpec) -> Result<(), SequenceError> {
    let mut used = HashSet::new();
    for process in &spec.spec.processes {
        let templates = process.cmd.get(1..).unwrap_or_default();
        for _ in 0..process.replicas {
            resolve_args(templates, &mut used)?;
        }
    }
    Ok(())
}

fn exhausted(template: &str, from: u64, to: u64) -> SequenceError {
    SequenceError::Exhausted {
        template: template.to_string(),
        from,
        to,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::config::{HiveSpec, ProcessSpec, RestartPolicy};

    fn args(templates: &[&str]) -> Vec<String> {
        templates.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn plain_arguments_pass_through() {
        let mut used = HashSet::new();
        let resolved = resolve_args(&args(&["-v", "--port=80"]), &mut used).unwrap();
        assert_eq!(args(&["-v", "--port=80"]), resolved);
        assert!(used.is_empty());
    }

    #[test]
    fn placeholder_takes_smallest_unused() {
        let mut used = HashSet::new();
        let resolved =
            resolve_args(&args(&["{unique-in-sequence:5-7}", "tail"]), &mut used).unwrap();
        assert_eq!(args(&["5", "tail"]), resolved);
        assert!(used.contains(&5));
    }

    #[test]
    fn reversed_bounds_are_normalised() {
        let mut used = HashSet::new();
        let resolved = resolve_args(&args(&["{unique-in-sequence:9-7}"]), &mut used).unwrap();
        assert_eq!(args(&["7"]), resolved);
    }

    #[test]
    fn used_set_is_shared_across_calls() {
        let mut used = HashSet::new();
        let mut picks = Vec::new();
        for _ in 0..3 {
            let resolved = resolve_args(&args(&["{unique-in-sequence:5-7}"]), &mut used).unwrap();
            picks.push(resolved[0].clone());
        }
        assert_eq!(args(&["5", "6", "7"]), picks);
    }

    #[test]
    fn multiple_placeholders_in_one_list() {
        let mut used = HashSet::new();
        let resolved = resolve_args(
            &args(&["{unique-in-sequence:1-2}", "{unique-in-sequence:1-2}"]),
            &mut used,
        )
        .unwrap();
        assert_eq!(args(&["1", "2"]), resolved);
    }

    #[test]
    fn exhausted_range_is_an_error() {
        let mut used = HashSet::from([1, 2]);
        let result = resolve_args(&args(&["{unique-in-sequence:1-2}"]), &mut used);
        assert_matches!(
            result,
            Err(SequenceError::Exhausted { from: 1, to: 2, .. })
        );
    }

    fn spec_with_replicas(replicas: usize, range: &str) -> HiveSpec {
        serde_yaml::from_str::<HiveSpec>(&format!(
            r#"
spec:
  processes:
    - name: worker
      cmd: ["worker", "{range}"]
      restart: Never
      replicas: {replicas}
"#
        ))
        .unwrap()
    }

    #[test]
    fn dry_run_accepts_exactly_fitting_range() {
        let spec = spec_with_replicas(3, "{unique-in-sequence:5-7}");
        assert!(validate_allocation(&spec).is_ok());
    }

    #[test]
    fn dry_run_rejects_over_subscription() {
        let spec = spec_with_replicas(3, "{unique-in-sequence:1-2}");
        assert_matches!(
            validate_allocation(&spec),
            Err(SequenceError::Exhausted { .. })
        );
    }

    fn process(cmd: &[&str], replicas: usize) -> ProcessSpec {
        ProcessSpec {
            name: "p".to_string(),
            env: Vec::new(),
            forward_os_env: false,
            cmd: args(cmd),
            restart: RestartPolicy::Never,
            replicas,
        }
    }

    #[test]
    fn dry_run_allocates_across_specs_in_declaration_order() {
        // Two specs drawing from the same range must fit together.
        let mut spec = spec_with_replicas(2, "{unique-in-sequence:1-3}");
        spec.spec
            .processes
            .push(process(&["other", "{unique-in-sequence:1-3}"], 1));
        assert!(validate_allocation(&spec).is_ok());

        spec.spec
            .processes
            .push(process(&["third", "{unique-in-sequence:1-3}"], 1));
        assert_matches!(
            validate_allocation(&spec),
            Err(SequenceError::Exhausted { .. })
        );
    }
}
