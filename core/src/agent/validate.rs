//! Ability validation for proposed steps

use super::answer::{ability_from_value, PlannedStep, ProposedStep};
use crate::abilities::AbilityRegistry;
use serde_json::Value;
use std::fmt;

/// Why a proposed step's ability cannot be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbilityViolation {
    /// No `ability`, or an empty one
    Missing { step: String },
    NotAnObject { step: String },
    MissingName { step: String },
    /// `args` present but not an object
    InvalidArgs { step: String },
    Unknown {
        step: String,
        name: String,
        known: Vec<String>,
    },
}

impl fmt::Display for AbilityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbilityViolation::Missing { step } => {
                write!(f, "No ability found in step {}", step)
            }
            AbilityViolation::NotAnObject { step } => write!(
                f,
                "The ability in step {} must be an object with a name and args",
                step
            ),
            AbilityViolation::MissingName { step } => {
                write!(f, "The ability in step {} has no string name", step)
            }
            AbilityViolation::InvalidArgs { step } => {
                write!(f, "The ability args in step {} must be an object", step)
            }
            AbilityViolation::Unknown { step, name, known } => write!(
                f,
                "Ability {} in step {} does not exist, valid abilities are: [{}]",
                name,
                step,
                known.join(", ")
            ),
        }
    }
}

/// `null`, `""`, `{}`, `[]` and `false` all count as no ability
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}

/// Collect the problems with a proposed step's ability; empty means usable
pub fn validate_ability(step: &ProposedStep, registry: &AbilityRegistry) -> Vec<AbilityViolation> {
    let name = step.display_name().to_string();

    let ability = match &step.ability {
        Some(value) if !is_blank(value) => value,
        _ => return vec![AbilityViolation::Missing { step: name }],
    };

    let Some(object) = ability.as_object() else {
        return vec![AbilityViolation::NotAnObject { step: name }];
    };

    let Some(ability_name) = object.get("name").and_then(Value::as_str) else {
        return vec![AbilityViolation::MissingName { step: name }];
    };

    let mut violations = Vec::new();
    if !matches!(object.get("args"), None | Some(Value::Null) | Some(Value::Object(_))) {
        violations.push(AbilityViolation::InvalidArgs { step: name.clone() });
    }
    if !registry.contains(ability_name) {
        violations.push(AbilityViolation::Unknown {
            step: name,
            name: ability_name.to_string(),
            known: registry
                .ability_names()
                .into_iter()
                .map(String::from)
                .collect(),
        });
    }
    violations
}

/// Validate a proposed step and turn it into a [`PlannedStep`]
pub fn plan_step(
    step: &ProposedStep,
    registry: &AbilityRegistry,
) -> Result<PlannedStep, Vec<AbilityViolation>> {
    let violations = validate_ability(step, registry);
    if !violations.is_empty() {
        return Err(violations);
    }

    let ability = step
        .ability
        .as_ref()
        .and_then(ability_from_value)
        .ok_or_else(|| {
            vec![AbilityViolation::NotAnObject {
                step: step.display_name().to_string(),
            }]
        })?;

    Ok(PlannedStep {
        name: step.name.clone(),
        description: step.description.clone().unwrap_or_default(),
        ability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::LocalWorkspace;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> AbilityRegistry {
        AbilityRegistry::with_builtin(Arc::new(LocalWorkspace::new("unused")))
    }

    fn step(ability: Option<Value>) -> ProposedStep {
        ProposedStep {
            name: Some("Write".to_string()),
            description: Some("write hello.txt".to_string()),
            ability,
        }
    }

    #[test]
    fn test_each_violation_has_its_own_message() {
        let registry = registry();

        let cases = vec![
            (step(None), "No ability found in step Write"),
            (step(Some(json!({}))), "No ability found in step Write"),
            (
                step(Some(json!("write_file"))),
                "The ability in step Write must be an object with a name and args",
            ),
            (
                step(Some(json!({"args": {}}))),
                "The ability in step Write has no string name",
            ),
            (
                step(Some(json!({"name": "launch_rocket"}))),
                "Ability launch_rocket in step Write does not exist, valid abilities are: \
                 [finish, list_files, read_file, write_file]",
            ),
        ];

        for (proposed, expected) in cases {
            let violations = validate_ability(&proposed, &registry);
            assert_eq!(violations.len(), 1, "{:?}", proposed);
            assert_eq!(violations[0].to_string(), expected);
        }
    }

    #[test]
    fn test_valid_step_becomes_planned() {
        let registry = registry();
        let proposed = step(Some(json!({
            "name": "write_file",
            "args": {"file_path": "hello.txt", "data": "hi"}
        })));

        assert!(validate_ability(&proposed, &registry).is_empty());
        let planned = plan_step(&proposed, &registry).unwrap();
        assert_eq!(planned.ability.name, "write_file");
        assert_eq!(planned.description, "write hello.txt");
    }

    #[test]
    fn test_non_object_args_rejected() {
        let registry = registry();
        let proposed = step(Some(json!({"name": "finish", "args": "done"})));
        let violations = plan_step(&proposed, &registry).unwrap_err();
        assert_eq!(
            violations,
            vec![AbilityViolation::InvalidArgs {
                step: "Write".to_string()
            }]
        );
    }
}
