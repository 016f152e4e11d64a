//! Base ability trait and descriptors

use crate::error::{AbilityError, Result};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Everything an ability may touch while it runs
#[derive(Clone)]
pub struct AbilityContext {
    pub task_id: String,
    pub workspace: Arc<dyn Workspace>,
}

/// Trait for all abilities
#[async_trait]
pub trait Ability: Send + Sync {
    /// Name used by the model to refer to this ability
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn category(&self) -> &str {
        "general"
    }

    fn parameters(&self) -> Vec<AbilityParameter>;

    /// Type name of the value `run` produces, shown in prompts
    fn output_type(&self) -> &str;

    /// Run the ability with already validated arguments
    async fn run(&self, ctx: &AbilityContext, args: &Map<String, Value>) -> Result<Value>;
}

/// One argument accepted by an ability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityParameter {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub required: bool,
}

impl AbilityParameter {
    pub fn required<S: Into<String>>(name: S, param_type: S, description: S) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type: param_type.into(),
            required: true,
        }
    }

    pub fn optional<S: Into<String>>(name: S, param_type: S, description: S) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Serializable summary of a registered ability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDescriptor {
    pub name: String,
    pub description: String,
    pub category: String,
    pub parameters: Vec<AbilityParameter>,
    pub output_type: String,
}

impl AbilityDescriptor {
    pub fn from_ability(ability: &dyn Ability) -> Self {
        Self {
            name: ability.name().to_string(),
            description: ability.description().to_string(),
            category: ability.category().to_string(),
            parameters: ability.parameters(),
            output_type: ability.output_type().to_string(),
        }
    }
}

/// Renders as `name: description. Params: (a: string, b: int) -> output`
impl fmt::Display for AbilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.param_type))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "{}: {}. Params: ({}) -> {}",
            self.name, self.description, params, self.output_type
        )
    }
}

/// Fetch a string argument, reporting a missing or mistyped value against `ability`
pub(crate) fn string_arg<'a>(
    ability: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AbilityError::InvalidArguments {
                name: ability.to_string(),
                message: format!("'{}' must be a string", key),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_prompt_format() {
        let descriptor = AbilityDescriptor {
            name: "write_file".to_string(),
            description: "Write data to a file".to_string(),
            category: "file_system".to_string(),
            parameters: vec![
                AbilityParameter::required("file_path", "string", "Path to the file"),
                AbilityParameter::required("data", "string", "Data to write"),
            ],
            output_type: "None".to_string(),
        };

        assert_eq!(
            descriptor.to_string(),
            "write_file: Write data to a file. Params: (file_path: string, data: string) -> None"
        );
    }

    #[test]
    fn test_string_arg() {
        let args = serde_json::json!({"path": "a.txt", "count": 3});
        let args = args.as_object().unwrap();

        assert_eq!(string_arg("read_file", args, "path").unwrap(), "a.txt");
        assert!(string_arg("read_file", args, "count").is_err());
        assert!(string_arg("read_file", args, "missing").is_err());
    }
}
