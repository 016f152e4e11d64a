//! Model answers: the JSON shape the planner and reviewer reply with

use crate::store::AbilityRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// Raw answer as the model sent it; every field is optional until validated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelAnswer {
    #[serde(default)]
    pub thoughts: Option<Thoughts>,

    #[serde(default)]
    pub steps: Option<Vec<ProposedStep>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thoughts {
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub criticism: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub speak: Option<String>,
    /// Free-form; models send either a string or a list
    #[serde(default)]
    pub plan: Option<Value>,
}

impl Thoughts {
    /// Log whichever thoughts were provided
    pub fn log(&self) {
        let mut lines = String::new();
        for (label, value) in [
            ("Reasoning", &self.reasoning),
            ("Criticism", &self.criticism),
            ("Text", &self.text),
            ("Speak", &self.speak),
        ] {
            if let Some(value) = value {
                lines.push_str(&format!("\n\t{}: {}", label, value));
            }
        }
        info!("Thoughts:{}", lines);
    }
}

/// A step as proposed by the model, before its ability is checked
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposedStep {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, alias = "input")]
    pub description: Option<String>,

    #[serde(default)]
    pub ability: Option<Value>,
}

impl ProposedStep {
    /// Name used in log lines and violation messages
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// A proposed step whose ability passed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    pub name: Option<String>,
    pub description: String,
    pub ability: AbilityRef,
}

/// Answer with every step validated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedAnswer {
    pub thoughts: Option<Thoughts>,
    pub steps: Vec<PlannedStep>,
}

impl ValidatedAnswer {
    /// Text of the model's thoughts, empty when absent
    pub fn thoughts_text(&self) -> String {
        self.thoughts
            .as_ref()
            .and_then(|t| t.text.clone())
            .unwrap_or_default()
    }
}

/// Parse a reply as JSON, tolerating Markdown code fences and surrounding prose.
///
/// The error from parsing the reply as-is is returned when nothing parses.
pub fn parse_json(content: &str) -> Result<Value, serde_json::Error> {
    let trimmed = content.trim();

    let strict_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if trimmed.starts_with("```") {
        let stripped = trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```JSON")
            .trim_start_matches("```");
        if let Some(end) = stripped.rfind("```") {
            if let Ok(value) = serde_json::from_str::<Value>(stripped[..end].trim()) {
                return Ok(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(strict_error)
}

/// Parse a reply into a [`ModelAnswer`]; a JSON value of the wrong shape is an error too
pub fn parse_answer(content: &str) -> Result<ModelAnswer, serde_json::Error> {
    serde_json::from_value(parse_json(content)?)
}

/// Convert an ability value into an [`AbilityRef`] when it has a string name
/// and, if present, object arguments
pub(crate) fn ability_from_value(value: &Value) -> Option<AbilityRef> {
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?;
    let args = match object.get("args") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(_) => return None,
    };
    Some(AbilityRef::new(name, args))
}
