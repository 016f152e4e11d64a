//! Sentinel ability that ends a task

use crate::abilities::base::{string_arg, Ability, AbilityContext, AbilityParameter};
use crate::abilities::FINISH_ABILITY;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Marks the task as done. The agent intercepts it before dispatch; running it
/// directly just echoes the reason.
pub struct FinishAbility;

#[async_trait]
impl Ability for FinishAbility {
    fn name(&self) -> &str {
        FINISH_ABILITY
    }

    fn description(&self) -> &str {
        "Use this to shut down once you have accomplished all of your goals, \
         or when there are insurmountable problems that make it impossible \
         for you to finish your task."
    }

    fn category(&self) -> &str {
        "system"
    }

    fn parameters(&self) -> Vec<AbilityParameter> {
        vec![AbilityParameter::required(
            "reason",
            "string",
            "A summary to the user of how the goals were accomplished",
        )]
    }

    fn output_type(&self) -> &str {
        "None"
    }

    async fn run(&self, _ctx: &AbilityContext, args: &Map<String, Value>) -> Result<Value> {
        Ok(Value::String(
            string_arg(FINISH_ABILITY, args, "reason")?.to_string(),
        ))
    }
}
