//! Second opinion on a step's ability right before it runs

use super::answer::{ability_from_value, parse_json};
use super::core::{StepAgent, StepSummary};
use crate::error::Result;
use crate::llm::LlmMessage;
use crate::prompt::RUN_ABILITY;
use crate::store::{AbilityRef, Step};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Serialize)]
struct RunAbilitySystemPrompt<'a> {
    abilities: String,
    previous_steps: Vec<StepSummary<'a>>,
}

#[derive(Serialize)]
struct RunAbilityUserPrompt<'a> {
    ability: String,
    previous_steps: Vec<StepSummary<'a>>,
}

impl StepAgent {
    /// Ask the model to confirm or correct `ability` given the completed steps.
    ///
    /// A suggestion naming a registered ability replaces the original; any
    /// other outcome, chat failures included, keeps the original.
    pub async fn review_ability(
        &self,
        task_id: &str,
        ability: &AbilityRef,
        previous: &[Step],
    ) -> Result<AbilityRef> {
        let system_prompt = self.prompts.run_ability.load_prompt(
            "system-prompt",
            &RunAbilitySystemPrompt {
                abilities: self.abilities.list_abilities_for_prompt(),
                previous_steps: previous.iter().map(StepSummary::of).collect(),
            },
        )?;
        let ability_prompt = self.prompts.run_ability.load_prompt(
            "user-prompt",
            &RunAbilityUserPrompt {
                ability: serde_json::to_string(ability)?,
                previous_steps: previous.iter().map(StepSummary::of).collect(),
            },
        )?;

        let messages = vec![
            LlmMessage::system(system_prompt),
            LlmMessage::user(ability_prompt),
        ];
        let response = match self.chat(task_id, RUN_ABILITY, messages).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Unable to review ability {}: {}", ability.name, e);
                return Ok(ability.clone());
            }
        };

        let suggestion = match parse_json(response.content()) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Unable to parse ability review {:?}: {}",
                    response.content(),
                    e
                );
                return Ok(ability.clone());
            }
        };

        match ability_from_value(&suggestion) {
            Some(candidate) if self.abilities.contains(&candidate.name) => {
                if candidate != *ability {
                    info!("Update ability {} with {}", ability.name, candidate.name);
                }
                Ok(candidate)
            }
            _ => {
                warn!("Invalid ability suggestion: {}", suggestion);
                Ok(ability.clone())
            }
        }
    }
}
