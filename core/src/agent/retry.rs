//! Bounded retry around a steps request

use super::answer::{parse_answer, ValidatedAnswer};
use super::core::StepAgent;
use super::validate::{plan_step, AbilityViolation};
use crate::error::{AgentError, Result};
use crate::llm::LlmMessage;
use crate::trajectory::TrajectoryEntry;
use std::fmt;
use tracing::{error, info, warn};

/// Which phase is asking for steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Initial plan; an empty step list is rejected
    Plan,
    /// Review after a step ran; an empty step list keeps the pending steps
    Review,
}

/// Why a reply was not accepted
#[derive(Debug)]
enum Rejection {
    Parse(serde_json::Error),
    NoSteps,
    InvalidAbilities(Vec<AbilityViolation>),
}

impl Rejection {
    /// Message appended to the history before asking again, if any
    fn corrective_message(&self) -> Option<LlmMessage> {
        match self {
            Rejection::Parse(e) => Some(LlmMessage::user(format!(
                "Invalid response. {}. Please try again.",
                e
            ))),
            Rejection::NoSteps => Some(LlmMessage::user("You must provide at least one step.")),
            // the unchanged history is sent once, not appended to itself
            Rejection::InvalidAbilities(_) => None,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Parse(e) => write!(f, "unable to parse response: {}", e),
            Rejection::NoSteps => f.write_str("no steps provided"),
            Rejection::InvalidAbilities(violations) => {
                let messages: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                write!(f, "invalid abilities: {}", messages.join("; "))
            }
        }
    }
}

impl StepAgent {
    /// Send `messages` and return the validated answer, asking again while
    /// the retry budget for `mode` lasts. Transport errors are returned as-is.
    pub(super) async fn request_steps(
        &self,
        task_id: &str,
        purpose: &str,
        mut messages: Vec<LlmMessage>,
        mode: RequestMode,
    ) -> Result<ValidatedAnswer> {
        let budget = match mode {
            RequestMode::Plan => self.config.retry.plan_retries,
            RequestMode::Review => self.config.retry.review_retries,
        };
        let mut retries = 0;

        loop {
            let response = self.chat(task_id, purpose, messages.clone()).await?;
            let rejection = match self.check_answer(response.content(), mode) {
                Ok(answer) => return Ok(answer),
                Err(rejection) => rejection,
            };

            let reason = rejection.to_string();
            if retries >= budget {
                error!(
                    "Retry limit reached for {} after {} attempts, aborting: {}",
                    purpose,
                    retries + 1,
                    reason
                );
                return Err(AgentError::RetryLimitExceeded {
                    attempts: retries + 1,
                    reason,
                }
                .into());
            }

            retries += 1;
            warn!("Rejected {} reply ({}), retry {}/{}", purpose, reason, retries, budget);
            self.record(TrajectoryEntry::retry(task_id, retries, reason))
                .await?;

            if let Some(message) = rejection.corrective_message() {
                messages.push(message);
            }
        }
    }

    fn check_answer(
        &self,
        content: &str,
        mode: RequestMode,
    ) -> std::result::Result<ValidatedAnswer, Rejection> {
        let answer = parse_answer(content).map_err(Rejection::Parse)?;
        let proposed = answer.steps.unwrap_or_default();

        if mode == RequestMode::Plan && proposed.is_empty() {
            return Err(Rejection::NoSteps);
        }

        let mut steps = Vec::with_capacity(proposed.len());
        let mut violations = Vec::new();
        for step in &proposed {
            info!("Validate step {}", step.display_name());
            match plan_step(step, &self.abilities) {
                Ok(planned) => steps.push(planned),
                Err(found) => violations.extend(found),
            }
        }
        if !violations.is_empty() {
            return Err(Rejection::InvalidAbilities(violations));
        }

        match &answer.thoughts {
            Some(thoughts) => thoughts.log(),
            None => info!("No thoughts provided"),
        }

        Ok(ValidatedAnswer {
            thoughts: answer.thoughts,
            steps,
        })
    }
}
