//! Optional persona generated before planning

use super::answer::parse_json;
use super::core::{StepAgent, TaskPrompt};
use crate::error::Result;
use crate::llm::LlmMessage;
use crate::prompt::AGENT_PROFILE;
use crate::store::Task;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// Role the planner is asked to take on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub role: String,
    #[serde(default)]
    pub description: String,
}

impl StepAgent {
    /// Ask the model for a role suited to the task. Failures other than
    /// template errors are logged and yield `None`.
    pub async fn generate_profile(&self, task: &Task) -> Result<Option<AgentProfile>> {
        let system_prompt = self
            .prompts
            .profile
            .load_prompt("system-prompt", &json!({}))?;
        let task_prompt = self
            .prompts
            .profile
            .load_prompt("user-prompt", &TaskPrompt { task: &task.input })?;

        let messages = vec![
            LlmMessage::system(system_prompt),
            LlmMessage::user(task_prompt),
        ];
        let response = match self.chat(&task.task_id, AGENT_PROFILE, messages).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Unable to generate agent profile: {}", e);
                return Ok(None);
            }
        };

        let profile = parse_json(response.content())
            .ok()
            .and_then(|value| serde_json::from_value::<AgentProfile>(value).ok())
            .filter(|profile| !profile.role.trim().is_empty());

        match &profile {
            Some(profile) => info!("Planning as {}: {}", profile.role, profile.description),
            None => warn!("Invalid agent profile: {}", response.content()),
        }
        Ok(profile)
    }
}
