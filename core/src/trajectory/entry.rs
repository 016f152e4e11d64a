//! Trajectory entry structures

use crate::llm::{LlmMessage, Usage};
use crate::store::AbilityRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in the execution trajectory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryEntry {
    pub id: String,

    pub timestamp: DateTime<Utc>,

    /// Task the entry belongs to
    pub task_id: String,

    pub entry_type: EntryType,
}

/// Type of trajectory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryType {
    TaskStart {
        input: String,
    },

    /// Chat request sent; `purpose` names the template set that built it
    LlmRequest {
        purpose: String,
        messages: Vec<LlmMessage>,
        model: String,
        provider: String,
    },

    LlmResponse {
        content: String,
        usage: Option<Usage>,
    },

    /// A reply was rejected and the request will be sent again
    Retry {
        attempt: u32,
        reason: String,
    },

    AbilityRun {
        step_id: String,
        ability: AbilityRef,
        output: String,
    },

    /// Pending steps were skipped and replaced
    Replan {
        skipped: Vec<String>,
        created: Vec<String>,
    },

    StepCompleted {
        step_id: String,
        name: String,
        is_last: bool,
    },

    Error {
        error: String,
    },

    TaskComplete {
        success: bool,
        final_result: String,
        steps_executed: usize,
        duration_ms: u64,
    },
}

impl TrajectoryEntry {
    pub fn new<S: Into<String>>(task_id: S, entry_type: EntryType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            task_id: task_id.into(),
            entry_type,
        }
    }

    pub fn task_start(task_id: &str, input: &str) -> Self {
        Self::new(
            task_id,
            EntryType::TaskStart {
                input: input.to_string(),
            },
        )
    }

    pub fn llm_request(
        task_id: &str,
        purpose: &str,
        messages: Vec<LlmMessage>,
        model: &str,
        provider: &str,
    ) -> Self {
        Self::new(
            task_id,
            EntryType::LlmRequest {
                purpose: purpose.to_string(),
                messages,
                model: model.to_string(),
                provider: provider.to_string(),
            },
        )
    }

    pub fn llm_response(task_id: &str, content: &str, usage: Option<Usage>) -> Self {
        Self::new(
            task_id,
            EntryType::LlmResponse {
                content: content.to_string(),
                usage,
            },
        )
    }

    pub fn retry(task_id: &str, attempt: u32, reason: String) -> Self {
        Self::new(task_id, EntryType::Retry { attempt, reason })
    }

    pub fn ability_run(task_id: &str, step_id: &str, ability: AbilityRef, output: String) -> Self {
        Self::new(
            task_id,
            EntryType::AbilityRun {
                step_id: step_id.to_string(),
                ability,
                output,
            },
        )
    }

    pub fn replan(task_id: &str, skipped: Vec<String>, created: Vec<String>) -> Self {
        Self::new(task_id, EntryType::Replan { skipped, created })
    }

    pub fn step_completed(task_id: &str, step_id: &str, name: &str, is_last: bool) -> Self {
        Self::new(
            task_id,
            EntryType::StepCompleted {
                step_id: step_id.to_string(),
                name: name.to_string(),
                is_last,
            },
        )
    }

    pub fn error(task_id: &str, error: String) -> Self {
        Self::new(task_id, EntryType::Error { error })
    }

    pub fn task_complete(
        task_id: &str,
        success: bool,
        final_result: String,
        steps_executed: usize,
        duration_ms: u64,
    ) -> Self {
        Self::new(
            task_id,
            EntryType::TaskComplete {
                success,
                final_result,
                steps_executed,
                duration_ms,
            },
        )
    }
}
