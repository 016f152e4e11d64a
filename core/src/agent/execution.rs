//! Agent execution result structures

use serde::{Deserialize, Serialize};

/// Summary of a task run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    pub task_id: String,

    /// Whether the task reached a final step
    pub success: bool,

    /// Output of the last step that produced one, or the failure reason
    pub final_result: String,

    /// Number of `execute_step` calls, the planning call included
    pub steps_executed: usize,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl AgentExecution {
    pub fn success<S: Into<String>>(
        task_id: S,
        final_result: String,
        steps_executed: usize,
        duration_ms: u64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            final_result,
            steps_executed,
            duration_ms,
        }
    }

    pub fn failure<S: Into<String>>(
        task_id: S,
        error: String,
        steps_executed: usize,
        duration_ms: u64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            final_result: format!("Execution failed: {}", error),
            steps_executed,
            duration_ms,
        }
    }
}
