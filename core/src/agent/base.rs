//! Base agent trait and structures

use super::config::AgentConfig;
use crate::error::Result;
use crate::store::{Step, StepRequest, Task, TaskRequest};
use async_trait::async_trait;

/// Result type for agent operations
pub type AgentResult<T> = Result<T>;

/// A task agent: tasks are created once, then advanced one step per call
#[async_trait]
pub trait Agent: Send + Sync {
    async fn create_task(&self, request: TaskRequest) -> AgentResult<Task>;

    /// Plan the task if it has no steps yet, otherwise execute the next pending step
    async fn execute_step(&self, task_id: &str, request: StepRequest) -> AgentResult<Step>;

    fn config(&self) -> &AgentConfig;

    fn agent_type(&self) -> &str;
}

/// Hooks around each turn of [`StepAgent::run_task`](super::StepAgent::run_task)
#[async_trait]
pub trait StepObserver: Send + Sync {
    async fn step_started(&self, _turn: usize) {}

    /// Called after every successful step; returning `false` stops the run
    async fn step_finished(&self, _step: &Step) -> bool {
        true
    }
}

/// Observer that never interrupts
pub struct NullObserver;

impl StepObserver for NullObserver {}
