//! Task and step persistence

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use models::{
    AbilityRef, Pagination, Step, StepRequest, StepStatus, StepUpdate, Task, TaskRequest,
};
pub use sqlite::SqliteStore;

use crate::error::Result;
use async_trait::async_trait;

/// Name given to steps created without one
pub const DEFAULT_STEP_NAME: &str = "Unnamed step";

/// Persistent storage for tasks and their steps.
///
/// Steps are returned in creation order. Implementations must refuse to
/// modify a step whose status is already final.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, request: TaskRequest) -> Result<Task>;

    async fn get_task(&self, task_id: &str) -> Result<Task>;

    async fn list_tasks(&self, page: usize, per_page: usize) -> Result<(Vec<Task>, Pagination)>;

    async fn create_step(&self, task_id: &str, request: StepRequest, is_last: bool)
        -> Result<Step>;

    async fn get_step(&self, task_id: &str, step_id: &str) -> Result<Step>;

    async fn list_steps(
        &self,
        task_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<Step>, Pagination)>;

    async fn update_step(&self, task_id: &str, step_id: &str, update: StepUpdate)
        -> Result<Step>;
}

/// Fetch every step of a task, following pagination
pub async fn list_all_steps(
    store: &dyn TaskStore,
    task_id: &str,
    per_page: usize,
) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    let mut page = 1;
    loop {
        let (batch, pagination) = store.list_steps(task_id, page, per_page).await?;
        steps.extend(batch);
        if !pagination.has_next() {
            return Ok(steps);
        }
        page += 1;
    }
}
