//! In-memory task store

use super::models::paginate;
use super::{
    Pagination, Step, StepRequest, StepUpdate, Task, TaskRequest, TaskStore, DEFAULT_STEP_NAME,
};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
    steps: HashMap<String, Vec<Step>>,
}

/// Store that keeps everything in process memory; used by tests and one-shot runs
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn create_task(&self, request: TaskRequest) -> Result<Task> {
        let task = Task {
            task_id: Uuid::new_v4().to_string(),
            input: request.input,
            additional_input: request.additional_input,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        inner.steps.insert(task.task_id.clone(), Vec::new());
        inner.tasks.push(task.clone());
        Ok(task)
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        let inner = self.inner.read().await;
        inner
            .tasks
            .iter()
            .find(|t| t.task_id == task_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::TaskNotFound {
                    task_id: task_id.to_string(),
                }
                .into()
            })
    }

    async fn list_tasks(&self, page: usize, per_page: usize) -> Result<(Vec<Task>, Pagination)> {
        let inner = self.inner.read().await;
        Ok(paginate(&inner.tasks, page, per_page))
    }

    async fn create_step(
        &self,
        task_id: &str,
        request: StepRequest,
        is_last: bool,
    ) -> Result<Step> {
        let mut inner = self.inner.write().await;
        let steps = inner
            .steps
            .get_mut(task_id)
            .ok_or_else(|| StoreError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;

        let now = Utc::now();
        let step = Step {
            task_id: task_id.to_string(),
            step_id: Uuid::new_v4().to_string(),
            name: request.name.unwrap_or_else(|| DEFAULT_STEP_NAME.to_string()),
            input: request.input.unwrap_or_default(),
            ability: request.ability,
            status: super::StepStatus::Created,
            output: None,
            is_last,
            additional_input: request.additional_input,
            created_at: now,
            modified_at: now,
        };
        steps.push(step.clone());
        Ok(step)
    }

    async fn get_step(&self, task_id: &str, step_id: &str) -> Result<Step> {
        let inner = self.inner.read().await;
        inner
            .steps
            .get(task_id)
            .and_then(|steps| steps.iter().find(|s| s.step_id == step_id))
            .cloned()
            .ok_or_else(|| {
                StoreError::StepNotFound {
                    task_id: task_id.to_string(),
                    step_id: step_id.to_string(),
                }
                .into()
            })
    }

    async fn list_steps(
        &self,
        task_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<Step>, Pagination)> {
        let inner = self.inner.read().await;
        let steps = inner
            .steps
            .get(task_id)
            .ok_or_else(|| StoreError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;
        Ok(paginate(steps, page, per_page))
    }

    async fn update_step(
        &self,
        task_id: &str,
        step_id: &str,
        update: StepUpdate,
    ) -> Result<Step> {
        let mut inner = self.inner.write().await;
        let step = inner
            .steps
            .get_mut(task_id)
            .and_then(|steps| steps.iter_mut().find(|s| s.step_id == step_id))
            .ok_or_else(|| StoreError::StepNotFound {
                task_id: task_id.to_string(),
                step_id: step_id.to_string(),
            })?;

        if step.status.is_final() {
            return Err(StoreError::StepFinalized {
                step_id: step_id.to_string(),
            }
            .into());
        }

        step.status = update.status;
        if update.output.is_some() {
            step.output = update.output;
        }
        if let Some(is_last) = update.is_last {
            step.is_last = is_last;
        }
        step.modified_at = Utc::now();
        Ok(step.clone())
    }
}
