//! Per-task file storage used by abilities and prompts

pub mod local;

pub use local::LocalWorkspace;

use crate::error::Result;
use async_trait::async_trait;

/// File storage scoped by task id.
///
/// Paths are relative to the task's own root; implementations must reject
/// paths that leave it.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Files below `path`, relative to the task root, sorted
    async fn list(&self, task_id: &str, path: &str) -> Result<Vec<String>>;

    async fn read(&self, task_id: &str, path: &str) -> Result<Vec<u8>>;

    async fn write(&self, task_id: &str, path: &str, data: &[u8]) -> Result<()>;

    async fn exists(&self, task_id: &str, path: &str) -> Result<bool>;

    async fn delete(&self, task_id: &str, path: &str) -> Result<()>;
}
