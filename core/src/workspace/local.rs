//! Workspace backed by a directory on the local filesystem

use super::Workspace;
use crate::error::{Error, Result, WorkspaceError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Stores each task's files under `<root>/<task_id>/`
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a task-relative path. A leading `/` means the task root; `..`
    /// is refused.
    fn resolve(&self, task_id: &str, path: &str) -> Result<PathBuf> {
        let task_root = self.task_root(task_id)?;
        let mut resolved = task_root.clone();

        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(WorkspaceError::PathEscape {
                        path: path.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(resolved)
    }

    fn task_root(&self, task_id: &str) -> Result<PathBuf> {
        let mut components = Path::new(task_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(task_id)),
            _ => Err(WorkspaceError::PathEscape {
                path: task_id.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    async fn list(&self, task_id: &str, path: &str) -> Result<Vec<String>> {
        let task_root = self.task_root(task_id)?;
        let base = self.resolve(task_id, path)?;
        if !base.exists() {
            return Ok(Vec::new());
        }

        let files = tokio::task::spawn_blocking(move || {
            let mut files: Vec<String> = WalkDir::new(&base)
                .follow_links(false)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| {
                    entry
                        .path()
                        .strip_prefix(&task_root)
                        .ok()
                        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                })
                .collect();
            files.sort();
            files
        })
        .await
        .map_err(|e| Error::Generic(format!("workspace listing failed: {}", e)))?;
        Ok(files)
    }

    async fn read(&self, task_id: &str, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(task_id, path)?;
        if !full_path.is_file() {
            return Err(WorkspaceError::FileNotFound {
                path: path.to_string(),
            }
            .into());
        }
        Ok(tokio::fs::read(&full_path).await?)
    }

    async fn write(&self, task_id: &str, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(task_id, path)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, data).await?;
        debug!("Wrote {} bytes to {}", data.len(), full_path.display());
        Ok(())
    }

    async fn exists(&self, task_id: &str, path: &str) -> Result<bool> {
        Ok(self.resolve(task_id, path)?.exists())
    }

    async fn delete(&self, task_id: &str, path: &str) -> Result<()> {
        let full_path = self.resolve(task_id, path)?;
        if !full_path.exists() {
            return Err(WorkspaceError::FileNotFound {
                path: path.to_string(),
            }
            .into());
        }
        if full_path.is_dir() {
            tokio::fs::remove_dir_all(&full_path).await?;
        } else {
            tokio::fs::remove_file(&full_path).await?;
        }
        Ok(())
    }
}
