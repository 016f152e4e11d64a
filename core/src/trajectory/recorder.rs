//! Trajectory recorder implementation

use crate::error::{Result, TrajectoryError};
use crate::trajectory::{EntryType, TrajectoryEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

/// Collects what the agent asked, heard and did, optionally mirroring it to a JSON file
pub struct TrajectoryRecorder {
    entries: RwLock<Vec<TrajectoryEntry>>,
    file_path: Option<PathBuf>,
}

/// Complete trajectory data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    pub metadata: TrajectoryMetadata,
    pub entries: Vec<TrajectoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryMetadata {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: String,
    /// Input of the first task seen
    pub task: Option<String>,
    pub success: Option<bool>,
    pub total_entries: usize,
    pub duration_ms: Option<u64>,
}

impl TrajectoryRecorder {
    /// Recorder that only keeps entries in memory
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            file_path: None,
        }
    }

    /// Recorder that rewrites `path` after every entry
    pub fn with_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            file_path: Some(path.as_ref().to_path_buf()),
        }
    }

    pub async fn record(&self, entry: TrajectoryEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        self.save().await
    }

    pub async fn get_entries(&self) -> Vec<TrajectoryEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Write the trajectory to the configured file, if any
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        let trajectory = self.build_trajectory().await;
        let json = serde_json::to_string_pretty(&trajectory).map_err(|e| {
            TrajectoryError::RecordingFailed {
                message: format!("Failed to serialize trajectory: {}", e),
            }
        })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(path, json).await?;
        Ok(())
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Trajectory> {
        let content = fs::read_to_string(path.as_ref()).await?;
        serde_json::from_str(&content).map_err(|e| {
            TrajectoryError::RecordingFailed {
                message: format!(
                    "Invalid trajectory file {}: {}",
                    path.as_ref().display(),
                    e
                ),
            }
            .into()
        })
    }

    async fn build_trajectory(&self) -> Trajectory {
        let entries = self.entries.read().await.clone();

        let started_at = entries
            .first()
            .map(|e| e.timestamp)
            .unwrap_or_else(Utc::now);
        let completed_at = entries.last().map(|e| e.timestamp);
        let duration_ms = completed_at.map(|end| (end - started_at).num_milliseconds() as u64);

        let task = entries.iter().find_map(|e| match &e.entry_type {
            EntryType::TaskStart { input } => Some(input.clone()),
            _ => None,
        });
        let success = entries.iter().rev().find_map(|e| match &e.entry_type {
            EntryType::TaskComplete { success, .. } => Some(*success),
            _ => None,
        });

        let metadata = TrajectoryMetadata {
            id: uuid::Uuid::new_v4().to_string(),
            started_at,
            completed_at,
            version: "1.0".to_string(),
            task,
            success,
            total_entries: entries.len(),
            duration_ms,
        };

        Trajectory { metadata, entries }
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

impl Default for TrajectoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}
