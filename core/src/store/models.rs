//! Task and step records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// A unit of work with a natural-language goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub input: String,
    pub additional_input: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    pub input: String,
    #[serde(default)]
    pub additional_input: Option<Value>,
}

impl TaskRequest {
    pub fn new<S: Into<String>>(input: S) -> Self {
        Self {
            input: input.into(),
            additional_input: None,
        }
    }
}

/// Lifecycle of a step: `Created` until executed or superseded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Created,
    Completed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Created => "created",
            StepStatus::Completed => "completed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Completed and skipped steps never change again
    pub fn is_final(&self) -> bool {
        !matches!(self, StepStatus::Created)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(StepStatus::Created),
            "completed" => Ok(StepStatus::Completed),
            "skipped" => Ok(StepStatus::Skipped),
            other => Err(StoreError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// A reference to a registered ability plus the arguments to call it with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityRef {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl AbilityRef {
    pub fn new<S: Into<String>>(name: S, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// One planned or executed action toward a task's goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub task_id: String,
    pub step_id: String,
    pub name: String,
    pub input: String,
    pub ability: Option<AbilityRef>,
    pub status: StepStatus,
    pub output: Option<String>,
    pub is_last: bool,
    pub additional_input: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Request body for creating a step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepRequest {
    pub name: Option<String>,
    pub input: Option<String>,
    pub ability: Option<AbilityRef>,
    pub additional_input: Option<Value>,
}

impl StepRequest {
    pub fn new<S: Into<String>>(name: S, input: S) -> Self {
        Self {
            name: Some(name.into()),
            input: Some(input.into()),
            ..Default::default()
        }
    }

    pub fn with_ability(mut self, ability: AbilityRef) -> Self {
        self.ability = Some(ability);
        self
    }
}

/// Fields the execution phase may change on a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepUpdate {
    pub status: StepStatus,
    pub output: Option<String>,
    pub is_last: Option<bool>,
}

impl StepUpdate {
    pub fn completed(output: Option<String>) -> Self {
        Self {
            status: StepStatus::Completed,
            output,
            is_last: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: StepStatus::Skipped,
            output: None,
            is_last: None,
        }
    }

    pub fn with_is_last(mut self, is_last: bool) -> Self {
        self.is_last = Some(is_last);
        self
    }
}

/// Page metadata returned with list queries; pages are 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total_items: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub page_size: usize,
}

impl Pagination {
    pub fn new(total_items: usize, current_page: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            total_items,
            total_pages: total_items.div_ceil(page_size),
            current_page: current_page.max(1),
            page_size,
        }
    }

    /// Offset of the first item on the current page
    pub fn offset(&self) -> usize {
        (self.current_page - 1) * self.page_size
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Slice an ordered collection into one page
pub(crate) fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> (Vec<T>, Pagination) {
    let pagination = Pagination::new(items.len(), page, per_page);
    let page_items = items
        .iter()
        .skip(pagination.offset())
        .take(pagination.page_size)
        .cloned()
        .collect();
    (page_items, pagination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [StepStatus::Created, StepStatus::Completed, StepStatus::Skipped] {
            assert_eq!(status.as_str().parse::<StepStatus>().unwrap(), status);
        }
        assert!("running".parse::<StepStatus>().is_err());
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (1..=5).collect();

        let (first, pagination) = paginate(&items, 1, 2);
        assert_eq!(first, vec![1, 2]);
        assert_eq!(pagination.total_pages, 3);
        assert!(pagination.has_next());

        let (last, pagination) = paginate(&items, 3, 2);
        assert_eq!(last, vec![5]);
        assert!(!pagination.has_next());

        let (beyond, _) = paginate(&items, 9, 2);
        assert!(beyond.is_empty());
    }

    #[test]
    fn test_ability_ref_args_default_to_empty() {
        let ability: AbilityRef = serde_json::from_str(r#"{"name": "finish"}"#).unwrap();
        assert_eq!(ability.name, "finish");
        assert!(ability.args.is_empty());
    }
}
