// src/model/failed.rs

use serde::{Deserialize, Serialize};

use crate::model::task::TaskResult;
use crate::types::FailureType;

/// A server-retained record of a past failure.
///
/// Distinct from a live `Task`: the client never deletes or patches these,
/// it only re-fetches and re-filters them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FailedTask {
    pub id: String,

    #[serde(default)]
    pub task_name: String,

    #[serde(default)]
    pub error_message: String,

    #[serde(default)]
    pub failure_type: FailureType,

    #[serde(default)]
    pub retry_attempts_count: u32,

    #[serde(default)]
    pub can_retry: bool,

    #[serde(default)]
    pub has_successful_retry: bool,

    #[serde(default)]
    pub successful_retry_result: Option<TaskResult>,

    #[serde(default)]
    pub created_at: Option<String>,
}

impl FailedTask {
    /// Resolved records are inert for retry purposes.
    pub fn is_actionable(&self) -> bool {
        !self.has_successful_retry
    }

    /// Whether `retry()` would be accepted for this record.
    pub fn is_retryable(&self) -> bool {
        self.can_retry && !self.has_successful_retry
    }
}

/// Envelope of `GET /synthetic/failed-tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FailedTaskPage {
    #[serde(default)]
    pub failed_tasks: Vec<FailedTask>,
}

/// One fetched page of failed tasks, split by whether they still need
/// attention.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailedTaskView {
    /// Entries without a successful retry, in server order.
    pub actionable: Vec<FailedTask>,
    /// Entries already resolved by a successful retry, in server order.
    pub resolved: Vec<FailedTask>,
}

impl FailedTaskView {
    pub fn from_tasks(tasks: Vec<FailedTask>) -> Self {
        let (actionable, resolved) = tasks.into_iter().partition(FailedTask::is_actionable);
        Self {
            actionable,
            resolved,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actionable.is_empty() && self.resolved.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actionable.len() + self.resolved.len()
    }

    /// Every entry, actionable first.
    pub fn all(&self) -> impl Iterator<Item = &FailedTask> {
        self.actionable.iter().chain(self.resolved.iter())
    }

    pub fn find(&self, id: &str) -> Option<&FailedTask> {
        self.all().find(|t| t.id == id)
    }
}
