// src/model/task.rs

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::TaskStatus;

/// Canonical task id type used throughout the tracker.
pub type TaskId = String;

/// Output identifiers of a successful generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaskResult {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub rows_generated: Option<u64>,
    #[serde(default)]
    pub output_id: Option<String>,
}

/// One generation job as last reported by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Task {
    #[serde(rename = "task_id", alias = "id", default)]
    pub id: TaskId,

    #[serde(rename = "task_name", alias = "name", default)]
    pub name: String,

    pub status: TaskStatus,

    /// Percentage in `0..=100`; only meaningful while running.
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: Option<u8>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub current_step: Option<String>,

    #[serde(default)]
    pub result: Option<TaskResult>,

    #[serde(default)]
    pub error: Option<String>,

    /// Failed task this one was created from by a retry. Client-side only.
    #[serde(skip)]
    pub retry_of: Option<String>,
}

impl Task {
    /// The record a freshly submitted task starts with before its first poll.
    pub fn pending(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TaskStatus::Pending,
            progress: None,
            message: None,
            current_step: None,
            result: None,
            error: None,
            retry_of: None,
        }
    }

    /// Drop fields that are only meaningful in other states.
    ///
    /// `result` survives only on success, `error` only on failure (where a
    /// missing message becomes `"unknown error"`).
    pub fn normalize(mut self) -> Self {
        if self.status != TaskStatus::Success {
            self.result = None;
        }
        match self.status {
            TaskStatus::Failure => {
                if self.error.as_deref().map(str::trim).unwrap_or("").is_empty() {
                    self.error = Some("unknown error".to_string());
                }
            }
            _ => self.error = None,
        }
        self
    }
}

/// Accept integer or float percentages and clamp them into `0..=100`.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<f64> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, 100.0) as u8))
}

/// Body of a generation submission.
///
/// Parameter validation happens before this is built; the tracker only
/// serialises it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub file_name: String,
    pub num_rows: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

/// Reply of the submission and retry endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubmittedTask {
    pub task_id: TaskId,

    #[serde(default)]
    pub task_name: String,

    #[serde(default)]
    pub estimated_time_seconds: Option<u64>,

    /// Lineage back to the failed task this submission retried.
    #[serde(skip)]
    pub retry_of: Option<String>,
}
