use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Server-reported state of a generation task.
///
/// Transitions are server-authoritative; the client only ever records what a
/// status fetch returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl TaskStatus {
    /// `success` and `failure` end polling for a task id.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failure => "failure",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "queued" => Ok(TaskStatus::Pending),
            "running" | "started" | "progress" | "processing" => Ok(TaskStatus::Running),
            "success" | "completed" | "succeeded" => Ok(TaskStatus::Success),
            "failure" | "failed" | "error" => Ok(TaskStatus::Failure),
            other => Err(format!(
                "invalid task status: {other} (expected pending, running, success or failure)"
            )),
        }
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Classification the backend attaches to a recorded failure.
///
/// Unknown strings decode as `Other` so new server-side categories never
/// break the failed-task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum FailureType {
    ServiceUnavailable,
    WorkerTimeout,
    ProcessingError,
    Other,
}

impl FailureType {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureType::ServiceUnavailable => "service_unavailable",
            FailureType::WorkerTimeout => "worker_timeout",
            FailureType::ProcessingError => "processing_error",
            FailureType::Other => "other",
        }
    }
}

impl Default for FailureType {
    fn default() -> Self {
        FailureType::Other
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FailureType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "service_unavailable" => FailureType::ServiceUnavailable,
            "worker_timeout" => FailureType::WorkerTimeout,
            "processing_error" => FailureType::ProcessingError,
            _ => FailureType::Other,
        }
    }
}

impl From<FailureType> for String {
    fn from(kind: FailureType) -> Self {
        kind.as_str().to_string()
    }
}
