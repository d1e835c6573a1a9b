#![allow(dead_code)]

use synthtrack::model::{FailedTask, SubmittedTask, Task, TaskResult};
use synthtrack::types::{FailureType, TaskStatus};

/// Builder for status-fetch replies.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: Task::pending(id, ""),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn pending(mut self) -> Self {
        self.task.status = TaskStatus::Pending;
        self
    }

    pub fn running(mut self, progress: u8) -> Self {
        self.task.status = TaskStatus::Running;
        self.task.progress = Some(progress);
        self
    }

    pub fn step(mut self, step: &str) -> Self {
        self.task.current_step = Some(step.to_string());
        self
    }

    pub fn success(mut self, rows: u64, filename: &str) -> Self {
        self.task.status = TaskStatus::Success;
        self.task.progress = Some(100);
        self.task.result = Some(TaskResult {
            filename: Some(filename.to_string()),
            rows_generated: Some(rows),
            output_id: None,
        });
        self
    }

    pub fn failure(mut self, error: &str) -> Self {
        self.task.status = TaskStatus::Failure;
        self.task.error = Some(error.to_string());
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for `FailedTask` records.
pub struct FailedTaskBuilder {
    task: FailedTask,
}

impl FailedTaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: FailedTask {
                id: id.to_string(),
                task_name: format!("generation {id}"),
                error_message: "worker crashed".to_string(),
                failure_type: FailureType::ProcessingError,
                retry_attempts_count: 0,
                can_retry: true,
                has_successful_retry: false,
                successful_retry_result: None,
                created_at: None,
            },
        }
    }

    pub fn error(mut self, message: &str) -> Self {
        self.task.error_message = message.to_string();
        self
    }

    pub fn failure_type(mut self, kind: FailureType) -> Self {
        self.task.failure_type = kind;
        self
    }

    pub fn can_retry(mut self, val: bool) -> Self {
        self.task.can_retry = val;
        self
    }

    pub fn attempts(mut self, count: u32) -> Self {
        self.task.retry_attempts_count = count;
        self
    }

    pub fn resolved(mut self, filename: &str) -> Self {
        self.task.has_successful_retry = true;
        self.task.successful_retry_result = Some(TaskResult {
            filename: Some(filename.to_string()),
            rows_generated: None,
            output_id: None,
        });
        self
    }

    pub fn build(self) -> FailedTask {
        self.task
    }
}

/// Reply of a submission or retry call.
pub fn submitted(task_id: &str, task_name: &str) -> SubmittedTask {
    SubmittedTask {
        task_id: task_id.to_string(),
        task_name: task_name.to_string(),
        estimated_time_seconds: None,
        retry_of: None,
    }
}
