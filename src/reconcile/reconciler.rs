// src/reconcile/reconciler.rs

use std::sync::Arc;

use tracing::{debug, info};

use crate::client::TaskBackend;
use crate::errors::{Result, TrackerError};
use crate::model::{FailedTask, FailedTaskView, SubmittedTask};

/// Lists failed tasks and drives retries.
///
/// The reconciler never patches a `FailedTask` locally: whether a retry
/// resolved a record is only learned by listing again.
pub struct FailedTaskReconciler<B: TaskBackend> {
    backend: Arc<B>,
}

impl<B: TaskBackend> FailedTaskReconciler<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Fetch one page of failed tasks, split into actionable and resolved.
    ///
    /// Errors are classified as `EndpointUnavailable`, `Transient` or
    /// `Permanent`.
    pub async fn list_failed_tasks(&self, limit: u32, offset: u32) -> Result<FailedTaskView> {
        let tasks = self
            .backend
            .list_failed_tasks(limit, offset)
            .await
            .map_err(classify_list_error)?;

        let view = FailedTaskView::from_tasks(tasks);
        debug!(
            limit,
            offset,
            actionable = view.actionable.len(),
            resolved = view.resolved.len(),
            "listed failed tasks"
        );
        Ok(view)
    }

    /// Page through the failed-task list looking for `failed_task_id`.
    pub async fn find_failed_task(
        &self,
        failed_task_id: &str,
        page_size: u32,
    ) -> Result<Option<FailedTask>> {
        let page_size = page_size.max(1);
        let mut offset = 0u32;

        loop {
            let page = self
                .backend
                .list_failed_tasks(page_size, offset)
                .await
                .map_err(classify_list_error)?;
            let fetched = page.len();

            if let Some(found) = page.into_iter().find(|t| t.id == failed_task_id) {
                return Ok(Some(found));
            }
            if fetched < page_size as usize {
                return Ok(None);
            }
            offset = offset.saturating_add(page_size);
        }
    }

    /// Ask the backend to retry `failed`.
    ///
    /// Rejected with `RetryNotAllowed`, without contacting the backend, when
    /// the record is not retryable or was already resolved. The returned
    /// task carries `retry_of = failed.id`; the caller registers it like any
    /// freshly submitted task.
    pub async fn retry(&self, failed: &FailedTask) -> Result<SubmittedTask> {
        if !failed.is_retryable() {
            return Err(TrackerError::RetryNotAllowed(failed.id.clone()));
        }

        let mut submitted = self.backend.retry_failed_task(&failed.id).await?;

        if submitted.task_id.trim().is_empty() || submitted.task_id == failed.id {
            return Err(TrackerError::Decode(format!(
                "retry of failed task '{}' did not return a new task id",
                failed.id
            )));
        }

        submitted.retry_of = Some(failed.id.clone());
        info!(
            failed_task_id = %failed.id,
            task_id = %submitted.task_id,
            attempts = failed.retry_attempts_count,
            "retry submitted"
        );
        Ok(submitted)
    }
}

/// Map a failed-task listing error onto the caller-facing taxonomy.
///
/// - missing route (404/405/501): `EndpointUnavailable`
/// - transport, decode, 5xx, 408, 429: `Transient`
/// - anything else: `Permanent`
pub fn classify_list_error(err: TrackerError) -> TrackerError {
    match err {
        TrackerError::NotFound(message) => TrackerError::EndpointUnavailable(message),
        TrackerError::Service { status, message } => match status {
            404 | 405 | 501 => TrackerError::EndpointUnavailable(message),
            408 | 429 | 500..=599 => TrackerError::Transient(format!("{status}: {message}")),
            _ => TrackerError::Permanent(format!("{status}: {message}")),
        },
        TrackerError::Transport(message) | TrackerError::Decode(message) => {
            TrackerError::Transient(message)
        }
        err @ (TrackerError::EndpointUnavailable(_)
        | TrackerError::Transient(_)
        | TrackerError::Permanent(_)) => err,
        other => TrackerError::Permanent(other.to_string()),
    }
}
