// src/session.rs

//! One tracking session: a registry, a reconciler and the refresher that
//! links them, created together and disposed together.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::client::TaskBackend;
use crate::config::ConfigFile;
use crate::engine::{PollOptions, TaskRegistry, TrackedTask, TrackerEvent};
use crate::errors::{Result, TrackerError};
use crate::model::{FailedTask, FailedTaskView, GenerationRequest, SubmittedTask, TaskId};
use crate::reconcile::{
    FailedPanel, FailedTaskReconciler, FailedTaskRefresher, RefreshOptions, spawn_refresher,
};

/// Settings for a [`TrackerSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub poll: PollOptions,
    /// Page kept current by the failed-task refresher.
    pub failed_page: RefreshOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&ConfigFile::default())
    }
}

impl From<&ConfigFile> for SessionOptions {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            poll: PollOptions::from(cfg),
            failed_page: RefreshOptions {
                limit: cfg.page_size,
                offset: 0,
            },
        }
    }
}

/// Entry point for a UI: submit, track, cancel and retry generation tasks.
///
/// Must be created inside a Tokio runtime. [`TrackerSession::dispose`] (or
/// dropping the session) cancels every poller and stops the refresher.
pub struct TrackerSession<B: TaskBackend> {
    registry: TaskRegistry<B>,
    reconciler: Arc<FailedTaskReconciler<B>>,
    refresher: FailedTaskRefresher,
    options: SessionOptions,
}

impl<B: TaskBackend> TrackerSession<B> {
    pub fn new(backend: Arc<B>, options: SessionOptions) -> Self {
        let registry = TaskRegistry::new(Arc::clone(&backend), options.poll);
        let reconciler = Arc::new(FailedTaskReconciler::new(backend));

        // Subscribe before anything is registered so no failure is missed.
        let refresher = spawn_refresher(
            Arc::clone(&reconciler),
            registry.subscribe(),
            options.failed_page,
        );

        debug!(?options, "tracker session created");
        Self {
            registry,
            reconciler,
            refresher,
            options,
        }
    }

    pub fn registry(&self) -> &TaskRegistry<B> {
        &self.registry
    }

    pub fn reconciler(&self) -> &FailedTaskReconciler<B> {
        &self.reconciler
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Submit a generation job and start tracking it.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<SubmittedTask> {
        let submitted = self.registry.backend().submit(request).await?;
        info!(
            task_id = %submitted.task_id,
            task_name = %submitted.task_name,
            estimated_time_seconds = ?submitted.estimated_time_seconds,
            "generation submitted"
        );
        self.registry.register_submitted(&submitted)?;
        Ok(submitted)
    }

    /// Track a task that was submitted elsewhere.
    pub fn track(&self, task_id: impl Into<TaskId>, name: impl Into<String>) -> Result<()> {
        self.registry.register(task_id, name)
    }

    /// Retry a failed task and track the task the backend created for it.
    ///
    /// On `RetryNotAllowed` nothing is sent and the registry is unchanged.
    pub async fn retry(&self, failed: &FailedTask) -> Result<SubmittedTask> {
        let submitted = self.reconciler.retry(failed).await?;
        self.registry.register_submitted(&submitted)?;
        Ok(submitted)
    }

    /// Like [`TrackerSession::retry`], for callers that only hold the id.
    pub async fn retry_by_id(&self, failed_task_id: &str) -> Result<SubmittedTask> {
        let failed = self
            .reconciler
            .find_failed_task(failed_task_id, self.options.failed_page.limit)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("failed task '{failed_task_id}'")))?;
        self.retry(&failed).await
    }

    /// Stop tracking a task and ask the backend to cancel it.
    pub async fn cancel(&self, task_id: &str) -> bool {
        self.registry.cancel(task_id).await
    }

    pub fn snapshot(&self) -> Vec<TrackedTask> {
        self.registry.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.registry.subscribe()
    }

    pub async fn list_failed_tasks(&self, limit: u32, offset: u32) -> Result<FailedTaskView> {
        self.reconciler.list_failed_tasks(limit, offset).await
    }

    /// Live state of the failed-task panel.
    pub fn failed_panel(&self) -> watch::Receiver<FailedPanel> {
        self.refresher.panel()
    }

    /// Re-list failed tasks now.
    pub fn refresh_failed_tasks(&self) {
        self.refresher.request_refresh();
    }

    /// Cancel every poller and stop the refresher.
    pub fn dispose(self) {
        let tracked = self.registry.len();
        self.registry.dispose();
        self.refresher.stop();
        info!(tracked, "tracker session disposed");
    }
}
