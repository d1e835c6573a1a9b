// src/engine/registry.rs

//! Async registry shell around [`RegistryState`].
//!
//! The registry is the single owner of poller lifetimes: it spawns one poller
//! per registration, keeps its cancel handle, and stops it on unregister,
//! cancel, dispose or drop. Pollers report back through [`Shared`], which
//! applies results to the pure state and publishes the resulting events.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::TaskBackend;
use crate::engine::poller::run_poller;
use crate::engine::state::{RegistryState, TrackedTask};
use crate::engine::{PollOptions, TrackerEvent};
use crate::errors::{Result, TrackerError};
use crate::model::{SubmittedTask, Task, TaskId};

/// Handle for a running poller.
///
/// - `cancel` asks the poller loop to stop.
/// - `handle` is the Tokio task running the loop.
struct ActivePoller {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ActivePoller {
    fn stop(mut self, task_id: &str) {
        match self.cancel.take() {
            Some(cancel) => {
                if cancel.send(()).is_err() {
                    debug!(task_id, "poller already finished while cancelling");
                }
            }
            None => debug!(task_id, "no cancel sender present; poller already stopped"),
        }
    }
}

#[derive(Default)]
struct Inner {
    state: RegistryState,
    pollers: HashMap<TaskId, ActivePoller>,
}

/// State shared between the registry handle and its pollers.
pub(crate) struct Shared<B: TaskBackend> {
    inner: Mutex<Inner>,
    backend: Arc<B>,
    options: PollOptions,
    events: broadcast::Sender<TrackerEvent>,
}

impl<B: TaskBackend> Shared<B> {
    /// Lock the registry state. The guard is never held across an `.await`,
    /// and a poisoned lock still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn options(&self) -> PollOptions {
        self.options
    }

    fn publish(&self, event: TrackerEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    /// Apply a poll result for registration `generation` of `task_id`.
    ///
    /// Returns whether the poller should keep going.
    pub(crate) fn apply_fetch(
        &self,
        task_id: &str,
        generation: u64,
        fetched: Result<Task>,
    ) -> bool {
        let step = {
            let mut inner = self.lock();
            let step = inner.state.apply_fetch(task_id, generation, fetched);
            if step.released {
                // The poller calling us is the one being released; dropping
                // its handle just detaches the finishing task.
                inner.pollers.remove(task_id);
            }
            step
        };

        if let Some(event) = step.event {
            self.publish(event);
        }
        step.keep_polling
    }
}

/// The set of in-flight tasks, each watched by exactly one poller.
///
/// Must be used from within a Tokio runtime, since registering spawns the
/// poller task. Dropping the registry cancels every poller it owns.
pub struct TaskRegistry<B: TaskBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: TaskBackend> fmt::Debug for TaskRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("TaskRegistry")
            .field("state", &inner.state)
            .field("pollers", &inner.pollers.len())
            .field("options", &self.shared.options)
            .finish()
    }
}

impl<B: TaskBackend> TaskRegistry<B> {
    pub fn new(backend: Arc<B>, options: PollOptions) -> Self {
        let options = options.sanitized();
        let (events, _) = broadcast::channel(options.event_capacity);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                backend,
                options,
                events,
            }),
        }
    }

    pub fn options(&self) -> PollOptions {
        self.shared.options
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.shared.backend
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.shared.events.subscribe()
    }

    /// Start tracking a task and spawn its poller.
    ///
    /// Fails with `DuplicateTask` if `task_id` is already tracked; the
    /// existing registration and its poller are left untouched.
    pub fn register(&self, task_id: impl Into<TaskId>, name: impl Into<String>) -> Result<()> {
        self.register_inner(task_id.into(), name.into(), None)
    }

    /// Track a task returned by a submission or retry call, keeping its
    /// lineage to the failed task it retried, if any.
    pub fn register_submitted(&self, submitted: &SubmittedTask) -> Result<()> {
        self.register_inner(
            submitted.task_id.clone(),
            submitted.task_name.clone(),
            submitted.retry_of.clone(),
        )
    }

    fn register_inner(&self, task_id: TaskId, name: String, retry_of: Option<String>) -> Result<()> {
        if task_id.trim().is_empty() {
            return Err(TrackerError::Permanent("task id must not be empty".to_string()));
        }

        let mut inner = self.shared.lock();
        let generation = inner.state.register(&task_id, &name, retry_of)?;

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(run_poller(
            Arc::clone(&self.shared),
            task_id.clone(),
            generation,
            cancel_rx,
        ));

        info!(task_id = %task_id, name = %name, generation, "tracking task");
        inner.pollers.insert(
            task_id,
            ActivePoller {
                cancel: Some(cancel_tx),
                handle,
            },
        );

        Ok(())
    }

    /// Stop tracking `task_id`. Unknown ids are a no-op.
    ///
    /// Returns whether the id was tracked. A `Cancelled` event is published
    /// for tracked ids; no completed/failed notification is ever sent for
    /// them afterwards.
    pub fn unregister(&self, task_id: &str) -> bool {
        let (removed, poller) = {
            let mut inner = self.shared.lock();
            (inner.state.unregister(task_id), inner.pollers.remove(task_id))
        };

        if let Some(poller) = poller {
            poller.stop(task_id);
        }

        match removed {
            Some(_) => {
                info!(task_id, "stopped tracking task");
                self.shared.publish(TrackerEvent::Cancelled {
                    task_id: task_id.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Stop tracking `task_id` and ask the backend to cancel it.
    ///
    /// Client-side polling stops regardless of what the server answers;
    /// a failed cancel request is only logged.
    pub async fn cancel(&self, task_id: &str) -> bool {
        let was_tracked = self.unregister(task_id);

        if let Err(err) = self.shared.backend.cancel_task(task_id).await {
            warn!(task_id, error = %err, "server-side cancel failed; polling already stopped");
        }

        was_tracked
    }

    /// Cancel every live poller. Never fails.
    pub fn dispose(&self) {
        let stopped = self.stop_all();
        if !stopped.is_empty() {
            info!(count = stopped.len(), "registry disposed");
        }
        for task_id in stopped {
            self.shared.publish(TrackerEvent::Cancelled { task_id });
        }
    }

    fn stop_all(&self) -> Vec<TaskId> {
        let (ids, pollers) = {
            let mut inner = self.shared.lock();
            let ids = inner.state.drain();
            let pollers: Vec<(TaskId, ActivePoller)> = inner.pollers.drain().collect();
            (ids, pollers)
        };

        for (task_id, poller) in pollers {
            poller.stop(&task_id);
        }
        ids
    }

    /// Tracked tasks with their latest status, first registered first.
    pub fn snapshot(&self) -> Vec<TrackedTask> {
        self.shared.lock().state.snapshot()
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.shared.lock().state.get(task_id).cloned()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.shared.lock().state.contains(task_id)
    }

    pub fn len(&self) -> usize {
        self.shared.lock().state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().state.is_empty()
    }

    /// Number of pollers that are still running.
    pub fn poller_count(&self) -> usize {
        self.shared
            .lock()
            .pollers
            .values()
            .filter(|p| !p.handle.is_finished())
            .count()
    }

    /// Whether a live poller exists for `task_id`.
    pub fn is_polling(&self, task_id: &str) -> bool {
        self.shared
            .lock()
            .pollers
            .get(task_id)
            .is_some_and(|p| !p.handle.is_finished())
    }
}

impl<B: TaskBackend> Drop for TaskRegistry<B> {
    fn drop(&mut self) {
        let stopped = self.stop_all();
        if !stopped.is_empty() {
            debug!(count = stopped.len(), "registry dropped; pollers cancelled");
        }
    }
}
