// src/reconcile/refresh.rs

//! Background refresh of the failed-task panel.

use std::sync::Arc;

use tokio::sync::{Notify, broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::TaskBackend;
use crate::engine::TrackerEvent;
use crate::reconcile::{FailedPanel, FailedTaskReconciler};

/// Which page the refresher keeps current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    pub limit: u32,
    pub offset: u32,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

/// Why a refresh is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Manual,
    TaskFailed,
    Lagged,
}

/// Handle to the background refresher task.
///
/// Dropping the handle stops the refresher.
pub struct FailedTaskRefresher {
    panel: watch::Receiver<FailedPanel>,
    manual: Arc<Notify>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl FailedTaskRefresher {
    /// Receiver that observes every published panel state.
    pub fn panel(&self) -> watch::Receiver<FailedPanel> {
        self.panel.clone()
    }

    pub fn current(&self) -> FailedPanel {
        self.panel.borrow().clone()
    }

    /// Re-list now (the user's "Try Again").
    pub fn request_refresh(&self) {
        self.manual.notify_one();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(mut self) {
        self.shutdown_now();
    }

    fn shutdown_now(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for FailedTaskRefresher {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

/// Spawn the refresher.
///
/// It lists once at start, then again on every `Failed` or `Aborted` event
/// from `events`, on a manual request, or after falling behind the event
/// stream. Results are published on the returned handle's panel channel.
pub fn spawn_refresher<B: TaskBackend>(
    reconciler: Arc<FailedTaskReconciler<B>>,
    events: broadcast::Receiver<TrackerEvent>,
    options: RefreshOptions,
) -> FailedTaskRefresher {
    let (panel_tx, panel_rx) = watch::channel(FailedPanel::Loading);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let manual = Arc::new(Notify::new());

    let handle = tokio::spawn(refresh_loop(
        reconciler,
        events,
        options,
        panel_tx,
        Arc::clone(&manual),
        shutdown_rx,
    ));

    FailedTaskRefresher {
        panel: panel_rx,
        manual,
        shutdown: Some(shutdown_tx),
        handle,
    }
}

async fn refresh_loop<B: TaskBackend>(
    reconciler: Arc<FailedTaskReconciler<B>>,
    mut events: broadcast::Receiver<TrackerEvent>,
    options: RefreshOptions,
    panel_tx: watch::Sender<FailedPanel>,
    manual: Arc<Notify>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(limit = options.limit, offset = options.offset, "failed-task refresher started");
    let mut trigger = Some(Trigger::Manual);

    while let Some(reason) = trigger {
        let result = tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            result = reconciler.list_failed_tasks(options.limit, options.offset) => result,
        };

        let panel = FailedPanel::from_result(result);
        debug!(?reason, ?panel, "failed-task panel refreshed");
        if matches!(panel, FailedPanel::Hidden) {
            info!("failed-tasks endpoint unavailable; hiding panel");
        }
        panel_tx.send_replace(panel);

        trigger = tokio::select! {
            biased;
            _ = &mut shutdown_rx => None,
            next = next_trigger(&mut events, &manual) => next,
        };
    }

    debug!("failed-task refresher stopped");
}

/// Wait for the next reason to re-list. `None` once the event source is gone.
async fn next_trigger(
    events: &mut broadcast::Receiver<TrackerEvent>,
    manual: &Notify,
) -> Option<Trigger> {
    loop {
        tokio::select! {
            _ = manual.notified() => return Some(Trigger::Manual),
            received = events.recv() => match received {
                Ok(TrackerEvent::Failed { task_id, .. })
                | Ok(TrackerEvent::Aborted { task_id, .. }) => {
                    debug!(task_id = %task_id, "task failure observed; refreshing failed tasks");
                    return Some(Trigger::TaskFailed);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "refresher lagged behind registry events");
                    return Some(Trigger::Lagged);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            },
        }
    }
}
