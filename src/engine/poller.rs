// src/engine/poller.rs

//! Per-task polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::client::TaskBackend;
use crate::engine::registry::Shared;
use crate::errors::{Result, TrackerError};
use crate::model::{Task, TaskId};

/// Drive one task id until a terminal poll result or cancellation.
///
/// - The first fetch happens immediately; later ones on every interval tick.
/// - The next tick is only awaited after the previous fetch was applied, so
///   requests for one id never overlap.
/// - If the cancel channel fires (or its sender is dropped), the loop exits
///   at once, even with a fetch in flight, and that fetch's response is
///   discarded.
pub(crate) async fn run_poller<B: TaskBackend>(
    shared: Arc<Shared<B>>,
    task_id: TaskId,
    generation: u64,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let options = shared.options();
    debug!(task_id = %task_id, generation, interval = ?options.interval, "poller started");

    let mut ticker = time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                debug!(task_id = %task_id, generation, "poller cancelled while idle");
                return;
            }
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                debug!(
                    task_id = %task_id,
                    generation,
                    "poller cancelled with fetch in flight; response dropped"
                );
                return;
            }
            fetched = fetch_once(shared.backend(), &task_id, options.request_timeout) => fetched,
        };

        if !shared.apply_fetch(&task_id, generation, fetched) {
            break;
        }
    }

    debug!(task_id = %task_id, generation, "poller stopped");
}

/// One status fetch with a hard client-side deadline.
async fn fetch_once<B: TaskBackend>(backend: &B, task_id: &str, timeout: Duration) -> Result<Task> {
    match time::timeout(timeout, backend.fetch_status(task_id)).await {
        Ok(fetched) => fetched,
        Err(_) => Err(TrackerError::Transport(format!(
            "status fetch for task '{task_id}' timed out after {timeout:?}"
        ))),
    }
}
