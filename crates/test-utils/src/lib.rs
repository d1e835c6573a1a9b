pub mod builders;
pub mod scripted_backend;

use std::sync::Once;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt};

use synthtrack::engine::TrackerEvent;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `cond` every few milliseconds until it holds or 5 seconds pass.
pub async fn wait_until<F>(mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Receive events until one for `task_id` ends its tracking.
pub async fn next_final_event(
    events: &mut broadcast::Receiver<TrackerEvent>,
    task_id: &str,
) -> TrackerEvent {
    with_timeout(async {
        loop {
            match events.recv().await {
                Ok(event) if event.task_id() == task_id && event.is_final() => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("event channel closed before task {task_id} finished")
                }
            }
        }
    })
    .await
}

/// Everything currently buffered on `events`, without waiting.
pub fn drain_events(events: &mut broadcast::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => out.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}

/// Poll options suited to tests: fast ticks, generous per-request deadline.
pub fn fast_poll_options() -> synthtrack::engine::PollOptions {
    synthtrack::engine::PollOptions {
        interval: Duration::from_millis(10),
        request_timeout: Duration::from_secs(2),
        event_capacity: 256,
    }
}

/// Session options built on [`fast_poll_options`].
pub fn fast_session_options() -> synthtrack::session::SessionOptions {
    synthtrack::session::SessionOptions {
        poll: fast_poll_options(),
        failed_page: synthtrack::reconcile::RefreshOptions {
            limit: 20,
            offset: 0,
        },
    }
}
