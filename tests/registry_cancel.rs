mod common;
use crate::common::builders::TaskBuilder;
use crate::common::{
    ScriptedBackend, TestResult, drain_events, fast_poll_options, init_tracing, next_final_event,
    wait_until,
};

use std::sync::Arc;
use std::time::Duration;

use synthtrack::engine::{TaskRegistry, TrackerEvent};
use synthtrack::errors::TrackerError;
use synthtrack::types::TaskStatus;

fn registry(backend: &Arc<ScriptedBackend>) -> TaskRegistry<ScriptedBackend> {
    TaskRegistry::new(Arc::clone(backend), fast_poll_options())
}

fn is_outcome(event: &TrackerEvent) -> bool {
    matches!(
        event,
        TrackerEvent::Completed { .. } | TrackerEvent::Failed { .. }
    )
}

#[tokio::test]
async fn test_duplicate_register_keeps_single_poller() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("t3", vec![TaskBuilder::new("t3").running(30).build()]);

    let registry = registry(&backend);
    registry.register("t3", "first")?;

    let err = registry.register("t3", "second").unwrap_err();
    assert!(matches!(err, TrackerError::DuplicateTask(ref id) if id == "t3"));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.poller_count(), 1);
    assert!(registry.is_polling("t3"));
    assert_eq!(registry.get("t3").map(|t| t.name), Some("first".to_string()));

    registry.dispose();
    Ok(())
}

#[tokio::test]
async fn test_empty_task_id_is_rejected() {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    let registry = registry(&backend);

    assert!(matches!(
        registry.register("  ", "blank"),
        Err(TrackerError::Permanent(_))
    ));
    assert!(registry.is_empty());
    assert_eq!(registry.poller_count(), 0);
}

#[tokio::test]
async fn test_unregister_with_fetch_in_flight_drops_late_result() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("t4", vec![TaskBuilder::new("t4").success(10, "late.csv").build()]);
    let gate = backend.pause_fetches_after("t4", 0);

    let registry = registry(&backend);
    let mut events = registry.subscribe();
    registry.register("t4", "in flight")?;

    assert!(wait_until(|| backend.fetch_count("t4") == 1).await);

    assert!(registry.unregister("t4"));
    assert!(!registry.contains("t4"));

    // Let the held fetch answer; nothing may come of it.
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(registry.snapshot().is_empty());
    assert_eq!(registry.poller_count(), 0);
    assert_eq!(backend.fetch_count("t4"), 1);

    let seen = drain_events(&mut events);
    assert!(seen.contains(&TrackerEvent::Cancelled {
        task_id: "t4".to_string()
    }));
    assert!(!seen.iter().any(is_outcome));

    Ok(())
}

#[tokio::test]
async fn test_unregister_is_idempotent() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("t5", vec![TaskBuilder::new("t5").running(1).build()]);

    let registry = registry(&backend);
    let mut events = registry.subscribe();
    registry.register("t5", "twice")?;

    assert!(registry.unregister("t5"));
    assert!(!registry.unregister("t5"));
    assert!(!registry.unregister("never-registered"));

    let cancelled = drain_events(&mut events)
        .into_iter()
        .filter(|e| matches!(e, TrackerEvent::Cancelled { .. }))
        .count();
    assert_eq!(cancelled, 1);

    Ok(())
}

#[tokio::test]
async fn test_cancel_stops_polling_and_asks_backend() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("t7", vec![TaskBuilder::new("t7").running(15).build()]);

    let registry = registry(&backend);
    registry.register("t7", "to cancel")?;
    assert!(wait_until(|| backend.fetch_count("t7") >= 1).await);

    assert!(registry.cancel("t7").await);
    assert!(!registry.contains("t7"));
    assert_eq!(backend.cancel_calls(), vec!["t7".to_string()]);

    let fetches = backend.fetch_count("t7");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(backend.fetch_count("t7"), fetches);

    // Unknown ids are still forwarded to the backend.
    assert!(!registry.cancel("elsewhere").await);
    assert_eq!(backend.cancel_calls().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_dispose_stops_every_poller() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    let ids = ["d1", "d2", "d3"];
    for id in ids {
        backend.script_statuses(id, vec![TaskBuilder::new(id).running(60).build()]);
    }

    let registry = registry(&backend);
    let mut events = registry.subscribe();
    for id in ids {
        registry.register(id, id)?;
    }
    assert!(wait_until(|| ids.iter().all(|id| backend.fetch_count(id) >= 2)).await);

    registry.dispose();
    assert!(registry.is_empty());
    assert_eq!(registry.poller_count(), 0);

    let counts: Vec<usize> = ids.iter().map(|id| backend.fetch_count(id)).collect();
    tokio::time::sleep(Duration::from_millis(60)).await;
    let after: Vec<usize> = ids.iter().map(|id| backend.fetch_count(id)).collect();
    assert_eq!(counts, after);

    let cancelled: Vec<String> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            TrackerEvent::Cancelled { task_id } => Some(task_id),
            _ => None,
        })
        .collect();
    assert_eq!(cancelled, vec!["d1", "d2", "d3"]);

    // A second dispose has nothing left to do.
    registry.dispose();
    Ok(())
}

#[tokio::test]
async fn test_dropping_registry_stops_pollers() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("t8", vec![TaskBuilder::new("t8").running(5).build()]);

    {
        let registry = registry(&backend);
        registry.register("t8", "dropped")?;
        assert!(wait_until(|| backend.fetch_count("t8") >= 2).await);
    }

    // Allow a fetch that was already past the cancel check to finish.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let fetches = backend.fetch_count("t8");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(backend.fetch_count("t8"), fetches);

    Ok(())
}

#[tokio::test]
async fn test_id_can_be_tracked_again_after_terminal_status() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("t9", vec![TaskBuilder::new("t9").failure("disk full").build()]);

    let registry = registry(&backend);
    let mut events = registry.subscribe();
    registry.register("t9", "first run")?;
    assert!(matches!(
        next_final_event(&mut events, "t9").await,
        TrackerEvent::Failed { .. }
    ));

    backend.script_statuses("t9", vec![TaskBuilder::new("t9").running(10).build()]);
    registry.register("t9", "second run")?;

    assert!(
        wait_until(|| registry.get("t9").map(|t| t.status) == Some(TaskStatus::Running)).await
    );
    assert_eq!(registry.get("t9").map(|t| t.name), Some("second run".to_string()));

    registry.dispose();
    Ok(())
}
