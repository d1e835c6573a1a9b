mod common;
use crate::common::builders::TaskBuilder;
use crate::common::{
    ScriptedBackend, StatusReply, TestResult, fast_poll_options, init_tracing, next_final_event,
    wait_until,
};

use std::sync::Arc;
use std::time::Duration;

use synthtrack::engine::{PollOptions, TaskRegistry, TrackerEvent};
use synthtrack::types::TaskStatus;

fn registry(backend: &Arc<ScriptedBackend>) -> TaskRegistry<ScriptedBackend> {
    TaskRegistry::new(Arc::clone(backend), fast_poll_options())
}

#[tokio::test]
async fn test_progress_then_success_reports_result_and_stops() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses(
        "t1",
        vec![
            TaskBuilder::new("t1").pending().build(),
            TaskBuilder::new("t1").running(40).build(),
            TaskBuilder::new("t1").success(100, "out.csv").build(),
        ],
    );
    // Hold the third poll so the state after poll two can be inspected.
    let gate = backend.pause_fetches_after("t1", 2);

    let registry = registry(&backend);
    let mut events = registry.subscribe();
    registry.register("t1", "customers")?;

    assert!(wait_until(|| backend.fetch_count("t1") == 3).await);

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].task_id, "t1");
    assert_eq!(snapshot[0].task.name, "customers");
    assert_eq!(snapshot[0].task.status, TaskStatus::Running);
    assert_eq!(snapshot[0].task.progress, Some(40));

    gate.notify_one();

    match next_final_event(&mut events, "t1").await {
        TrackerEvent::Completed { result, name, .. } => {
            let result = result.expect("completed event carries the result");
            assert_eq!(result.rows_generated, Some(100));
            assert_eq!(result.filename.as_deref(), Some("out.csv"));
            assert_eq!(name, "customers");
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    assert!(registry.snapshot().is_empty());
    assert!(!registry.contains("t1"));
    assert_eq!(registry.poller_count(), 0);

    // No fetch after the terminal status.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(backend.fetch_count("t1"), 3);

    Ok(())
}

#[tokio::test]
async fn test_first_fetch_is_immediate() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("slow", vec![TaskBuilder::new("slow").running(5).build()]);

    let options = PollOptions {
        interval: Duration::from_secs(30),
        ..fast_poll_options()
    };
    let registry = TaskRegistry::new(Arc::clone(&backend), options);
    registry.register("slow", "slow job")?;

    // Well inside the first interval.
    assert!(wait_until(|| backend.fetch_count("slow") == 1).await);
    assert!(wait_until(|| registry.get("slow").and_then(|t| t.progress) == Some(5)).await);
    assert_eq!(backend.fetch_count("slow"), 1);

    registry.dispose();
    Ok(())
}

#[tokio::test]
async fn test_failure_status_emits_failed_and_stops() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses(
        "t2",
        vec![
            TaskBuilder::new("t2").running(10).build(),
            TaskBuilder::new("t2").failure("OOM").build(),
        ],
    );

    let registry = registry(&backend);
    let mut events = registry.subscribe();
    registry.register("t2", "orders")?;

    match next_final_event(&mut events, "t2").await {
        TrackerEvent::Failed { error, retry_of, .. } => {
            assert_eq!(error, "OOM");
            assert_eq!(retry_of, None);
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    assert!(registry.snapshot().is_empty());
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(backend.fetch_count("t2"), 2);

    Ok(())
}

#[tokio::test]
async fn test_transport_error_aborts_without_retrying_the_poll() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.push_reply("t3", StatusReply::TransportError("connection reset".into()));

    let registry = registry(&backend);
    let mut events = registry.subscribe();
    registry.register("t3", "lost")?;

    match next_final_event(&mut events, "t3").await {
        TrackerEvent::Aborted { reason, .. } => assert!(reason.contains("connection reset")),
        other => panic!("expected Aborted, got {other:?}"),
    }

    assert!(!registry.contains("t3"));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(backend.fetch_count("t3"), 1);

    Ok(())
}

#[tokio::test]
async fn test_decode_error_is_treated_like_transport_error() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("t4", vec![TaskBuilder::new("t4").running(20).build()]);
    backend.push_reply("t4", StatusReply::DecodeError("missing field `status`".into()));

    let registry = registry(&backend);
    let mut events = registry.subscribe();
    registry.register("t4", "garbled")?;

    assert!(matches!(
        next_final_event(&mut events, "t4").await,
        TrackerEvent::Aborted { .. }
    ));
    assert!(registry.is_empty());
    assert_eq!(backend.fetch_count("t4"), 2);

    Ok(())
}

#[tokio::test]
async fn test_unknown_task_aborts() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    let registry = registry(&backend);
    let mut events = registry.subscribe();
    registry.register("ghost", "ghost")?;

    match next_final_event(&mut events, "ghost").await {
        TrackerEvent::Aborted { reason, .. } => assert!(reason.contains("Not found")),
        other => panic!("expected Aborted, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_slow_fetch_hits_request_timeout() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("t5", vec![TaskBuilder::new("t5").running(1).build()]);
    // Never released.
    let _gate = backend.pause_fetches_after("t5", 0);

    let options = PollOptions {
        request_timeout: Duration::from_millis(50),
        ..fast_poll_options()
    };
    let registry = TaskRegistry::new(Arc::clone(&backend), options);
    let mut events = registry.subscribe();
    registry.register("t5", "stuck")?;

    match next_final_event(&mut events, "t5").await {
        TrackerEvent::Aborted { reason, .. } => assert!(reason.contains("timed out")),
        other => panic!("expected Aborted, got {other:?}"),
    }
    assert!(registry.is_empty());
    assert_eq!(backend.fetch_count("t5"), 1);

    Ok(())
}

#[tokio::test]
async fn test_snapshot_keeps_registration_order() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    for id in ["b", "a", "c"] {
        backend.script_statuses(id, vec![TaskBuilder::new(id).running(50).build()]);
    }

    let registry = registry(&backend);
    registry.register("b", "second letter")?;
    registry.register("a", "first letter")?;
    registry.register("c", "third letter")?;

    assert!(
        wait_until(|| ["a", "b", "c"]
            .iter()
            .all(|id| registry.get(id).map(|t| t.status) == Some(TaskStatus::Running)))
        .await
    );

    let ids: Vec<String> = registry.snapshot().into_iter().map(|t| t.task_id).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);

    registry.dispose();
    Ok(())
}

#[tokio::test]
async fn test_server_name_replaces_registered_name() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses(
        "t6",
        vec![TaskBuilder::new("t6").name("Synthetic customers").running(70).step("sampling").build()],
    );

    let registry = registry(&backend);
    registry.register("t6", "t6")?;

    assert!(wait_until(|| registry.get("t6").and_then(|t| t.progress) == Some(70)).await);
    let task = registry.get("t6").expect("still tracked");
    assert_eq!(task.name, "Synthetic customers");
    assert_eq!(task.current_step.as_deref(), Some("sampling"));

    registry.dispose();
    Ok(())
}

#[tokio::test]
async fn test_zero_interval_is_raised_to_minimum() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses(
        "t7",
        vec![
            TaskBuilder::new("t7").running(50).build(),
            TaskBuilder::new("t7").success(1, "fast.csv").build(),
        ],
    );

    let options = PollOptions {
        interval: Duration::ZERO,
        event_capacity: 0,
        ..fast_poll_options()
    };
    let registry = TaskRegistry::new(Arc::clone(&backend), options);
    assert_eq!(registry.options().interval, PollOptions::MIN_INTERVAL);
    assert_eq!(registry.options().event_capacity, 1);

    registry.register("t7", "zero interval")?;

    assert!(wait_until(|| !registry.contains("t7")).await);
    assert_eq!(registry.poller_count(), 0);
    assert_eq!(backend.fetch_count("t7"), 2);

    Ok(())
}
