mod common;
use crate::common::builders::TaskBuilder;
use crate::common::{
    ScriptedBackend, StatusReply, TestResult, fast_session_options, init_tracing, with_timeout,
};

use std::future::pending;
use std::sync::Arc;

use synthtrack::follow::follow;
use synthtrack::session::TrackerSession;

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).expect("utf-8 output")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_follow_reports_failure_finishing_next_to_success() -> TestResult {
    init_tracing();

    // Both tasks finish on their first fetch, so the two final events race.
    for round in 0..30 {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script_statuses("a", vec![TaskBuilder::new("a").success(10, "a.csv").build()]);
        backend.script_statuses("b", vec![TaskBuilder::new("b").failure("OOM").build()]);

        let session = TrackerSession::new(Arc::clone(&backend), fast_session_options());
        let mut events = session.subscribe();
        let ids = vec!["a".to_string(), "b".to_string()];
        for id in &ids {
            session.track(id.clone(), id.clone())?;
        }

        let mut out = Vec::new();
        let report =
            with_timeout(follow(&session, &mut events, &ids, &mut out, pending())).await?;
        session.dispose();

        assert_eq!(report.completed, vec!["a"], "round {round}");
        assert_eq!(report.unsuccessful, vec!["b"], "round {round}");
        assert!(!report.all_completed());

        let printed = output(out);
        assert!(printed.contains("[a] a: completed, 10 rows -> a.csv"), "round {round}: {printed}");
        assert!(printed.contains("[b] b: failed: OOM"), "round {round}: {printed}");
    }

    Ok(())
}

#[tokio::test]
async fn test_follow_prints_progress_lines() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses(
        "t1",
        vec![
            TaskBuilder::new("t1").running(40).step("sampling").build(),
            TaskBuilder::new("t1").success(100, "out.csv").build(),
        ],
    );

    // Keep the task tracked long enough for its progress line to be rendered.
    let gate = backend.pause_fetches_after("t1", 1);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        gate.notify_one();
    });

    let session = TrackerSession::new(Arc::clone(&backend), fast_session_options());
    let mut events = session.subscribe();
    session.track("t1", "customers")?;

    let ids = vec!["t1".to_string()];
    let mut out = Vec::new();
    let report = with_timeout(follow(&session, &mut events, &ids, &mut out, pending())).await?;
    session.dispose();

    assert!(report.all_completed());
    let printed = output(out);
    assert!(printed.contains("[t1] customers: running 40% - sampling"), "{printed}");
    assert!(printed.contains("[t1] customers: completed, 100 rows -> out.csv"), "{printed}");

    Ok(())
}

#[tokio::test]
async fn test_follow_counts_aborted_tasks_as_unsuccessful() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.push_reply("lost", StatusReply::TransportError("connection reset".into()));

    let session = TrackerSession::new(Arc::clone(&backend), fast_session_options());
    let mut events = session.subscribe();
    session.track("lost", "lost")?;

    let ids = vec!["lost".to_string()];
    let mut out = Vec::new();
    let report = with_timeout(follow(&session, &mut events, &ids, &mut out, pending())).await?;
    session.dispose();

    assert_eq!(report.unsuccessful, vec!["lost"]);
    assert!(output(out).contains("[lost] lost contact with backend"));

    Ok(())
}

#[tokio::test]
async fn test_follow_stops_on_shutdown() -> TestResult {
    init_tracing();

    let backend = Arc::new(ScriptedBackend::new());
    backend.script_statuses("slow", vec![TaskBuilder::new("slow").running(5).build()]);

    let session = TrackerSession::new(Arc::clone(&backend), fast_session_options());
    let mut events = session.subscribe();
    session.track("slow", "slow")?;

    let ids = vec!["slow".to_string()];
    let mut out = Vec::new();
    let shutdown = tokio::time::sleep(std::time::Duration::from_millis(50));
    let report = with_timeout(follow(&session, &mut events, &ids, &mut out, shutdown)).await?;

    assert_eq!(report.interrupted, vec!["slow"]);
    assert!(report.completed.is_empty() && report.unsuccessful.is_empty());
    assert!(session.registry().contains("slow"));

    session.dispose();
    Ok(())
}
