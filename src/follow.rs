// src/follow.rs

//! Rendering a session's events until every followed task has finished.

use std::collections::HashSet;
use std::future::Future;
use std::io::Write;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::client::TaskBackend;
use crate::engine::TrackerEvent;
use crate::errors::Result;
use crate::model::TaskId;
use crate::session::TrackerSession;

/// How a [`follow`] call ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowReport {
    pub completed: Vec<TaskId>,
    /// Ended in `Failed` or `Aborted`.
    pub unsuccessful: Vec<TaskId>,
    /// Finished while the event stream lagged, so the outcome was never seen.
    pub unknown: Vec<TaskId>,
    /// Left still running because `shutdown` fired.
    pub interrupted: Vec<TaskId>,
}

impl FollowReport {
    /// Every followed task completed.
    pub fn all_completed(&self) -> bool {
        self.unsuccessful.is_empty() && self.unknown.is_empty() && self.interrupted.is_empty()
    }
}

/// Print events for `task_ids` to `out` until each has produced a final
/// event, or until `shutdown` resolves.
///
/// `events` must have been subscribed before the tasks were registered,
/// otherwise a final event published in between is never seen.
pub async fn follow<B, W, S>(
    session: &TrackerSession<B>,
    events: &mut broadcast::Receiver<TrackerEvent>,
    task_ids: &[TaskId],
    out: &mut W,
    shutdown: S,
) -> Result<FollowReport>
where
    B: TaskBackend,
    W: Write,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut outstanding: HashSet<TaskId> = task_ids.iter().cloned().collect();
    let mut report = FollowReport::default();
    let mut lagged = false;

    while !outstanding.is_empty() {
        let received = tokio::select! {
            _ = &mut shutdown => {
                info!(remaining = outstanding.len(), "interrupted; stopping all pollers");
                report.interrupted = sorted(outstanding.drain());
                break;
            }
            received = events.recv() => received,
        };

        match received {
            Ok(event) => {
                render_event(session, &event, out)?;
                record(&event, &mut outstanding, &mut report);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event stream lagged; some progress lines were skipped");
                lagged = true;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }

        // After a lag a final event may be gone for good; once nothing is
        // tracked any more, whatever is buffered is all there will be.
        if lagged && session.registry().is_empty() {
            while let Ok(event) = events.try_recv() {
                render_event(session, &event, out)?;
                record(&event, &mut outstanding, &mut report);
            }
            break;
        }
    }

    if !outstanding.is_empty() {
        warn!(count = outstanding.len(), "tasks finished without an observed outcome");
        report.unknown = sorted(outstanding.drain());
        for task_id in &report.unknown {
            writeln!(out, "[{task_id}] finished; outcome not observed")?;
        }
    }

    Ok(report)
}

fn record(event: &TrackerEvent, outstanding: &mut HashSet<TaskId>, report: &mut FollowReport) {
    if !event.is_final() || !outstanding.remove(event.task_id()) {
        return;
    }
    let task_id = event.task_id().to_string();
    match event {
        TrackerEvent::Completed { .. } => report.completed.push(task_id),
        TrackerEvent::Failed { .. } | TrackerEvent::Aborted { .. } => {
            report.unsuccessful.push(task_id)
        }
        TrackerEvent::Cancelled { .. } => report.interrupted.push(task_id),
        TrackerEvent::Progressed { .. } => {}
    }
}

fn sorted(ids: impl Iterator<Item = TaskId>) -> Vec<TaskId> {
    let mut ids: Vec<TaskId> = ids.collect();
    ids.sort();
    ids
}

/// One human-readable line per event.
pub fn render_event<B: TaskBackend, W: Write>(
    session: &TrackerSession<B>,
    event: &TrackerEvent,
    out: &mut W,
) -> Result<()> {
    match event {
        TrackerEvent::Progressed {
            task_id,
            status,
            progress,
        } => {
            let task = session.registry().get(task_id);
            let name = task.as_ref().map(|t| t.name.as_str()).unwrap_or(task_id.as_str());
            let step = task
                .as_ref()
                .and_then(|t| t.current_step.clone().or_else(|| t.message.clone()))
                .map(|s| format!(" - {s}"))
                .unwrap_or_default();
            match progress {
                Some(p) => writeln!(out, "[{task_id}] {name}: {status} {p}%{step}")?,
                None => writeln!(out, "[{task_id}] {name}: {status}{step}")?,
            }
        }
        TrackerEvent::Completed {
            task_id,
            name,
            result,
            retry_of,
        } => {
            let detail = result
                .as_ref()
                .map(|r| {
                    let rows = r
                        .rows_generated
                        .map(|n| format!("{n} rows"))
                        .unwrap_or_else(|| "done".to_string());
                    match &r.filename {
                        Some(file) => format!("{rows} -> {file}"),
                        None => rows,
                    }
                })
                .unwrap_or_else(|| "done".to_string());
            let lineage = retry_of
                .as_ref()
                .map(|id| format!(" (retry of {id})"))
                .unwrap_or_default();
            writeln!(out, "[{task_id}] {name}: completed, {detail}{lineage}")?;
        }
        TrackerEvent::Failed {
            task_id,
            name,
            error,
            ..
        } => writeln!(out, "[{task_id}] {name}: failed: {error}")?,
        TrackerEvent::Aborted { task_id, reason } => {
            writeln!(out, "[{task_id}] lost contact with backend: {reason}")?
        }
        TrackerEvent::Cancelled { task_id } => writeln!(out, "[{task_id}] no longer tracked")?,
    }
    Ok(())
}
