// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod errors;
pub mod follow;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod types;

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::client::{HttpBackend, TaskBackend};
use crate::config::{ConfigFile, load_or_default};
use crate::engine::TrackerEvent;
use crate::follow::follow;
use crate::model::{FailedTask, FailedTaskView, GenerationRequest, TaskId};
use crate::reconcile::FailedTaskReconciler;
use crate::session::{SessionOptions, TrackerSession};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the HTTP backend
/// - a tracker session for commands that follow tasks
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(&args.config)?;
    if let Some(url) = args.base_url {
        cfg = cfg.with_base_url(url)?;
    }
    debug!(?cfg, "configuration loaded");

    if let Command::CheckConfig = args.command {
        print_config(&cfg);
        return Ok(());
    }

    let backend = Arc::new(HttpBackend::from_config(&cfg)?);

    match args.command {
        Command::CheckConfig => Ok(()),
        Command::Cancel { task_id } => {
            backend.cancel_task(&task_id).await?;
            println!("cancel requested for task {task_id}");
            Ok(())
        }
        Command::Failed { limit, offset, all } => {
            let reconciler = FailedTaskReconciler::new(backend);
            let limit = limit.unwrap_or(cfg.page_size);
            match reconciler.list_failed_tasks(limit, offset).await {
                Ok(view) => {
                    print_failed_view(&view, all);
                    Ok(())
                }
                Err(errors::TrackerError::EndpointUnavailable(reason)) => {
                    info!(%reason, "failed-tasks endpoint unavailable");
                    println!("failed-task history is not available on this backend");
                    Ok(())
                }
                Err(err) => Err(err.into()),
            }
        }
        Command::Submit {
            file,
            rows,
            columns,
            detach,
        } => {
            let request = GenerationRequest {
                file_name: file,
                num_rows: rows,
                columns,
            };

            if detach {
                let submitted = backend.submit(&request).await?;
                println!("{}", submitted.task_id);
                return Ok(());
            }

            let session = TrackerSession::new(backend, SessionOptions::from(&cfg));
            let events = session.subscribe();
            let submitted = session.submit(&request).await?;
            println!(
                "submitted {} ({}){}",
                submitted.task_id,
                submitted.task_name,
                submitted
                    .estimated_time_seconds
                    .map(|s| format!(", estimated {s}s"))
                    .unwrap_or_default()
            );
            follow_to_end(session, events, &[submitted.task_id]).await
        }
        Command::Track { task_ids, name } => {
            let session = TrackerSession::new(backend, SessionOptions::from(&cfg));
            let events = session.subscribe();
            for task_id in &task_ids {
                let display = name.clone().unwrap_or_else(|| task_id.clone());
                session.track(task_id.clone(), display)?;
            }
            follow_to_end(session, events, &task_ids).await
        }
        Command::Retry {
            failed_task_id,
            detach,
        } => {
            let session = TrackerSession::new(backend, SessionOptions::from(&cfg));
            let events = session.subscribe();
            let submitted = session.retry_by_id(&failed_task_id).await?;
            println!(
                "retrying {} as {} ({})",
                failed_task_id, submitted.task_id, submitted.task_name
            );

            if detach {
                session.dispose();
                return Ok(());
            }
            follow_to_end(session, events, &[submitted.task_id]).await
        }
    }
}

/// Follow `task_ids` to the end on stdout, then dispose the session.
///
/// Fails if any followed task did not complete.
async fn follow_to_end<B: TaskBackend>(
    session: TrackerSession<B>,
    mut events: broadcast::Receiver<TrackerEvent>,
    task_ids: &[TaskId],
) -> Result<()> {
    let mut stdout = std::io::stdout();
    let report = follow(&session, &mut events, task_ids, &mut stdout, ctrl_c()).await?;
    session.dispose();

    if !report.unsuccessful.is_empty() {
        bail!(
            "{} task(s) did not complete ({}); see `synthtrack failed`",
            report.unsuccessful.len(),
            report.unsuccessful.join(", ")
        );
    }
    if !report.unknown.is_empty() {
        bail!(
            "outcome of {} task(s) was not observed ({})",
            report.unknown.len(),
            report.unknown.join(", ")
        );
    }
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the signal cannot be listened for.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

fn print_failed_view(view: &FailedTaskView, include_resolved: bool) {
    if view.actionable.is_empty() {
        println!("no failed tasks need attention");
    } else {
        println!("failed tasks ({}):", view.actionable.len());
        for task in &view.actionable {
            print_failed_task(task);
        }
    }

    if include_resolved && !view.resolved.is_empty() {
        println!();
        println!("resolved by retry ({}):", view.resolved.len());
        for task in &view.resolved {
            print_failed_task(task);
        }
    }
}

fn print_failed_task(task: &FailedTask) {
    println!("  - {} ({})", task.id, task.task_name);
    println!("      type: {}", task.failure_type);
    println!("      error: {}", task.error_message);
    println!("      attempts: {}", task.retry_attempts_count);
    if let Some(ref at) = task.created_at {
        println!("      failed at: {at}");
    }
    if task.has_successful_retry {
        if let Some(ref result) = task.successful_retry_result {
            if let Some(ref file) = result.filename {
                println!("      resolved: {file}");
            }
        }
    } else if task.can_retry {
        println!("      retry: synthtrack retry {}", task.id);
    } else {
        println!("      retry: not allowed");
    }
}

fn print_config(cfg: &ConfigFile) {
    println!("synthtrack config");
    println!("  backend.base_url = {}", cfg.base_url);
    println!("  backend.request_timeout = {:?}", cfg.request_timeout);
    println!("  polling.interval = {:?}", cfg.poll_interval);
    println!("  failed_tasks.page_size = {}", cfg.page_size);
    println!("  events.capacity = {}", cfg.event_capacity);
}
