// src/engine/state.rs

//! Pure registry state machine.
//!
//! `RegistryState` holds the latest known `Task` for every tracked id and
//! decides, for each poll result, whether polling continues and which
//! notification to publish. It has no Tokio types and performs no IO, so the
//! transition rules can be tested synchronously.
//!
//! Every registration gets a fresh, monotonically increasing generation. It
//! orders the snapshot (first registered first) and lets results from a
//! poller whose registration was removed be recognised and dropped.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::engine::TrackerEvent;
use crate::errors::{Result, TrackerError};
use crate::model::{Task, TaskId};
use crate::types::TaskStatus;

#[derive(Debug, Clone)]
struct Registration {
    generation: u64,
    task: Task,
}

/// One row of [`RegistryState::snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTask {
    pub task_id: TaskId,
    pub task: Task,
}

/// Decision returned after applying a single poll result.
#[derive(Debug, Clone, PartialEq)]
pub struct PollStep {
    /// Notification to publish, if any.
    pub event: Option<TrackerEvent>,
    /// Whether the poller should fetch again.
    pub keep_polling: bool,
    /// Whether this step removed the registration.
    pub released: bool,
}

impl PollStep {
    fn stale() -> Self {
        Self {
            event: None,
            keep_polling: false,
            released: false,
        }
    }

    fn finished(event: TrackerEvent) -> Self {
        Self {
            event: Some(event),
            keep_polling: false,
            released: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct RegistryState {
    entries: HashMap<TaskId, Registration>,
    next_generation: u64,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.entries.contains_key(task_id)
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.entries.get(task_id).map(|r| &r.task)
    }

    pub fn generation_of(&self, task_id: &str) -> Option<u64> {
        self.entries.get(task_id).map(|r| r.generation)
    }

    /// Whether `generation` is the live registration of `task_id`.
    pub fn is_current(&self, task_id: &str, generation: u64) -> bool {
        self.generation_of(task_id) == Some(generation)
    }

    /// Start tracking `task_id`, seeded with a `pending` record.
    ///
    /// Returns the generation assigned to the new registration. An id that is
    /// already tracked is rejected and the existing registration is left
    /// untouched.
    pub fn register(
        &mut self,
        task_id: &str,
        name: &str,
        retry_of: Option<String>,
    ) -> Result<u64> {
        if self.entries.contains_key(task_id) {
            return Err(TrackerError::DuplicateTask(task_id.to_string()));
        }

        self.next_generation += 1;
        let generation = self.next_generation;

        let mut task = Task::pending(task_id, name);
        task.retry_of = retry_of;

        self.entries
            .insert(task_id.to_string(), Registration { generation, task });
        debug!(task_id, generation, "registration created");

        Ok(generation)
    }

    /// Remove a registration. Unknown ids are a no-op.
    pub fn unregister(&mut self, task_id: &str) -> Option<Task> {
        self.entries.remove(task_id).map(|r| r.task)
    }

    /// Remove every registration, returning ids in insertion order.
    pub fn drain(&mut self) -> Vec<TaskId> {
        let mut regs: Vec<(TaskId, u64)> = self
            .entries
            .drain()
            .map(|(id, reg)| (id, reg.generation))
            .collect();
        regs.sort_by_key(|(_, generation)| *generation);
        regs.into_iter().map(|(id, _)| id).collect()
    }

    /// Apply the outcome of one status fetch made by poller `generation`.
    ///
    /// - stale generation / unknown id: nothing changes, the poller stops.
    /// - `pending` / `running`: record updated, polling continues.
    /// - `success` / `failure`: registration removed, outcome published.
    /// - fetch error: registration removed, `Aborted` published.
    pub fn apply_fetch(
        &mut self,
        task_id: &str,
        generation: u64,
        fetched: Result<Task>,
    ) -> PollStep {
        if !self.is_current(task_id, generation) {
            debug!(task_id, generation, "discarding poll result for stale registration");
            return PollStep::stale();
        }

        let fetched = match fetched {
            Ok(task) => task,
            Err(err) => {
                self.entries.remove(task_id);
                warn!(
                    task_id,
                    generation,
                    error = %err,
                    "status fetch failed; polling aborted"
                );
                return PollStep::finished(TrackerEvent::Aborted {
                    task_id: task_id.to_string(),
                    reason: err.to_string(),
                });
            }
        };

        let Some(reg) = self.entries.get_mut(task_id) else {
            return PollStep::stale();
        };

        let previous = reg.task.status;
        let task = merge_fetched(&reg.task, fetched);

        if regressed(previous, task.status) {
            debug!(
                task_id,
                from = %previous,
                to = %task.status,
                "server reported an earlier status than last seen"
            );
        }

        match task.status {
            TaskStatus::Pending | TaskStatus::Running => {
                let event = TrackerEvent::Progressed {
                    task_id: task_id.to_string(),
                    status: task.status,
                    progress: task.progress,
                };
                reg.task = task;
                PollStep {
                    event: Some(event),
                    keep_polling: true,
                    released: false,
                }
            }
            TaskStatus::Success => {
                self.entries.remove(task_id);
                info!(task_id, "task completed");
                PollStep::finished(TrackerEvent::Completed {
                    task_id: task_id.to_string(),
                    name: task.name,
                    result: task.result,
                    retry_of: task.retry_of,
                })
            }
            TaskStatus::Failure => {
                self.entries.remove(task_id);
                let error = task.error.unwrap_or_else(|| "unknown error".to_string());
                info!(task_id, %error, "task failed");
                PollStep::finished(TrackerEvent::Failed {
                    task_id: task_id.to_string(),
                    name: task.name,
                    error,
                    retry_of: task.retry_of,
                })
            }
        }
    }

    /// Tracked tasks in registration order.
    pub fn snapshot(&self) -> Vec<TrackedTask> {
        let mut regs: Vec<&Registration> = self.entries.values().collect();
        regs.sort_by_key(|r| r.generation);
        regs.into_iter()
            .map(|r| TrackedTask {
                task_id: r.task.id.clone(),
                task: r.task.clone(),
            })
            .collect()
    }
}

/// Overlay a fetched task onto the registered record.
///
/// The id, and the name when the server omits it, come from the registration;
/// lineage is client-side only and always carried over.
fn merge_fetched(current: &Task, fetched: Task) -> Task {
    let mut task = fetched.normalize();
    task.id = current.id.clone();
    if task.name.trim().is_empty() {
        task.name = current.name.clone();
    }
    task.retry_of = current.retry_of.clone();
    task
}

fn regressed(previous: TaskStatus, next: TaskStatus) -> bool {
    previous == TaskStatus::Running && next == TaskStatus::Pending
}
