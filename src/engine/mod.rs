// src/engine/mod.rs

//! Task tracking engine.
//!
//! This module ties together:
//! - the pure registry state machine ([`state`]) that decides what every
//!   poll result means for a tracked task,
//! - the per-task poller loop ([`poller`]) that fetches status on a fixed
//!   interval until a terminal state or cancellation,
//! - the async registry shell ([`registry`]) that owns poller lifetimes and
//!   publishes [`TrackerEvent`]s.

use std::time::Duration;

use tracing::warn;

use crate::config::ConfigFile;
use crate::model::{TaskId, TaskResult};
use crate::types::TaskStatus;

/// Notifications published by the registry.
///
/// `Completed` and `Failed` are the user-facing outcomes. `Aborted` means
/// polling stopped because the backend could not be read; `Cancelled`
/// means the registration was removed on request.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A non-terminal status was applied.
    Progressed {
        task_id: TaskId,
        status: TaskStatus,
        progress: Option<u8>,
    },
    Completed {
        task_id: TaskId,
        name: String,
        result: Option<TaskResult>,
        retry_of: Option<String>,
    },
    Failed {
        task_id: TaskId,
        name: String,
        error: String,
        retry_of: Option<String>,
    },
    Aborted {
        task_id: TaskId,
        reason: String,
    },
    Cancelled {
        task_id: TaskId,
    },
}

impl TrackerEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TrackerEvent::Progressed { task_id, .. }
            | TrackerEvent::Completed { task_id, .. }
            | TrackerEvent::Failed { task_id, .. }
            | TrackerEvent::Aborted { task_id, .. }
            | TrackerEvent::Cancelled { task_id } => task_id,
        }
    }

    /// Whether this event ends tracking of its task id.
    pub fn is_final(&self) -> bool {
        !matches!(self, TrackerEvent::Progressed { .. })
    }
}

/// Timing knobs shared by every poller of one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay between consecutive fetches for the same task.
    pub interval: Duration,
    /// Hard cutoff for a single status fetch.
    pub request_timeout: Duration,
    /// Buffer of the event broadcast channel.
    pub event_capacity: usize,
}

impl PollOptions {
    /// Shortest interval a poller will run with.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Raise a zero `interval` to [`PollOptions::MIN_INTERVAL`] and a zero
    /// `event_capacity` to 1.
    pub fn sanitized(self) -> Self {
        let mut options = self;
        if options.interval < Self::MIN_INTERVAL {
            warn!(interval = ?options.interval, "poll interval too short; using 1ms");
            options.interval = Self::MIN_INTERVAL;
        }
        options.event_capacity = options.event_capacity.max(1);
        options
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from(&ConfigFile::default())
    }
}

impl From<&ConfigFile> for PollOptions {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            interval: cfg.poll_interval,
            request_timeout: cfg.request_timeout,
            event_capacity: cfg.event_capacity,
        }
    }
}

pub mod poller;
pub mod registry;
pub mod state;

pub use registry::TaskRegistry;
pub use state::{PollStep, RegistryState, TrackedTask};
