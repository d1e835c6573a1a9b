// src/reconcile/mod.rs

//! Failed-task reconciliation.
//!
//! - [`reconciler`] lists the server's failed-task history, splits it into
//!   actionable and resolved entries, and submits retries.
//! - [`refresh`] keeps a [`FailedPanel`] up to date by re-listing whenever
//!   the registry reports a failed or aborted task. It only listens to
//!   registry events; the registry never calls into this module.

pub mod reconciler;
pub mod refresh;

use crate::errors::{Result, TrackerError};
use crate::model::FailedTaskView;

pub use reconciler::{FailedTaskReconciler, classify_list_error};
pub use refresh::{FailedTaskRefresher, RefreshOptions, spawn_refresher};

/// What the failed-task panel should show.
#[derive(Debug, Clone, PartialEq)]
pub enum FailedPanel {
    /// No list has been fetched yet.
    Loading,
    Ready(FailedTaskView),
    /// The backend does not offer the failed-tasks feature; hide the panel.
    Hidden,
    /// Listing failed; `retryable` tells whether "Try Again" makes sense.
    Error { message: String, retryable: bool },
}

impl FailedPanel {
    pub fn from_result(result: Result<FailedTaskView>) -> Self {
        match result {
            Ok(view) => FailedPanel::Ready(view),
            Err(TrackerError::EndpointUnavailable(_)) => FailedPanel::Hidden,
            Err(err) => FailedPanel::Error {
                retryable: err.is_transient(),
                message: err.to_string(),
            },
        }
    }

    pub fn view(&self) -> Option<&FailedTaskView> {
        match self {
            FailedPanel::Ready(view) => Some(view),
            _ => None,
        }
    }
}
