// src/client/backend.rs

//! Pluggable backend abstraction.
//!
//! Everything above this trait sees typed results only: transport failures,
//! undecodable bodies and non-2xx replies have already been mapped onto
//! `TrackerError` variants by the implementation.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::model::{FailedTask, GenerationRequest, SubmittedTask, Task};

/// Boxed future returned by every backend call.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Request/response surface of the generation backend.
///
/// Production code uses [`crate::client::HttpBackend`]; tests provide their
/// own implementation that replays scripted responses.
pub trait TaskBackend: Send + Sync + 'static {
    /// Submit a new generation job.
    fn submit<'a>(&'a self, request: &'a GenerationRequest) -> BackendFuture<'a, SubmittedTask>;

    /// Fetch the current server view of one task.
    ///
    /// Fails with `Transport`, `Decode` or `NotFound`.
    fn fetch_status<'a>(&'a self, task_id: &'a str) -> BackendFuture<'a, Task>;

    /// One page of the server's failed-task history.
    fn list_failed_tasks(&self, limit: u32, offset: u32) -> BackendFuture<'_, Vec<FailedTask>>;

    /// Ask the backend to re-run a failed task; returns the new task.
    fn retry_failed_task<'a>(&'a self, failed_task_id: &'a str)
    -> BackendFuture<'a, SubmittedTask>;

    /// Best-effort server-side cancellation.
    fn cancel_task<'a>(&'a self, task_id: &'a str) -> BackendFuture<'a, ()>;
}
