// src/model/mod.rs

//! Wire-level data model shared by the client, the engine and the reconciler.
//!
//! The backend's JSON schema is treated as an opaque contract; these types
//! decode exactly the fields the tracker needs and tolerate the rest.

pub mod failed;
pub mod task;

pub use failed::{FailedTask, FailedTaskPage, FailedTaskView};
pub use task::{GenerationRequest, SubmittedTask, Task, TaskId, TaskResult};
