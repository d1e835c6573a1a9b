// src/client/mod.rs

//! Task Status Client: the tracker's only view of the generation backend.
//!
//! - [`backend`] defines the `TaskBackend` trait the engine and reconciler
//!   talk to, so tests can substitute a scripted backend.
//! - [`http`] is the production implementation on top of `reqwest`.
//! - [`envelope`] normalises the backend's assorted error body shapes into a
//!   single message before anything is turned into a `TrackerError`.

pub mod backend;
pub mod envelope;
pub mod http;

pub use backend::{BackendFuture, TaskBackend};
pub use http::HttpBackend;
