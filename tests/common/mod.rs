#![allow(dead_code, unused_imports)]

pub use synthtrack_test_utils::builders;
pub use synthtrack_test_utils::scripted_backend::{ListFailure, ScriptedBackend, StatusReply};
pub use synthtrack_test_utils::{
    drain_events, fast_poll_options, fast_session_options, init_tracing, next_final_event,
    wait_until, with_timeout,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
