// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [backend]
/// base_url = "http://localhost:8000"
/// request_timeout = "60s"
///
/// [polling]
/// interval = "3s"
///
/// [failed_tasks]
/// page_size = 20
///
/// [events]
/// capacity = 64
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub backend: BackendSection,

    #[serde(default)]
    pub polling: PollingSection,

    #[serde(default)]
    pub failed_tasks: FailedTasksSection,

    #[serde(default)]
    pub events: EventsSection,
}

/// `[backend]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    /// Root URL of the generation backend; endpoint paths are appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Hard cutoff for a single request, e.g. `"60s"`.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> String {
    "60s".to_string()
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// `[polling]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSection {
    /// Delay between consecutive status fetches for one task.
    #[serde(default = "default_interval")]
    pub interval: String,
}

fn default_interval() -> String {
    "3s".to_string()
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

/// `[failed_tasks]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FailedTasksSection {
    /// `limit` used when listing failed tasks.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    20
}

impl Default for FailedTasksSection {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// `[events]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsSection {
    /// Buffer of the tracker event broadcast channel.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    64
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Validated configuration with typed values.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (or
/// `ConfigFile::default()`), so every instance has passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub page_size: u32,
    pub event_capacity: usize,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        base_url: String,
        request_timeout: Duration,
        poll_interval: Duration,
        page_size: u32,
        event_capacity: usize,
    ) -> Self {
        Self {
            base_url,
            request_timeout,
            poll_interval,
            page_size,
            event_capacity,
        }
    }

    /// Replace the backend URL (e.g. from `--base-url`), re-validating it.
    pub fn with_base_url(mut self, url: impl Into<String>) -> crate::errors::Result<Self> {
        let url = url.into();
        crate::config::validate::validate_base_url(&url)?;
        self.base_url = url.trim().trim_end_matches('/').to_string();
        Ok(self)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            default_base_url(),
            Duration::from_secs(60),
            Duration::from_secs(3),
            default_page_size(),
            default_capacity(),
        )
    }
}
