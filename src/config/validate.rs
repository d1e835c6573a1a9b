// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TrackerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TrackerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_base_url(&raw.backend.base_url)?;

        let request_timeout =
            parse_nonzero_duration("[backend].request_timeout", &raw.backend.request_timeout)?;
        let poll_interval = parse_nonzero_duration("[polling].interval", &raw.polling.interval)?;

        if raw.failed_tasks.page_size == 0 {
            return Err(TrackerError::ConfigError(
                "[failed_tasks].page_size must be >= 1 (got 0)".to_string(),
            ));
        }

        if raw.events.capacity == 0 {
            return Err(TrackerError::ConfigError(
                "[events].capacity must be >= 1 (got 0)".to_string(),
            ));
        }

        Ok(ConfigFile::new_unchecked(
            raw.backend.base_url.trim().trim_end_matches('/').to_string(),
            request_timeout,
            poll_interval,
            raw.failed_tasks.page_size,
            raw.events.capacity,
        ))
    }
}

pub(crate) fn validate_base_url(url: &str) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(TrackerError::ConfigError(
            "[backend].base_url must not be empty".to_string(),
        ));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(TrackerError::ConfigError(format!(
            "[backend].base_url must start with http:// or https:// (got '{url}')"
        )));
    }
    Ok(())
}

fn parse_nonzero_duration(field: &str, value: &str) -> Result<Duration> {
    let duration = parse_duration(value)
        .map_err(|e| TrackerError::ConfigError(format!("{field}: {e}")))?;
    if duration.is_zero() {
        return Err(TrackerError::ConfigError(format!("{field} must be greater than zero")));
    }
    Ok(duration)
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
