// src/client/envelope.rs

//! Error body normalisation.
//!
//! The backend reports errors in several shapes depending on which layer
//! rejected the request:
//!
//! - `{"detail": "Task not found"}`
//! - `{"detail": [{"loc": [...], "msg": "field required"}, ...]}`
//! - `{"error": "..."}` or `{"error": {"message": "..."}}`
//! - `{"message": "..."}`
//! - a plain-text or HTML body
//!
//! [`error_message`] collapses all of them into one string.

use serde_json::Value;

const MAX_TEXT_BODY: usize = 200;

/// Extract a human-readable message from an error response body.
///
/// Falls back to `fallback` (usually the HTTP reason phrase) when the body
/// carries nothing usable.
pub fn error_message(body: &[u8], fallback: &str) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(msg) = message_from_value(&value) {
            return msg;
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() || text.starts_with('{') || text.starts_with('[') {
        return fallback.to_string();
    }

    if text.chars().count() > MAX_TEXT_BODY {
        let truncated: String = text.chars().take(MAX_TEXT_BODY).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

fn message_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(message_from_value).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Object(map) => ["detail", "error", "message", "msg"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(message_from_value),
        _ => None,
    }
}
