//! General utilities shared across the bridge.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol_constants::MICROS_PER_SECOND;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Converts receiver seconds into MPRIS microseconds.
///
/// Non-finite inputs map to 0.
#[must_use]
pub fn seconds_to_micros(seconds: f64) -> i64 {
    if seconds.is_finite() {
        (seconds * MICROS_PER_SECOND).round() as i64
    } else {
        0
    }
}

/// Converts receiver seconds into milliseconds.
#[must_use]
pub fn seconds_to_millis(seconds: f64) -> i64 {
    if seconds.is_finite() {
        (seconds * 1000.0).round() as i64
    } else {
        0
    }
}

/// Converts MPRIS microseconds into receiver seconds.
#[must_use]
pub fn micros_to_seconds(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}

// ─────────────────────────────────────────────────────────────────────────────
// D-Bus Names
// ─────────────────────────────────────────────────────────────────────────────

/// Checks that `name` can be appended to a well-known bus name as one element.
///
/// D-Bus elements are non-empty, made of `[A-Za-z0-9_-]`, and must not start
/// with a digit.
pub fn validate_bus_name_element(name: &str) -> Result<(), String> {
    let Some(first) = name.chars().next() else {
        return Err("player name must not be empty".to_string());
    };
    if first.is_ascii_digit() {
        return Err(format!("player name `{}` must not start with a digit", name));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
    {
        return Err(format!(
            "player name `{}` contains invalid character `{}`",
            name, bad
        ));
    }
    Ok(())
}
