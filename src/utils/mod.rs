// src/utils/mod.rs

//! Utility functions and helpers.

pub mod http;
pub mod markdown;

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

/// Day format used on the wire and in cache keys.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Format a day as `YYYY-MM-DD`.
pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` day.
pub fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
        .map_err(|e| AppError::validation(format!("invalid day '{s}': {e}")))
}

/// Current UTC day.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Token cancelled once `timeout` elapses.
///
/// Cancelling the token early stops the timer. Must be called inside a Tokio runtime.
pub fn deadline(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                log::debug!("Deadline of {:?} reached", timeout);
                trigger.cancel();
            }
            _ = trigger.cancelled() => {}
        }
    });
    token
}
