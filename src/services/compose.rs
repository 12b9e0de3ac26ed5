// src/services/compose.rs

//! Outbound message composition for the chat channel.
//!
//! Every interpolated field is escaped exactly once; the formatting
//! asterisks added here stay unescaped.

use crate::models::{Artifact, DailyReadings};
use crate::utils::markdown::escape;

/// Standalone bold day header.
pub fn day_message(day: &str) -> String {
    format!("*{}*", escape(day))
}

/// `*<reference>\n<title>*\n\n<content>`
pub fn section_message(artifact: &Artifact) -> String {
    format!(
        "*{}\n{}*\n\n{}",
        escape(&artifact.reference),
        escape(&artifact.title),
        escape(&artifact.content)
    )
}

/// Messages for a whole bundle, in send order.
pub fn readings_messages(readings: &DailyReadings) -> Vec<String> {
    std::iter::once(day_message(&readings.day))
        .chain(readings.sections().into_iter().map(section_message))
        .collect()
}
