// src/error.rs

//! Unified error handling for the readings service.

use std::fmt;

use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Provider request failed, returned a non-2xx status or an empty result
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Request aborted by the invocation deadline
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Provider payload could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Section descriptor is malformed
    #[error("Extraction error for {section}: {message}")]
    Extraction { section: String, message: String },

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// One or more recipients did not receive their messages
    #[error(transparent)]
    Delivery(#[from] AggregateDeliveryError),

    /// Telegram Bot API rejected a request
    #[error("Telegram error: {0}")]
    Telegram(String),

    /// Message queue operation failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a fetch error.
    pub fn fetch(message: impl fmt::Display) -> Self {
        Self::Fetch(message.to_string())
    }

    /// Create a cancellation error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    /// Create a parse error.
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse(message.to_string())
    }

    /// Create an extraction error for a section.
    pub fn extraction(section: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            section: section.into(),
            message: message.to_string(),
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a Telegram API error.
    pub fn telegram(message: impl fmt::Display) -> Self {
        Self::Telegram(message.to_string())
    }

    /// Create a queue error.
    pub fn queue(message: impl fmt::Display) -> Self {
        Self::Queue(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error came from the invocation deadline.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// A send that failed for a single recipient.
#[derive(Error, Debug)]
#[error("{recipient}: {source}")]
pub struct DeliveryError {
    pub recipient: String,
    pub source: AppError,
}

impl DeliveryError {
    pub fn new(recipient: impl Into<String>, source: AppError) -> Self {
        Self {
            recipient: recipient.into(),
            source,
        }
    }
}

/// Every failed recipient of a fan-out, plus how many sends went through.
#[derive(Debug)]
pub struct AggregateDeliveryError {
    pub failures: Vec<DeliveryError>,
    pub delivered: usize,
}

impl AggregateDeliveryError {
    /// Failing recipient identifiers, sorted.
    pub fn recipients(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.failures.iter().map(|f| f.recipient.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Display for AggregateDeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivery failed for {} recipient(s) ({} delivered)",
            self.failures.len(),
            self.delivered
        )?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateDeliveryError {}
