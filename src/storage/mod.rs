// src/storage/mod.rs

//! Storage: the Day Cache and recipient persistence.
//!
//! Recipients are read through [`Recipients`]. Stores that can also change
//! the list implement [`SubscriberStore`].

pub mod cache;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// Re-export for convenience
pub use cache::{CachedValue, DayCache};
pub use local::LocalSubscriberStore;

/// A chat subscribed to the daily readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub chat_id: String,

    /// What the chat subscribed to
    #[serde(default = "default_kind")]
    pub kind: String,

    pub subscribed_at: DateTime<Utc>,
}

fn default_kind() -> String {
    "daily".to_string()
}

impl Subscriber {
    pub fn new(chat_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            kind: kind.into(),
            subscribed_at: Utc::now(),
        }
    }
}

/// Source of recipient identifiers for a fan-out.
#[async_trait]
pub trait Recipients: Send + Sync {
    async fn chat_ids(&self) -> Result<Vec<String>>;
}

/// Recipient persistence that supports subscribing and unsubscribing.
#[async_trait]
pub trait SubscriberStore: Recipients {
    /// Add a subscriber. Returns `false` if the chat was already subscribed.
    async fn subscribe(&self, subscriber: Subscriber) -> Result<bool>;

    /// Remove a subscriber. Returns `false` if the chat was not subscribed.
    async fn unsubscribe(&self, chat_id: &str) -> Result<bool>;

    async fn list(&self) -> Result<Vec<Subscriber>>;
}

/// Fixed recipient list, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRecipients {
    chat_ids: Vec<String>,
}

impl StaticRecipients {
    pub fn new(chat_ids: Vec<String>) -> Self {
        Self { chat_ids }
    }
}

#[async_trait]
impl Recipients for StaticRecipients {
    async fn chat_ids(&self) -> Result<Vec<String>> {
        Ok(self.chat_ids.clone())
    }
}
