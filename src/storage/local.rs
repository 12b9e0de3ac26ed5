// src/storage/local.rs

//! Local filesystem subscriber store.
//!
//! Subscribers live in a single JSON array. Every change rewrites the file
//! atomically (write to temp, then rename).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::{Recipients, Subscriber, SubscriberStore};

/// JSON-file-backed subscriber store.
#[derive(Debug)]
pub struct LocalSubscriberStore {
    path: PathBuf,
    // Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl LocalSubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read subscribers, returning an empty list if the file doesn't exist.
    async fn read(&self) -> Result<Vec<Subscriber>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn write(&self, subscribers: &[Subscriber]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(subscribers)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Recipients for LocalSubscriberStore {
    async fn chat_ids(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.into_iter().map(|s| s.chat_id).collect())
    }
}

#[async_trait]
impl SubscriberStore for LocalSubscriberStore {
    async fn subscribe(&self, subscriber: Subscriber) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut subscribers = self.read().await?;
        if subscribers.iter().any(|s| s.chat_id == subscriber.chat_id) {
            log::debug!("Chat {} already subscribed", subscriber.chat_id);
            return Ok(false);
        }

        log::info!("Subscribing chat {}", subscriber.chat_id);
        subscribers.push(subscriber);
        self.write(&subscribers).await?;
        Ok(true)
    }

    async fn unsubscribe(&self, chat_id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut subscribers = self.read().await?;
        let before = subscribers.len();
        subscribers.retain(|s| s.chat_id != chat_id);
        if subscribers.len() == before {
            return Ok(false);
        }

        log::info!("Unsubscribing chat {}", chat_id);
        self.write(&subscribers).await?;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<Subscriber>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }
}
