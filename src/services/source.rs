// src/services/source.rs

//! Source Client for the readings provider.
//!
//! One `POST` per call with form body `dia=YYYY-MM-DD`. The provider answers
//! with a JSON array whose first element holds the whole day.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{ProviderConfig, RawRecord};
use crate::utils::{format_day, http};

/// Capability to fetch the raw record for a day.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the record for `day`. Aborts with [`AppError::Cancelled`] once `cancel` fires.
    async fn fetch(&self, day: NaiveDate, cancel: &CancellationToken) -> Result<RawRecord>;
}

/// HTTP client for the provider endpoint.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: Client,
    url: String,
}

impl ProviderClient {
    /// Create a client with its own connection pool.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self::with_client(
            http::create_async_client(config)?,
            config.url.clone(),
        ))
    }

    /// Create a client reusing an existing connection pool.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn request(&self, day: &str) -> Result<RawRecord> {
        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .form(&[("dia", day)])
            .send()
            .await
            .map_err(|e| AppError::fetch(format!("request for {day} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(format!(
                "provider returned {status} for {day}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::fetch(format!("reading response for {day} failed: {e}")))?;

        decode_response(&body, day)
    }
}

#[async_trait]
impl ContentSource for ProviderClient {
    async fn fetch(&self, day: NaiveDate, cancel: &CancellationToken) -> Result<RawRecord> {
        let day = format_day(day);
        log::debug!("Fetching readings for {} from {}", day, self.url);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::warn!("Fetch for {} cancelled", day);
                Err(AppError::cancelled(format!("fetch for {day} aborted")))
            }
            result = self.request(&day) => result,
        }
    }
}

/// Decode the provider's JSON array, keeping only its first element.
pub fn decode_response(body: &[u8], day: &str) -> Result<RawRecord> {
    let records: Vec<RawRecord> = serde_json::from_slice(body)
        .map_err(|e| AppError::parse(format!("malformed provider response for {day}: {e}")))?;

    records
        .into_iter()
        .next()
        .ok_or_else(|| AppError::fetch(format!("provider returned no entries for {day}")))
}
