// src/lambda/mod.rs

//! AWS Lambda handler.
//!
//! One function serves both roles:
//! 1. Scheduled event: resolve the day's readings and notify every recipient,
//!    either directly through Telegram or by enqueueing one bundle per chat
//! 2. SQS batch (`Records`): deliver each queued bundle to its chat
//!
//! [`State`] is built once per process, so the Day Cache survives across
//! warm invocations.

use std::collections::BTreeSet;
use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::error::{AppError, Result};
use crate::models::{Config, DeliveryMode};
use crate::pipeline::{self, QueueBatch};
use crate::services::{
    DispatchReport, Dispatcher, MessageSink, ProviderClient, QueueSink, ReadingsService,
    TelegramSink,
};
use crate::storage::StaticRecipients;
use crate::utils::{self, http};

/// Process-wide state shared by every invocation.
pub struct State {
    config: Config,
    readings: ReadingsService<ProviderClient>,
    dispatcher: Dispatcher,
    recipients: StaticRecipients,
    telegram: Option<TelegramSink>,
    queue: Option<QueueSink>,
}

impl State {
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let client = http::create_async_client(&config.provider)?;
        let source = ProviderClient::with_client(client.clone(), config.provider.url.clone());
        let readings = ReadingsService::from_config(source, &config)?;

        let telegram = if config.telegram.bot_token.trim().is_empty() {
            None
        } else {
            Some(TelegramSink::new(&config.telegram, client)?)
        };
        let queue = match config.delivery.mode {
            DeliveryMode::Queue => Some(QueueSink::from_config(&config.queue).await?),
            DeliveryMode::Telegram => None,
        };

        Ok(Self {
            dispatcher: Dispatcher::from_config(&config.delivery),
            recipients: StaticRecipients::new(config.subscribers.chat_ids.clone()),
            config,
            readings,
            telegram,
            queue,
        })
    }

    fn telegram(&self) -> Result<&TelegramSink> {
        self.telegram
            .as_ref()
            .ok_or_else(|| AppError::config("LECTIO_TELEGRAM_BOT_TOKEN is not set"))
    }

    fn notify_sink(&self) -> Result<&dyn MessageSink> {
        match self.config.delivery.mode {
            DeliveryMode::Telegram => Ok(self.telegram()? as &dyn MessageSink),
            DeliveryMode::Queue => self
                .queue
                .as_ref()
                .map(|queue| queue as &dyn MessageSink)
                .ok_or_else(|| AppError::config("queue sink is not initialized")),
        }
    }
}

/// Scheduled invocation payload.
#[derive(Debug, Default, Deserialize)]
pub struct NotifyRequest {
    /// Day to notify (`YYYY-MM-DD`), today when absent
    #[serde(default)]
    pub day: Option<String>,
}

/// A recipient that did not receive its messages.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRecipient {
    pub recipient: String,
    pub reason: String,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct NotifyResponse {
    /// Whether every recipient was served
    pub success: bool,

    /// Day label of the delivered readings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,

    /// Number of recipients targeted
    pub recipients: usize,

    /// Number of recipients that received everything
    pub delivered: usize,

    pub failed: Vec<FailedRecipient>,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl NotifyResponse {
    fn from_report(report: &DispatchReport) -> Self {
        let recipients: BTreeSet<&str> = report
            .delivered
            .iter()
            .map(|d| d.recipient.as_str())
            .chain(report.failures.iter().map(|f| f.recipient.as_str()))
            .collect();

        Self {
            success: report.failures.is_empty(),
            recipients: recipients.len(),
            delivered: report.served_recipients().len(),
            failed: report
                .failures
                .iter()
                .map(|f| FailedRecipient {
                    recipient: f.recipient.clone(),
                    reason: f.source.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }
}

/// Main Lambda handler function.
#[instrument(skip(state, event))]
pub async fn handler(
    state: Arc<State>,
    event: LambdaEvent<Value>,
) -> std::result::Result<NotifyResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (payload, _context) = event.into_parts();

    let result = if payload.get("Records").is_some() {
        run_consumer(&state, payload).await
    } else {
        run_notify(&state, payload).await
    };

    let elapsed = start.elapsed().as_millis() as u64;
    match result {
        Ok(mut response) => {
            response.execution_time_ms = elapsed;
            info!(
                "Delivered to {}/{} recipient(s) in {}ms",
                response.delivered, response.recipients, response.execution_time_ms
            );
            for failure in &response.failed {
                error!("Delivery to {} failed: {}", failure.recipient, failure.reason);
            }
            Ok(response)
        }
        Err(e) => {
            error!("Invocation failed: {}", e);
            Ok(NotifyResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms: elapsed,
                ..Default::default()
            })
        }
    }
}

async fn run_notify(state: &State, payload: Value) -> Result<NotifyResponse> {
    let request: NotifyRequest = serde_json::from_value(payload).unwrap_or_default();
    let day = match request.day.as_deref() {
        Some(day) => utils::parse_day(day)?,
        None => utils::today(),
    };
    info!("Scheduled notify for {}", day);

    let cancel = utils::deadline(state.config.provider.deadline());
    let outcome = pipeline::notify(
        &state.readings,
        &state.recipients,
        state.notify_sink()?,
        &state.dispatcher,
        state.config.delivery.mode,
        day,
        &cancel,
    )
    .await;
    cancel.cancel();
    let outcome = outcome?;

    let mut response = NotifyResponse::from_report(&outcome.report);
    response.recipients = outcome.recipients;
    response.day = Some(outcome.day);
    Ok(response)
}

async fn run_consumer(state: &State, payload: Value) -> Result<NotifyResponse> {
    let batch: QueueBatch = serde_json::from_value(payload)?;
    info!("Consuming {} queued bundle(s)", batch.records.len());

    let report = pipeline::consume(batch, &state.dispatcher, state.telegram()?).await;
    Ok(NotifyResponse::from_report(&report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::services::Delivered;

    #[test]
    fn notify_request_defaults() {
        let req: NotifyRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(req.day.is_none());
    }

    #[test]
    fn notify_request_ignores_scheduler_fields() {
        let req: NotifyRequest = serde_json::from_str(
            r#"{"source":"aws.events","detail-type":"Scheduled Event","day":"2022-03-16"}"#,
        )
        .unwrap();
        assert_eq!(req.day.as_deref(), Some("2022-03-16"));
    }

    #[test]
    fn response_counts_recipients_not_messages() {
        let report = DispatchReport {
            delivered: vec![
                Delivered {
                    recipient: "10".into(),
                    message_id: "1".into(),
                },
                Delivered {
                    recipient: "10".into(),
                    message_id: "2".into(),
                },
                Delivered {
                    recipient: "20".into(),
                    message_id: "3".into(),
                },
            ],
            failures: vec![DeliveryError::new("20", AppError::telegram("blocked"))],
        };

        let response = NotifyResponse::from_report(&report);
        assert!(!response.success);
        assert_eq!(response.recipients, 2);
        assert_eq!(response.delivered, 1);
        assert_eq!(response.failed[0].recipient, "20");
        assert_eq!(response.failed[0].reason, "Telegram error: blocked");

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("error").is_none());
    }
}
