// src/services/dispatcher.rs

//! Delivery Dispatcher.
//!
//! One independent send per target, at most `max_concurrent` in flight.
//! Outcomes are collected in completion order; a failed send never stops
//! the others and successful sends are never rolled back.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::{AggregateDeliveryError, DeliveryError, Result};
use crate::models::DeliveryConfig;

/// Attribute carrying the numeric chat id alongside a queued message.
pub const CHAT_ID_ATTRIBUTE: &str = "chatID";

/// Message body plus transport attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
    pub attributes: BTreeMap<String, String>,
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// A recipient and what to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub recipient: String,
    pub message: OutboundMessage,
}

impl DeliveryTarget {
    pub fn new(recipient: impl Into<String>, message: OutboundMessage) -> Self {
        Self {
            recipient: recipient.into(),
            message,
        }
    }
}

/// Capability to send one message to one target.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send and return the provider-assigned message id.
    async fn send(&self, target: &DeliveryTarget) -> Result<String>;
}

/// A successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub recipient: String,
    pub message_id: String,
}

/// Result of one send.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Sent(Delivered),
    Failed(DeliveryError),
}

/// Verdict for a whole fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Succeeded,
    PartiallyFailed,
    Failed,
}

/// Collected outcomes of one or more fan-outs.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: Vec<Delivered>,
    pub failures: Vec<DeliveryError>,
}

impl DispatchReport {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Sent(delivered) => self.delivered.push(delivered),
            DeliveryOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: DispatchReport) {
        self.delivered.extend(other.delivered);
        self.failures.extend(other.failures);
    }

    pub fn status(&self) -> DispatchStatus {
        match (self.delivered.is_empty(), self.failures.is_empty()) {
            (_, true) => DispatchStatus::Succeeded,
            (false, false) => DispatchStatus::PartiallyFailed,
            (true, false) => DispatchStatus::Failed,
        }
    }

    /// Recipients that had at least one send and no failure.
    pub fn served_recipients(&self) -> Vec<&str> {
        let failed: HashSet<&str> = self.failures.iter().map(|f| f.recipient.as_str()).collect();
        let mut served: Vec<&str> = self
            .delivered
            .iter()
            .map(|d| d.recipient.as_str())
            .filter(|r| !failed.contains(r))
            .collect();
        served.sort_unstable();
        served.dedup();
        served
    }

    /// Success iff nothing failed.
    pub fn into_result(self) -> std::result::Result<Vec<Delivered>, AggregateDeliveryError> {
        if self.failures.is_empty() {
            Ok(self.delivered)
        } else {
            Err(AggregateDeliveryError {
                delivered: self.delivered.len(),
                failures: self.failures,
            })
        }
    }
}

/// Bounded concurrent fan-out.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    max_concurrent: usize,
}

impl Dispatcher {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(config.max_concurrent)
    }

    /// Send every target and collect all outcomes.
    pub async fn dispatch(
        &self,
        sink: &dyn MessageSink,
        targets: Vec<DeliveryTarget>,
    ) -> DispatchReport {
        let total = targets.len();
        let mut outcomes = stream::iter(targets)
            .map(|target| async move {
                match sink.send(&target).await {
                    Ok(message_id) => {
                        log::debug!("Sent message {} to {}", message_id, target.recipient);
                        DeliveryOutcome::Sent(Delivered {
                            recipient: target.recipient,
                            message_id,
                        })
                    }
                    Err(error) => {
                        log::warn!("Delivery to {} failed: {}", target.recipient, error);
                        DeliveryOutcome::Failed(DeliveryError::new(target.recipient, error))
                    }
                }
            })
            .buffer_unordered(self.max_concurrent);

        let mut report = DispatchReport::default();
        while let Some(outcome) = outcomes.next().await {
            report.record(outcome);
        }

        log::info!(
            "Dispatched {} message(s): {} sent, {} failed",
            total,
            report.delivered.len(),
            report.failures.len()
        );
        report
    }

    /// Send every target; fail with every failing recipient if any send failed.
    pub async fn send_all(
        &self,
        sink: &dyn MessageSink,
        targets: Vec<DeliveryTarget>,
    ) -> std::result::Result<Vec<Delivered>, AggregateDeliveryError> {
        self.dispatch(sink, targets).await.into_result()
    }
}
