// src/pipeline/deliver.rs

//! Multi-message delivery in rounds.
//!
//! Round *i* sends message *i* to every recipient still active, so each
//! execution unit performs exactly one send and every chat receives its
//! messages in order. A recipient that fails drops out of later rounds.

use std::collections::HashSet;

use crate::services::{DeliveryTarget, DispatchReport, Dispatcher, MessageSink, OutboundMessage};

/// Ordered messages for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub messages: Vec<String>,
}

impl Delivery {
    pub fn new(recipient: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            recipient: recipient.into(),
            messages,
        }
    }
}

/// Deliver every recipient's messages, round by round.
pub async fn deliver_in_rounds(
    dispatcher: &Dispatcher,
    sink: &dyn MessageSink,
    mut deliveries: Vec<Delivery>,
) -> DispatchReport {
    let rounds = deliveries.iter().map(|d| d.messages.len()).max().unwrap_or(0);
    let mut report = DispatchReport::default();

    for round in 0..rounds {
        let targets: Vec<DeliveryTarget> = deliveries
            .iter()
            .filter_map(|d| {
                d.messages
                    .get(round)
                    .map(|text| DeliveryTarget::new(d.recipient.clone(), OutboundMessage::text(text)))
            })
            .collect();
        if targets.is_empty() {
            break;
        }

        log::debug!("Delivery round {}/{}: {} target(s)", round + 1, rounds, targets.len());
        let round_report = dispatcher.dispatch(sink, targets).await;

        let failed: HashSet<String> = round_report
            .failures
            .iter()
            .map(|f| f.recipient.clone())
            .collect();
        deliveries.retain(|d| !failed.contains(&d.recipient));
        report.merge(round_report);
    }

    report
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{AppError, Result};

    /// Fails for `failing` on the given round's message.
    struct ScriptedSink {
        failing: (&'static str, &'static str),
        log: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageSink for ScriptedSink {
        async fn send(&self, target: &DeliveryTarget) -> Result<String> {
            self.log
                .lock()
                .unwrap()
                .push((target.recipient.clone(), target.message.body.clone()));
            if (target.recipient.as_str(), target.message.body.as_str()) == self.failing {
                return Err(AppError::telegram("Too Many Requests"));
            }
            Ok("1".to_string())
        }
    }

    fn messages() -> Vec<String> {
        vec!["day".into(), "first".into(), "gospel".into()]
    }

    #[tokio::test]
    async fn failed_recipient_drops_out_of_later_rounds() {
        let sink = ScriptedSink {
            failing: ("20", "first"),
            log: Mutex::new(Vec::new()),
        };
        let deliveries = vec![
            Delivery::new("10", messages()),
            Delivery::new("20", messages()),
            Delivery::new("30", messages()),
        ];

        let report = deliver_in_rounds(&Dispatcher::new(4), &sink, deliveries).await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].recipient, "20");
        assert_eq!(report.served_recipients(), vec!["10", "30"]);
        assert_eq!(report.delivered.len(), 7);

        let log = sink.log.lock().unwrap();
        let to_20: Vec<&str> = log
            .iter()
            .filter(|(r, _)| r == "20")
            .map(|(_, m)| m.as_str())
            .collect();
        assert_eq!(to_20, vec!["day", "first"]);

        let to_10: Vec<&str> = log
            .iter()
            .filter(|(r, _)| r == "10")
            .map(|(_, m)| m.as_str())
            .collect();
        assert_eq!(to_10, vec!["day", "first", "gospel"]);
    }

    #[tokio::test]
    async fn uneven_message_counts() {
        let sink = ScriptedSink {
            failing: ("", ""),
            log: Mutex::new(Vec::new()),
        };
        let deliveries = vec![
            Delivery::new("1", vec!["a".into()]),
            Delivery::new("2", vec!["a".into(), "b".into(), "c".into()]),
        ];

        let report = deliver_in_rounds(&Dispatcher::new(2), &sink, deliveries).await;
        assert_eq!(report.delivered.len(), 4);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn nothing_to_deliver() {
        let sink = ScriptedSink {
            failing: ("", ""),
            log: Mutex::new(Vec::new()),
        };
        let report = deliver_in_rounds(&Dispatcher::new(2), &sink, Vec::new()).await;
        assert!(report.delivered.is_empty());
        assert!(sink.log.lock().unwrap().is_empty());
    }
}
