// src/pipeline/consume.rs

//! Queue consumer: decode queued bundles and deliver them to their chats.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{AppError, DeliveryError, Result};
use crate::models::DailyReadings;
use crate::pipeline::deliver::{Delivery, deliver_in_rounds};
use crate::services::compose::readings_messages;
use crate::services::{CHAT_ID_ATTRIBUTE, DispatchReport, Dispatcher, MessageSink};

/// SQS event batch as delivered to a Lambda consumer.
#[derive(Debug, Deserialize)]
pub struct QueueBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueRecord>,
}

#[derive(Debug, Deserialize)]
pub struct QueueRecord {
    #[serde(rename = "messageId", default)]
    pub message_id: String,

    #[serde(default)]
    pub body: String,

    #[serde(rename = "messageAttributes", default)]
    pub message_attributes: HashMap<String, QueueAttribute>,
}

#[derive(Debug, Deserialize)]
pub struct QueueAttribute {
    #[serde(rename = "stringValue", default)]
    pub string_value: Option<String>,

    #[serde(rename = "dataType", default)]
    pub data_type: String,
}

impl QueueRecord {
    /// Recipient chat id carried in the `chatID` attribute.
    pub fn chat_id(&self) -> Result<&str> {
        self.message_attributes
            .get(CHAT_ID_ATTRIBUTE)
            .and_then(|attr| attr.string_value.as_deref())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::validation(format!("record {} has no chat id", self.message_id))
            })
    }

    pub fn readings(&self) -> Result<DailyReadings> {
        serde_json::from_str(&self.body).map_err(|e| {
            AppError::parse(format!("record {} body is not a bundle: {e}", self.message_id))
        })
    }
}

/// Deliver every decodable record. Undecodable records fail only themselves.
pub async fn consume(
    batch: QueueBatch,
    dispatcher: &Dispatcher,
    sink: &dyn MessageSink,
) -> DispatchReport {
    let mut rejected = Vec::new();
    let mut deliveries = Vec::new();

    for record in &batch.records {
        let decoded = record
            .chat_id()
            .and_then(|chat_id| Ok((chat_id.to_string(), record.readings()?)));
        match decoded {
            Ok((chat_id, readings)) => {
                deliveries.push(Delivery::new(chat_id, readings_messages(&readings)));
            }
            Err(error) => {
                log::warn!("Skipping record {}: {}", record.message_id, error);
                let recipient = record
                    .chat_id()
                    .map(str::to_string)
                    .unwrap_or_else(|_| record.message_id.clone());
                rejected.push(DeliveryError::new(recipient, error));
            }
        }
    }

    log::info!(
        "Consuming {} record(s): {} deliverable, {} rejected",
        batch.records.len(),
        deliveries.len(),
        rejected.len()
    );

    let mut report = deliver_in_rounds(dispatcher, sink, deliveries).await;
    report.failures.extend(rejected);
    report
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::Artifact;
    use crate::services::DeliveryTarget;

    #[derive(Default)]
    struct CollectingSink {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageSink for CollectingSink {
        async fn send(&self, target: &DeliveryTarget) -> Result<String> {
            self.sent
                .lock()
                .unwrap()
                .push((target.recipient.clone(), target.message.body.clone()));
            Ok("9".to_string())
        }
    }

    fn bundle() -> DailyReadings {
        let artifact = |title: &str| Artifact {
            day: "16/03/2022".into(),
            title: title.into(),
            reference: "ref".into(),
            content: "body".into(),
        };
        DailyReadings::assemble(
            artifact("first"),
            artifact("psalm"),
            Artifact::day_only("16/03/2022"),
            artifact("gospel"),
        )
    }

    fn event(records: serde_json::Value) -> QueueBatch {
        serde_json::from_value(serde_json::json!({ "Records": records })).unwrap()
    }

    #[tokio::test]
    async fn delivers_each_record_to_its_chat() {
        let body = serde_json::to_string(&bundle()).unwrap();
        let batch = event(serde_json::json!([
            {
                "messageId": "m1",
                "body": body,
                "messageAttributes": {
                    "chatID": { "stringValue": "10", "dataType": "Number" },
                    "day": { "stringValue": "16/03/2022", "dataType": "String" }
                }
            }
        ]));

        let sink = CollectingSink::default();
        let report = consume(batch, &Dispatcher::new(2), &sink).await;

        assert!(report.failures.is_empty());
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|(chat, _)| chat == "10"));
        assert_eq!(sent[0].1, r"*16/03/2022*");
        assert_eq!(sent[3].1, "*ref\ngospel*\n\nbody");
    }

    #[tokio::test]
    async fn bad_records_fail_alone() {
        let body = serde_json::to_string(&bundle()).unwrap();
        let batch = event(serde_json::json!([
            { "messageId": "m1", "body": "{}", "messageAttributes": {
                "chatID": { "stringValue": "10", "dataType": "Number" } } },
            { "messageId": "m2", "body": body, "messageAttributes": {} },
            { "messageId": "m3", "body": body, "messageAttributes": {
                "chatID": { "stringValue": "30", "dataType": "Number" } } }
        ]));

        let sink = CollectingSink::default();
        let report = consume(batch, &Dispatcher::new(2), &sink).await;

        let mut failed: Vec<&str> = report.failures.iter().map(|f| f.recipient.as_str()).collect();
        failed.sort_unstable();
        assert_eq!(failed, vec!["10", "m2"]);
        assert_eq!(report.served_recipients(), vec!["30"]);
    }
}
