// src/pipeline/notify.rs

//! Scheduled notify job: resolve the day's readings and fan them out.

use std::collections::HashSet;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{DailyReadings, DeliveryMode};
use crate::pipeline::deliver::{Delivery, deliver_in_rounds};
use crate::services::compose::readings_messages;
use crate::services::{
    CHAT_ID_ATTRIBUTE, ContentSource, DeliveryTarget, DispatchReport, Dispatcher, MessageSink,
    OutboundMessage, ReadingsService,
};
use crate::storage::Recipients;

/// What a notify run did.
#[derive(Debug)]
pub struct NotifyOutcome {
    pub day: String,
    pub recipients: usize,
    pub report: DispatchReport,
}

/// One queued bundle per distinct recipient, with descriptive attributes.
///
/// Descriptive attributes with an empty value are left out.
pub fn queue_targets(readings: &DailyReadings, chat_ids: &[String]) -> Result<Vec<DeliveryTarget>> {
    let body = serde_json::to_string(readings)?;
    let descriptive = [
        ("gospelDay", &readings.day),
        ("gospelTitle", &readings.gospel.title),
        ("gospelReference", &readings.gospel.reference),
    ];

    Ok(distinct(chat_ids)
        .into_iter()
        .map(|chat_id| {
            let message = descriptive
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .fold(
                    OutboundMessage::text(body.clone())
                        .with_attribute(CHAT_ID_ATTRIBUTE, chat_id.clone()),
                    |message, (name, value)| message.with_attribute(*name, value.as_str()),
                );
            DeliveryTarget::new(chat_id.clone(), message)
        })
        .collect())
}

/// The composed chat messages for every distinct recipient.
pub fn chat_deliveries(readings: &DailyReadings, chat_ids: &[String]) -> Vec<Delivery> {
    let messages = readings_messages(readings);
    distinct(chat_ids)
        .into_iter()
        .map(|chat_id| Delivery::new(chat_id.clone(), messages.clone()))
        .collect()
}

/// Recipients in first-seen order, without repeats.
fn distinct(chat_ids: &[String]) -> Vec<&String> {
    let mut seen = HashSet::new();
    chat_ids
        .iter()
        .filter(|chat_id| seen.insert(chat_id.as_str()))
        .collect()
}

/// Resolve readings for `day` and deliver them to every recipient.
///
/// Fetch and parse failures abort the run; delivery failures are reported
/// per recipient in the outcome.
pub async fn notify<S: ContentSource>(
    readings: &ReadingsService<S>,
    recipients: &dyn Recipients,
    sink: &dyn MessageSink,
    dispatcher: &Dispatcher,
    mode: DeliveryMode,
    day: NaiveDate,
    cancel: &CancellationToken,
) -> Result<NotifyOutcome> {
    let bundle = readings.readings(day, cancel).await?;
    let listed = recipients.chat_ids().await?;
    let chat_ids: Vec<String> = distinct(&listed).into_iter().cloned().collect();
    if chat_ids.len() < listed.len() {
        log::warn!(
            "Ignoring {} duplicate recipient(s)",
            listed.len() - chat_ids.len()
        );
    }
    log::info!(
        "Notifying {} recipient(s) of '{}' via {}",
        chat_ids.len(),
        bundle.day,
        mode
    );

    let report = match mode {
        DeliveryMode::Queue => {
            dispatcher
                .dispatch(sink, queue_targets(&bundle, &chat_ids)?)
                .await
        }
        DeliveryMode::Telegram => {
            deliver_in_rounds(dispatcher, sink, chat_deliveries(&bundle, &chat_ids)).await
        }
    };

    Ok(NotifyOutcome {
        day: bundle.day,
        recipients: chat_ids.len(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::AppError;
    use crate::models::{Artifact, Config, RawRecord};
    use crate::services::source::decode_response;
    use crate::storage::StaticRecipients;
    use crate::utils::{format_day, parse_day};

    const MARCH_20: &str = include_str!("../../tests/fixtures/2022-03-20.json");

    struct FixtureSource;

    #[async_trait]
    impl ContentSource for FixtureSource {
        async fn fetch(&self, day: NaiveDate, _cancel: &CancellationToken) -> Result<RawRecord> {
            decode_response(MARCH_20.as_bytes(), &format_day(day))
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        sent: Mutex<Vec<DeliveryTarget>>,
    }

    #[async_trait]
    impl MessageSink for CollectingSink {
        async fn send(&self, target: &DeliveryTarget) -> Result<String> {
            if target.recipient == "bad" {
                return Err(AppError::telegram("Forbidden: bot was blocked by the user"));
            }
            self.sent.lock().unwrap().push(target.clone());
            Ok("1".to_string())
        }
    }

    fn recipients() -> StaticRecipients {
        StaticRecipients::new(vec!["10".into(), "bad".into(), "30".into()])
    }

    #[tokio::test]
    async fn telegram_mode_sends_every_section_in_order() {
        let service = ReadingsService::from_config(FixtureSource, &Config::default()).unwrap();
        let sink = CollectingSink::default();

        let outcome = notify(
            &service,
            &recipients(),
            &sink,
            &Dispatcher::new(4),
            DeliveryMode::Telegram,
            parse_day("2022-03-20").unwrap(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.recipients, 3);
        assert_eq!(outcome.report.served_recipients(), vec!["10", "30"]);
        assert_eq!(outcome.report.failures[0].recipient, "bad");

        let sent = sink.sent.lock().unwrap();
        let to_10: Vec<&str> = sent
            .iter()
            .filter(|t| t.recipient == "10")
            .map(|t| t.message.body.as_str())
            .collect();
        // day, first lecture, psalm, second lecture, gospel
        assert_eq!(to_10.len(), 5);
        assert_eq!(to_10[0], r"*20/03/2022 \- Domingo de la 3ª semana de Cuaresma\.*");
        assert!(to_10[3].contains("Corintios 10, 1\\-6\\. 10\\-12"));
        assert!(to_10[4].contains("Evangelio"));
    }

    #[tokio::test]
    async fn queue_mode_enqueues_one_bundle_per_recipient() {
        let service = ReadingsService::from_config(FixtureSource, &Config::default()).unwrap();
        let sink = CollectingSink::default();

        let outcome = notify(
            &service,
            &StaticRecipients::new(vec!["10".into(), "30".into()]),
            &sink,
            &Dispatcher::new(4),
            DeliveryMode::Queue,
            parse_day("2022-03-20").unwrap(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.report.failures.is_empty());
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        for target in sent.iter() {
            assert_eq!(
                target.message.attributes.get(CHAT_ID_ATTRIBUTE),
                Some(&target.recipient)
            );
            let bundle: DailyReadings = serde_json::from_str(&target.message.body).unwrap();
            assert!(bundle.second_lecture.is_some());
        }
    }

    fn bundle_with_gospel(gospel: Artifact) -> DailyReadings {
        let section = |title: &str| Artifact {
            day: "16/03/2022".into(),
            title: title.into(),
            reference: "ref".into(),
            content: "body".into(),
        };
        DailyReadings::assemble(
            section("first"),
            section("psalm"),
            Artifact::day_only("16/03/2022"),
            gospel,
        )
    }

    #[test]
    fn queue_targets_carry_descriptive_attributes() {
        let readings = bundle_with_gospel(Artifact {
            day: "16/03/2022".into(),
            title: "Lo condenarán a muerte.".into(),
            reference: "Mateo 20, 17-28".into(),
            content: "body".into(),
        });

        let targets = queue_targets(&readings, &["10".to_string()]).unwrap();
        let attributes = &targets[0].message.attributes;
        assert_eq!(attributes[CHAT_ID_ATTRIBUTE], "10");
        assert_eq!(attributes["gospelDay"], "16/03/2022");
        assert_eq!(attributes["gospelTitle"], "Lo condenarán a muerte.");
        assert_eq!(attributes["gospelReference"], "Mateo 20, 17-28");
    }

    #[test]
    fn day_only_gospel_leaves_out_empty_attributes() {
        let readings = bundle_with_gospel(Artifact::day_only("16/03/2022"));

        let targets = queue_targets(&readings, &["10".to_string()]).unwrap();
        let names: Vec<&str> = targets[0]
            .message
            .attributes
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, vec![CHAT_ID_ATTRIBUTE, "gospelDay"]);
        assert!(targets[0].message.attributes.values().all(|v| !v.is_empty()));
    }

    #[tokio::test]
    async fn duplicate_recipients_are_served_once() {
        let service = ReadingsService::from_config(FixtureSource, &Config::default()).unwrap();
        let sink = CollectingSink::default();

        let outcome = notify(
            &service,
            &StaticRecipients::new(vec!["10".into(), "bad".into(), "10".into(), "bad".into()]),
            &sink,
            &Dispatcher::new(4),
            DeliveryMode::Telegram,
            parse_day("2022-03-20").unwrap(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.recipients, 2);
        assert_eq!(outcome.report.failures.len(), 1);
        assert_eq!(outcome.report.served_recipients(), vec!["10"]);
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.iter().filter(|t| t.recipient == "10").count(), 5);
    }
}
