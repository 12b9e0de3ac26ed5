// src/services/queue.rs

//! SQS sink used as the hop between the scheduled producer and the
//! delivering consumer.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::MessageAttributeValue;

use crate::error::{AppError, Result};
use crate::models::QueueConfig;
use crate::services::dispatcher::{CHAT_ID_ATTRIBUTE, DeliveryTarget, MessageSink};

/// Enqueues one message per target.
pub struct QueueSink {
    client: Client,
    queue_url: String,
}

impl QueueSink {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build a client for the configured region and resolve the queue URL by name.
    pub async fn from_config(config: &QueueConfig) -> Result<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);

        let output = client
            .get_queue_url()
            .queue_name(&config.queue_name)
            .send()
            .await
            .map_err(|e| {
                AppError::queue(format!(
                    "resolving queue '{}': {}",
                    config.queue_name,
                    DisplayErrorContext(&e)
                ))
            })?;
        let queue_url = output
            .queue_url()
            .ok_or_else(|| AppError::queue(format!("queue '{}' has no URL", config.queue_name)))?;

        log::info!("Using queue {}", queue_url);
        Ok(Self::new(client, queue_url))
    }
}

#[async_trait]
impl MessageSink for QueueSink {
    async fn send(&self, target: &DeliveryTarget) -> Result<String> {
        let mut request = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(&target.message.body);

        for (name, value) in &target.message.attributes {
            let data_type = if name == CHAT_ID_ATTRIBUTE {
                "Number"
            } else {
                "String"
            };
            let attribute = MessageAttributeValue::builder()
                .data_type(data_type)
                .string_value(value)
                .build()
                .map_err(AppError::queue)?;
            request = request.message_attributes(name, attribute);
        }

        let output = request
            .send()
            .await
            .map_err(|e| AppError::queue(DisplayErrorContext(&e)))?;
        Ok(output.message_id().unwrap_or_default().to_string())
    }
}
