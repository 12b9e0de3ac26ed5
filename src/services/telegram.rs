// src/services/telegram.rs

//! Telegram Bot API sink.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::TelegramConfig;
use crate::services::dispatcher::{DeliveryTarget, MessageSink};

const PARSE_MODE: &str = "MarkdownV2";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<SentMessage>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Sends MarkdownV2 messages through `sendMessage`.
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: Client,
    endpoint: String,
}

impl TelegramSink {
    /// Fails if no bot token is configured.
    pub fn new(config: &TelegramConfig, client: Client) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(AppError::config("telegram.bot_token is empty"));
        }
        let endpoint = format!(
            "{}/bot{}/sendMessage",
            config.api_url.trim_end_matches('/'),
            config.bot_token.trim()
        );
        Ok(Self { client, endpoint })
    }

    /// Send `text` to `chat_id`, returning Telegram's message id.
    pub async fn send_text(&self, chat_id: &str, text: &str) -> Result<String> {
        let chat_id: i64 = chat_id
            .trim()
            .parse()
            .map_err(|_| AppError::validation(format!("chat id '{chat_id}' is not numeric")))?;

        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let api: ApiResponse = serde_json::from_slice(&body).map_err(|e| {
            AppError::telegram(format!("unreadable response ({status}) for chat {chat_id}: {e}"))
        })?;
        if !api.ok {
            let reason = api.description.unwrap_or_else(|| status.to_string());
            return Err(AppError::telegram(reason));
        }

        api.result
            .map(|message| message.message_id.to_string())
            .ok_or_else(|| AppError::telegram(format!("no message in response for chat {chat_id}")))
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, target: &DeliveryTarget) -> Result<String> {
        self.send_text(&target.recipient, &target.message.body).await
    }
}
