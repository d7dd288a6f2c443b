use crate::app::ports::MessageSender;
use crate::error::{Result, ShopError};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Telegram Bot API client for `sendMessage`
pub struct TelegramClient {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, bot_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        debug!(chat_id, chars = text.len(), "Sending Telegram message");
        let response = self
            .client
            .post(self.send_message_url())
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ShopError::Notification(format!(
                "Telegram responded {status}: {body}"
            )));
        }
        Ok(())
    }
}

/// Writes messages to the log when no bot is configured
pub struct LoggingMessageSender;

#[async_trait]
impl MessageSender for LoggingMessageSender {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        info!(chat_id, text, "Telegram not configured, message logged only");
        Ok(())
    }
}
