//! Chat-bot channel
//!
//! Delivers alerts through a bot HTTP API. The endpoint URL carries the bot
//! credentials; the request body follows the common `chat_id`/`text` shape so
//! the same channel works against Telegram-compatible APIs.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::ChatConfig;
use crate::store::AlertRecord;

use super::{ChannelOutcome, NotificationChannel, render_text};

pub struct ChatChannel {
    client: Client,
    config: ChatConfig,
}

impl ChatChannel {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl NotificationChannel for ChatChannel {
    fn name(&self) -> &str {
        "chat"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn send(&self, record: &AlertRecord) -> ChannelOutcome {
        let payload = json!({
            "chat_id": self.config.chat_id,
            "text": render_text(record),
        });

        match self
            .client
            .post(&self.config.api_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    ChannelOutcome::Sent
                } else {
                    let body = response.text().await.unwrap_or_default();
                    ChannelOutcome::Failed(format!("bot API responded {status}: {body}"))
                }
            }
            Err(e) => ChannelOutcome::Failed(format!("bot API request failed: {e}")),
        }
    }
}
