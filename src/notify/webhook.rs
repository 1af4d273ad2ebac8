//! Generic webhook channel
//!
//! POSTs a JSON payload describing the alert to a configured URL. The payload
//! layout is intentionally flat so receivers can consume it without knowing
//! this crate's types.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::WebhookConfig;
use crate::store::AlertRecord;

use super::{ChannelOutcome, NotificationChannel};

pub struct WebhookChannel {
    client: Client,
    config: WebhookConfig,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn send(&self, record: &AlertRecord) -> ChannelOutcome {
        let payload = json!({
            "alert_id": record.id,
            "kind": record.kind.as_str(),
            "source": record.source_id,
            "host": record.host_id,
            "message": record.message,
            "fired_at": record.fired_at.to_rfc3339(),
        });

        match self.client.post(&self.config.url).json(&payload).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    ChannelOutcome::Sent
                } else {
                    ChannelOutcome::Failed(format!(
                        "webhook responded with status {}",
                        response.status()
                    ))
                }
            }
            Err(e) => ChannelOutcome::Failed(format!("webhook request failed: {e}")),
        }
    }
}
