//! Notification channels and the dispatcher
//!
//! Channels are capabilities behind a common trait: a channel knows how to
//! deliver one alert record and reports the result as a [`ChannelOutcome`],
//! never as an error the pipeline has to handle. The [`Dispatcher`] fans one
//! record out to every configured channel concurrently; a slow or failing
//! channel costs nothing beyond its own timeout and never delays the others.
//!
//! There is no retry here. A failed send is final for that firing; channels
//! that want retries own them internally.

pub mod chat;
pub mod email;
pub mod webhook;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::ChannelsConfig;
use crate::store::AlertRecord;

pub use chat::ChatChannel;
pub use email::EmailChannel;
pub use webhook::WebhookChannel;

/// Result of one delivery attempt on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Sent,
    Failed(String),
    Disabled,
}

impl ChannelOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ChannelOutcome::Sent)
    }
}

impl fmt::Display for ChannelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelOutcome::Sent => write!(f, "sent"),
            ChannelOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            ChannelOutcome::Disabled => write!(f, "disabled"),
        }
    }
}

/// A way to deliver an alert to the outside world.
///
/// `send` must map every internal failure to `ChannelOutcome::Failed`; the
/// dispatcher treats a returned outcome as the complete truth about the
/// attempt. Implementations should hold their HTTP/SMTP clients so repeated
/// sends reuse connections.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable channel name, used as the key in outcome maps.
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send(&self, record: &AlertRecord) -> ChannelOutcome;
}

/// Plain-text rendering of an alert, shared by the human-facing channels.
pub(crate) fn render_text(record: &AlertRecord) -> String {
    format!(
        "ALERT: {}\nSource: {} ({})\nTime: {}\n{}",
        record.kind,
        record.source_id,
        record.host_id,
        record.fired_at.to_rfc3339(),
        record.message
    )
}

/// Concurrent fan-out over all configured channels.
pub struct Dispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>, timeout: Duration) -> Self {
        Self { channels, timeout }
    }

    /// Build the dispatcher from channel configuration. Channels absent from
    /// the config are not constructed at all.
    pub fn from_config(config: &ChannelsConfig, timeout: Duration) -> Self {
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

        if let Some(email) = &config.email {
            channels.push(Arc::new(EmailChannel::new(email.clone())));
        }
        if let Some(chat) = &config.chat {
            channels.push(Arc::new(ChatChannel::new(chat.clone())));
        }
        if let Some(webhook) = &config.webhook {
            channels.push(Arc::new(WebhookChannel::new(webhook.clone())));
        }

        Self::new(channels, timeout)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver one record through every channel concurrently.
    ///
    /// Always returns one outcome per channel: disabled channels report
    /// `Disabled` without being invoked, and a send that outlives the
    /// per-channel timeout is cut off and reported as `Failed`.
    #[instrument(skip(self, record), fields(alert_id = record.id, kind = %record.kind))]
    pub async fn dispatch(&self, record: &AlertRecord) -> HashMap<String, ChannelOutcome> {
        let sends = self.channels.iter().map(|channel| {
            let channel = channel.clone();
            let record = record.clone();
            let timeout = self.timeout;

            async move {
                let name = channel.name().to_string();

                if !channel.is_enabled() {
                    return (name, ChannelOutcome::Disabled);
                }

                match tokio::time::timeout(timeout, channel.send(&record)).await {
                    Ok(outcome) => (name, outcome),
                    Err(_) => (
                        name,
                        ChannelOutcome::Failed(format!(
                            "timed out after {}s",
                            timeout.as_secs()
                        )),
                    ),
                }
            }
        });

        let outcomes: HashMap<String, ChannelOutcome> =
            futures::future::join_all(sends).await.into_iter().collect();

        for (channel, outcome) in &outcomes {
            match outcome {
                ChannelOutcome::Sent => debug!("{channel}: alert delivered"),
                ChannelOutcome::Failed(reason) => warn!("{channel}: delivery failed: {reason}"),
                ChannelOutcome::Disabled => debug!("{channel}: disabled, skipped"),
            }
        }

        outcomes
    }
}
