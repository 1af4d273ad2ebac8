//! SMTP email channel

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::store::AlertRecord;

use super::{ChannelOutcome, NotificationChannel, render_text};

pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, lettre::transport::smtp::Error> {
        // Credentials imply a relay that expects STARTTLS; without them we
        // talk plain SMTP to a local relay, matching the default port 25.
        match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => {
                Ok(
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                        .port(self.config.smtp_port)
                        .credentials(Credentials::new(username.clone(), password.clone()))
                        .build(),
                )
            }
            _ => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &self.config.smtp_host,
            )
            .port(self.config.smtp_port)
            .build()),
        }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn send(&self, record: &AlertRecord) -> ChannelOutcome {
        let subject = format!("Vigil alert: {} on {}", record.kind, record.host_id);

        let email = match Message::builder()
            .from(match self.config.from.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => return ChannelOutcome::Failed(format!("invalid from address: {e}")),
            })
            .to(match self.config.to.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => return ChannelOutcome::Failed(format!("invalid to address: {e}")),
            })
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(render_text(record))
        {
            Ok(email) => email,
            Err(e) => return ChannelOutcome::Failed(format!("failed to build email: {e}")),
        };

        let mailer = match self.build_transport() {
            Ok(mailer) => mailer,
            Err(e) => return ChannelOutcome::Failed(format!("failed to build transport: {e}")),
        };

        match mailer.send(email).await {
            Ok(_) => ChannelOutcome::Sent,
            Err(e) => ChannelOutcome::Failed(format!("email send failed: {e}")),
        }
    }
}
