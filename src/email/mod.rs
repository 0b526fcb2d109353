use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::EmailConfig;

pub mod composer;

const SEND_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid sender address: {0}")]
    InvalidAddress(String),
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Outbound mail capability. The result reflects "at least one recipient
/// accepted"; per-recipient failures are logged here and go no further.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, html: &str, text: &str) -> bool;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(config.from.clone()))?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(SEND_TIMEOUT_SECS)))
            .build();

        info!(
            host = %config.host,
            port = config.port,
            from = %config.from,
            use_tls = config.use_tls,
            "email transport initialized"
        );

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, recipients: &[String], subject: &str, html: &str, text: &str) -> bool {
        let mut successful = 0_usize;
        let mut failed = 0_usize;

        for recipient in recipients {
            let mailbox: Mailbox = match recipient.parse() {
                Ok(mailbox) => mailbox,
                Err(err) => {
                    warn!(%recipient, ?err, "skipping invalid recipient address");
                    failed += 1;
                    continue;
                }
            };

            let message = Message::builder()
                .from(self.from.clone())
                .to(mailbox)
                .subject(subject)
                .multipart(MultiPart::alternative_plain_html(
                    text.to_string(),
                    html.to_string(),
                ));

            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    error!(?err, "failed to build email message");
                    failed += 1;
                    continue;
                }
            };

            match self.transport.send(message).await {
                Ok(_) => successful += 1,
                Err(err) => {
                    warn!(%recipient, ?err, "failed to send email");
                    failed += 1;
                }
            }
        }

        info!(successful, failed, subject, "email batch completed");
        successful > 0
    }
}
