//! Mail channel: plain-text change report over authenticated SMTP with TLS.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::Notifier;
use crate::error::{AppError, DeliveryError, Result};
use crate::models::{MailCredentials, NotificationEvent, SmtpTls};

/// Per-process sequence mixed into Message-IDs.
static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Sends change reports through an SMTP relay.
pub struct MailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl MailNotifier {
    pub fn new(credentials: &MailCredentials, timeout: Duration) -> Result<Self> {
        let builder = match credentials.tls {
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&credentials.host)
            }
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&credentials.host),
        }
        .map_err(|e| AppError::notifier(format!("SMTP relay {}: {e}", credentials.host)))?;

        let transport = builder
            .port(credentials.port)
            .credentials(SmtpCredentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            transport,
            from: credentials.from_mailbox()?,
            to: credentials.to_mailboxes()?,
        })
    }

    /// Build the message for `event`.
    pub fn compose(&self, event: &NotificationEvent) -> std::result::Result<Message, DeliveryError> {
        let mut builder = Message::builder()
            .message_id(Some(self.message_id(event)))
            .from(self.from.clone())
            .subject(subject(event))
            .date_now()
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(body(event))
            .map_err(|e| DeliveryError::Compose(e.to_string()))
    }

    fn message_id(&self, event: &NotificationEvent) -> String {
        let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
        let nanos = event.observed_at.timestamp_nanos_opt().unwrap_or_default();
        let short = event.new_fingerprint.get(..16).unwrap_or(&event.new_fingerprint);
        format!("<{nanos}.{seq}.{short}.sitemon@{}>", self.from.email.domain())
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    fn channel(&self) -> &str {
        "mail"
    }

    async fn deliver(&self, event: &NotificationEvent) -> std::result::Result<(), DeliveryError> {
        let message = self.compose(event)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| classify_smtp_error(&e))?;
        Ok(())
    }
}

fn subject(event: &NotificationEvent) -> String {
    format!("Sitemon - {} - Content change detected", event.target.name)
}

fn body(event: &NotificationEvent) -> String {
    format!(
        "Sitemon content change notification\n\n\
         Name: {}\n\
         Target: {}\n\
         Old hash: {}\n\
         New hash: {}\n\
         Timestamp: {}\n",
        event.target.name,
        event.target.url,
        event.prior_display(),
        event.new_fingerprint,
        event.observed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

fn classify_smtp_error(e: &lettre::transport::smtp::Error) -> DeliveryError {
    if let Some(code) = e.status() {
        let code: u16 = code.to_string().parse().unwrap_or_default();
        // 530/534/535: authentication required, too weak, or rejected
        return match code {
            530 | 534 | 535 => DeliveryError::AuthFailed(e.to_string()),
            _ => DeliveryError::RejectedByServer(code),
        };
    }
    if e.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::ConnectFailed(e.to_string())
    }
}
