// src/models/credentials.rs

//! Secrets for the notification channels, loaded from `credentials.toml`.
//!
//! ```toml
//! [mail]
//! username = "monitor@example.com"
//! password = "app-password"
//! host = "smtp.example.com"
//! port = 587
//! from = "Sitemon <monitor@example.com>"
//! to = ["ops@example.com"]
//!
//! [telegram]
//! bot_token = "123456:ABC"
//! chat_id = "-1001234567"
//! ```
//!
//! A missing section means the channel is not configured.

use std::fmt;
use std::fs;
use std::path::Path;

use lettre::message::Mailbox;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};

/// Credential bundle for all channels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub mail: Option<MailCredentials>,

    #[serde(default)]
    pub telegram: Option<TelegramCredentials>,
}

impl Credentials {
    /// Load and validate credentials from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read credentials {}: {e}", path.display()))
        })?;
        let credentials: Self = toml::from_str(&content)?;
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(mail) = &self.mail {
            mail.validate()?;
        }
        if let Some(telegram) = &self.telegram {
            telegram.validate()?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.mail.is_none() && self.telegram.is_none()
    }
}

/// How the SMTP session is encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (usually port 587)
    #[default]
    Starttls,
    /// TLS from the first byte (usually port 465)
    Tls,
}

/// Mail relay account and envelope addresses.
#[derive(Clone, Deserialize)]
pub struct MailCredentials {
    pub username: String,
    pub password: String,
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: SmtpTls,
    pub from: String,
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl MailCredentials {
    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(AppError::validation("mail.host is empty"));
        }
        if self.username.trim().is_empty() {
            return Err(AppError::validation("mail.username is empty"));
        }
        if self.to.is_empty() {
            return Err(AppError::validation("mail.to has no recipients"));
        }
        self.from_mailbox()?;
        self.to_mailboxes()?;
        Ok(())
    }

    pub fn from_mailbox(&self) -> Result<Mailbox> {
        parse_mailbox("mail.from", &self.from)
    }

    pub fn to_mailboxes(&self) -> Result<Vec<Mailbox>> {
        self.to
            .iter()
            .map(|addr| parse_mailbox("mail.to", addr))
            .collect()
    }
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    value
        .parse()
        .map_err(|e| AppError::validation(format!("{field} '{value}' is not a mailbox: {e}")))
}

impl fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Telegram bot token and destination chat.
#[derive(Clone, Deserialize)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.telegram.org".into()
}

impl TelegramCredentials {
    fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(AppError::validation("telegram.bot_token is empty"));
        }
        if self.chat_id.trim().is_empty() {
            return Err(AppError::validation("telegram.chat_id is empty"));
        }
        Url::parse(&self.api_base)?;
        Ok(())
    }
}

impl fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}
