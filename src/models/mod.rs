// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod credentials;
mod record;
mod summary;
pub mod target;

// Re-export all public types
pub use config::{
    Config, FetchConfig, LoggingConfig, NotifyConfig, PathsConfig, RunConfig,
};
pub use credentials::{Credentials, MailCredentials, SmtpTls, TelegramCredentials};
pub use record::{ChangeOutcome, FingerprintRecord, NotificationEvent};
pub use summary::{DeliveryReport, RunSummary, TargetReport, TargetStatus};
pub use target::Target;
