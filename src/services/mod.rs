//! Service layer for the monitor.
//!
//! - Target fetching (`HttpFetcher`)
//! - Change notifications (`MailNotifier`, `TelegramNotifier`)

pub mod fetcher;
pub mod notify;

pub use fetcher::{Fetcher, HttpFetcher};
pub use notify::{MailNotifier, Notifier, TelegramNotifier, build_notifiers, dispatch, test_channels};
