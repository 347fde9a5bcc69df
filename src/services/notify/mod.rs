//! Change notifications.
//!
//! Every configured channel receives each change event independently:
//! a failing channel never blocks another one, and nothing here touches
//! the fingerprint history.

mod mail;
mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;

use crate::error::{DeliveryError, Result};
use crate::models::{Credentials, DeliveryReport, NotificationEvent, NotifyConfig, Target};
use crate::pipeline::detect::fingerprint;

pub use mail::MailNotifier;
pub use telegram::TelegramNotifier;

/// A notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name used in logs and reports.
    fn channel(&self) -> &str;

    /// Deliver one change event.
    async fn deliver(&self, event: &NotificationEvent) -> std::result::Result<(), DeliveryError>;
}

/// Construct the channels that are both enabled and have credentials.
pub fn build_notifiers(
    credentials: &Credentials,
    config: &NotifyConfig,
) -> Result<Vec<Box<dyn Notifier>>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    match (&credentials.mail, config.mail_enabled) {
        (Some(mail), true) => {
            notifiers.push(Box::new(MailNotifier::new(mail, config.timeout())?));
        }
        (None, true) => log::warn!("Mail channel enabled but no [mail] credentials, skipping"),
        (_, false) => log::info!("Mail channel disabled"),
    }

    match (&credentials.telegram, config.telegram_enabled) {
        (Some(telegram), true) => {
            notifiers.push(Box::new(TelegramNotifier::new(telegram, config.timeout())?));
        }
        (None, true) => {
            log::warn!("Telegram channel enabled but no [telegram] credentials, skipping")
        }
        (_, false) => log::info!("Telegram channel disabled"),
    }

    Ok(notifiers)
}

/// Deliver `event` to every channel, each bounded by `timeout`.
///
/// Reports come back in channel order.
pub async fn dispatch(
    notifiers: &[Box<dyn Notifier>],
    event: &NotificationEvent,
    timeout: Duration,
) -> Vec<DeliveryReport> {
    let deliveries = notifiers.iter().map(|notifier| async move {
        let channel = notifier.channel();
        log::info!(
            "Sending {channel} notification for {}",
            event.target.name
        );

        let result = match tokio::time::timeout(timeout, notifier.deliver(event)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout),
        };

        match &result {
            Ok(()) => log::info!("{channel} notification sent for {}", event.target.name),
            Err(e) => log::error!(
                "{channel} notification failed for {}: {e}",
                event.target.name
            ),
        }
        DeliveryReport::new(channel, result)
    });

    join_all(deliveries).await
}

/// Send a synthetic change event through every channel.
pub async fn test_channels(
    notifiers: &[Box<dyn Notifier>],
    timeout: Duration,
) -> Vec<DeliveryReport> {
    let event = NotificationEvent {
        target: Target::new("sitemon-test", "https://example.com/"),
        prior_fingerprint: Some(fingerprint(b"before")),
        new_fingerprint: fingerprint(b"after"),
        observed_at: Utc::now(),
    };
    dispatch(notifiers, &event, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubNotifier {
        name: &'static str,
        result: std::result::Result<(), DeliveryError>,
        delay: Duration,
        seen: Mutex<Vec<String>>,
    }

    impl StubNotifier {
        fn new(name: &'static str, result: std::result::Result<(), DeliveryError>) -> Self {
            Self {
                name,
                result,
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for StubNotifier {
        fn channel(&self) -> &str {
            self.name
        }

        async fn deliver(
            &self,
            event: &NotificationEvent,
        ) -> std::result::Result<(), DeliveryError> {
            tokio::time::sleep(self.delay).await;
            self.seen.lock().unwrap().push(event.new_fingerprint.clone());
            self.result.clone()
        }
    }

    fn event() -> NotificationEvent {
        NotificationEvent {
            target: Target::new("blog", "https://example.com/blog"),
            prior_fingerprint: Some("aaa1".into()),
            new_fingerprint: "bbb2".into(),
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_others() {
        let notifiers: Vec<Box<dyn Notifier>> = vec![
            Box::new(StubNotifier::new(
                "mail",
                Err(DeliveryError::AuthFailed("535".into())),
            )),
            Box::new(StubNotifier::new("telegram", Ok(()))),
        ];

        let reports = dispatch(&notifiers, &event(), Duration::from_secs(1)).await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].channel, "mail");
        assert!(matches!(reports[0].error, Some(DeliveryError::AuthFailed(_))));
        assert_eq!(reports[1].channel, "telegram");
        assert!(reports[1].is_ok());
    }

    #[tokio::test]
    async fn slow_channel_times_out() {
        let mut slow = StubNotifier::new("mail", Ok(()));
        slow.delay = Duration::from_secs(5);
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(slow)];

        let reports = dispatch(&notifiers, &event(), Duration::from_millis(50)).await;
        assert_eq!(reports[0].error, Some(DeliveryError::Timeout));
    }

    #[tokio::test]
    async fn test_channels_reaches_every_channel() {
        let notifiers: Vec<Box<dyn Notifier>> = vec![
            Box::new(StubNotifier::new("mail", Ok(()))),
            Box::new(StubNotifier::new("telegram", Ok(()))),
        ];
        let reports = test_channels(&notifiers, Duration::from_secs(1)).await;
        assert!(reports.iter().all(DeliveryReport::is_ok));
    }

    #[test]
    fn build_skips_unconfigured_channels() {
        let notifiers = build_notifiers(&Credentials::default(), &NotifyConfig::default()).unwrap();
        assert!(notifiers.is_empty());
    }

    #[test]
    fn build_respects_disabled_channels() {
        let credentials: Credentials = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:ABC"
            chat_id = "-100"
            "#,
        )
        .unwrap();

        let enabled = build_notifiers(&credentials, &NotifyConfig::default()).unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].channel(), "telegram");

        let config = NotifyConfig {
            telegram_enabled: false,
            ..NotifyConfig::default()
        };
        assert!(build_notifiers(&credentials, &config).unwrap().is_empty());
    }
}
