//! Telegram channel: HTML-formatted message via the Bot API `sendMessage`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;

use super::Notifier;
use crate::error::{DeliveryError, Result};
use crate::models::{NotificationEvent, TelegramCredentials};
use crate::utils::http;

pub struct TelegramNotifier {
    client: Client,
    /// Contains the bot token; never logged
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(credentials: &TelegramCredentials, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::create_notify_client(timeout)?,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                credentials.api_base.trim_end_matches('/'),
                credentials.bot_token
            ),
            chat_id: credentials.chat_id.clone(),
        })
    }
}

/// Render the message body in Telegram's HTML subset.
pub fn render(event: &NotificationEvent) -> String {
    format!(
        "<u>Sitemon</u>\n\
         \u{1F440} Content change detected\n\n\
         <b>Target</b>: {} ({})\n\
         <b>Timestamp</b>: {}\n\
         <b>Old hash</b>: <code>{}</code>\n\
         <b>New hash</b>: <code>{}</code>",
        escape_html(&event.target.name),
        escape_html(&event.target.url),
        event.observed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        escape_html(event.prior_display()),
        escape_html(&event.new_fingerprint),
    )
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn channel(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, event: &NotificationEvent) -> std::result::Result<(), DeliveryError> {
        let text = render(event);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("chat_id", self.chat_id.as_str()),
                ("parse_mode", "HTML"),
                ("text", text.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            log::debug!("Telegram answered {status}: {detail}");
            return Err(DeliveryError::RejectedByServer(status.as_u16()));
        }
        Ok(())
    }
}

/// Escape text for Telegram's HTML parse mode.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn transport_error(e: reqwest::Error) -> DeliveryError {
    if e.is_timeout() {
        DeliveryError::Timeout
    } else {
        // The request URL carries the bot token.
        DeliveryError::ConnectFailed(e.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Target;
    use crate::utils::http::test_server::{closed_port, response, serve};
    use chrono::{TimeZone, Utc};

    fn credentials(api_base: &str) -> TelegramCredentials {
        toml::from_str(&format!(
            r#"
            bot_token = "123456:SECRET"
            chat_id = "-1001"
            api_base = "{api_base}"
            "#
        ))
        .unwrap()
    }

    fn event() -> NotificationEvent {
        NotificationEvent {
            target: Target::new("api", "https://example.com/status?a=1&b=2"),
            prior_fingerprint: Some("c3d4".into()),
            new_fingerprint: "e5f6".into(),
            observed_at: Utc.with_ymd_and_hms(2026, 5, 1, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn render_escapes_and_formats() {
        let text = render(&event());
        assert!(text.starts_with("<u>Sitemon</u>"));
        assert!(text.contains("<b>Target</b>: api (https://example.com/status?a=1&amp;b=2)"));
        assert!(text.contains("<b>Timestamp</b>: 2026-05-01T08:30:00Z"));
        assert!(text.contains("<code>c3d4</code>"));
        assert!(text.contains("<code>e5f6</code>"));
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html("a<b> & \"c\""),
            "a&lt;b&gt; &amp; &quot;c&quot;"
        );
    }

    #[tokio::test]
    async fn delivers_via_send_message() {
        let mut server = serve(response("200 OK", r#"{"ok":true}"#)).await;
        let notifier =
            TelegramNotifier::new(&credentials(&server.url), Duration::from_secs(2)).unwrap();

        notifier.deliver(&event()).await.unwrap();

        let request = server.requests.recv().await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /bot123456:SECRET/sendMessage?"));
        assert!(request_line.contains("chat_id=-1001"));
        assert!(request_line.contains("parse_mode=HTML"));
        assert!(request_line.contains("text="));
    }

    #[tokio::test]
    async fn rejected_request_reports_status() {
        let server = serve(response("400 Bad Request", r#"{"ok":false}"#)).await;
        let notifier =
            TelegramNotifier::new(&credentials(&server.url), Duration::from_secs(2)).unwrap();

        let err = notifier.deliver(&event()).await.unwrap_err();
        assert_eq!(err, DeliveryError::RejectedByServer(400));
    }

    #[tokio::test]
    async fn unreachable_api_hides_token() {
        let url = closed_port().await;
        let notifier = TelegramNotifier::new(&credentials(&url), Duration::from_secs(2)).unwrap();

        let err = notifier.deliver(&event()).await.unwrap_err();
        match err {
            DeliveryError::ConnectFailed(message) => assert!(!message.contains("SECRET")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
