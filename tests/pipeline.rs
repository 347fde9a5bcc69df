//! End-to-end runs against a local HTTP server and an on-disk database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sitemon::error::DeliveryError;
use sitemon::models::{ChangeOutcome, FetchConfig, NotificationEvent, Target, TargetStatus};
use sitemon::pipeline::{RunContext, RunOptions, fingerprint, run_monitor};
use sitemon::services::{HttpFetcher, Notifier};
use sitemon::storage::{FingerprintStore, SqliteStore};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

type Pages = Arc<Mutex<HashMap<String, String>>>;

/// Serves the current body for each request path; unknown paths get 404.
async fn site(pages: Pages) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let pages = pages.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();

                let body = pages.lock().unwrap().get(&path).cloned();
                let (status, body) = match body {
                    Some(body) => ("200 OK", body),
                    None => ("404 Not Found", String::new()),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<(String, NotificationEvent)>>>);

impl Outbox {
    fn take(&self) -> Vec<(String, NotificationEvent)> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

struct RecordingNotifier {
    channel: &'static str,
    outbox: Outbox,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> &str {
        self.channel
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<(), DeliveryError> {
        self.outbox
            .0
            .lock()
            .unwrap()
            .push((self.channel.to_string(), event.clone()));
        if self.fail {
            Err(DeliveryError::ConnectFailed("relay down".into()))
        } else {
            Ok(())
        }
    }
}

struct Harness {
    store: SqliteStore,
    fetcher: HttpFetcher,
    notifiers: Vec<Box<dyn Notifier>>,
    outbox: Outbox,
    pages: Pages,
    targets: Vec<Target>,
    _dir: TempDir,
}

impl Harness {
    async fn new(fail_mail: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("db/sitemon.db")).unwrap();
        let fetcher = HttpFetcher::new(&FetchConfig {
            timeout_secs: 2,
            ..FetchConfig::default()
        })
        .unwrap();

        let outbox = Outbox::default();
        let notifiers: Vec<Box<dyn Notifier>> = vec![
            Box::new(RecordingNotifier {
                channel: "mail",
                outbox: outbox.clone(),
                fail: fail_mail,
            }),
            Box::new(RecordingNotifier {
                channel: "telegram",
                outbox: outbox.clone(),
                fail: false,
            }),
        ];

        let pages = Pages::default();
        let base = site(pages.clone()).await;
        let targets = vec![
            Target::new("blog", format!("{base}/blog")),
            Target::new("api", format!("{base}/api")),
        ];

        Self {
            store,
            fetcher,
            notifiers,
            outbox,
            pages,
            targets,
            _dir: dir,
        }
    }

    fn publish(&self, path: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(path.to_string(), body.to_string());
    }

    async fn run(&self) -> sitemon::models::RunSummary {
        let ctx = RunContext {
            fetcher: &self.fetcher,
            store: &self.store,
            notifiers: &self.notifiers,
            options: RunOptions {
                fetch_timeout: Duration::from_secs(5),
                notify_timeout: Duration::from_secs(5),
                max_concurrent: 2,
                deadline: None,
            },
        };
        run_monitor(&ctx, &self.targets).await
    }
}

#[tokio::test]
async fn blog_first_seen_then_unchanged_then_changed() {
    let h = Harness::new(false).await;
    h.publish("/blog", "<h1>Post 1</h1>");

    // The api page is not published yet, so its 404 body is fingerprinted.
    let first = h.run().await;
    assert_eq!(first.reports[0].outcome(), Some(&ChangeOutcome::FirstSeen));
    assert!(h.outbox.take().is_empty());

    // Same content: a second record, no notification.
    let second = h.run().await;
    assert!(matches!(
        second.reports[0].outcome(),
        Some(ChangeOutcome::Unchanged { .. })
    ));
    assert!(h.outbox.take().is_empty());

    // Blog changes: one event per channel with both fingerprints.
    h.publish("/blog", "<h1>Post 2</h1>");
    let third = h.run().await;
    assert_eq!(third.changed(), 1);
    let sent = h.outbox.take();
    assert_eq!(sent.len(), 2);
    for (_, event) in &sent {
        assert_eq!(event.target.name, "blog");
        assert_eq!(
            event.prior_fingerprint.as_deref(),
            Some(fingerprint(b"<h1>Post 1</h1>").as_str())
        );
        assert_eq!(event.new_fingerprint, fingerprint(b"<h1>Post 2</h1>"));
    }

    let history = h.store.history("blog", 10).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].fingerprint, fingerprint(b"<h1>Post 2</h1>"));
    assert_eq!(history[1].fingerprint, history[2].fingerprint);
}

#[tokio::test]
async fn failing_mail_channel_does_not_affect_telegram_or_history() {
    let h = Harness::new(true).await;
    h.publish("/blog", "v1");
    h.publish("/api", "{}");
    h.run().await;

    h.publish("/blog", "v2");
    let summary = h.run().await;

    let blog = &summary.reports[0];
    assert_eq!(blog.deliveries.len(), 2);
    assert!(!blog.deliveries[0].is_ok());
    assert!(blog.deliveries[1].is_ok());
    assert_eq!(summary.delivery_failures(), 1);
    assert!(!summary.is_clean());
    assert_eq!(
        h.store.last_fingerprint("blog").await.unwrap(),
        Some(fingerprint(b"v2"))
    );
}

#[tokio::test]
async fn unreachable_target_is_reported_and_others_continue() {
    let mut h = Harness::new(false).await;
    h.publish("/api", "{}");
    h.targets.insert(0, Target::new("down", "http://127.0.0.1:9/"));

    let summary = h.run().await;

    assert!(matches!(
        summary.reports[0].status,
        TargetStatus::FetchFailed { .. }
    ));
    assert_eq!(summary.reports[2].outcome(), Some(&ChangeOutcome::FirstSeen));
    assert_eq!(summary.failed(), 1);
    assert!(h.store.history("down", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn summary_serializes_for_json_output() {
    let h = Harness::new(false).await;
    h.publish("/blog", "hello");
    h.publish("/api", "{}");

    let summary = h.run().await;
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["reports"][0]["target"], "blog");
    assert_eq!(json["reports"][0]["status"], "recorded");
    assert_eq!(json["reports"][0]["outcome"]["kind"], "first_seen");
}
