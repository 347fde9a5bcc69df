// src/pipeline/run.rs

//! One monitoring pass over every target.
//!
//! Per target the steps always run in order: fetch, fingerprint,
//! classify against history, append, and only then notify. A failure in
//! one target never stops the others.

use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::error::FetchError;
use crate::models::{
    ChangeOutcome, Config, FingerprintRecord, NotificationEvent, RunSummary, Target, TargetReport,
    TargetStatus,
};
use crate::pipeline::detect::{classify, fingerprint};
use crate::services::{Fetcher, Notifier, dispatch};
use crate::storage::FingerprintStore;
use crate::utils::short_fingerprint;

/// Timeouts and limits for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub fetch_timeout: Duration,
    pub notify_timeout: Duration,
    pub max_concurrent: usize,
    /// Targets not started before this much time has passed are skipped
    pub deadline: Option<Duration>,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch_timeout: config.fetch.timeout(),
            notify_timeout: config.notify.timeout(),
            max_concurrent: config.fetch.max_concurrent,
            deadline: config.run.deadline(),
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything a run needs, built once by the caller.
pub struct RunContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub store: &'a dyn FingerprintStore,
    pub notifiers: &'a [Box<dyn Notifier>],
    pub options: RunOptions,
}

/// Check every target and return a report per target, in target order.
pub async fn run_monitor(ctx: &RunContext<'_>, targets: &[Target]) -> RunSummary {
    let started_at = Utc::now();
    let deadline = ctx.options.deadline.map(|d| Instant::now() + d);

    log::info!(
        "Checking {} targets ({} channels, concurrency {})",
        targets.len(),
        ctx.notifiers.len(),
        ctx.options.max_concurrent
    );

    let reports: Vec<TargetReport> = stream::iter(targets)
        .map(|target| process_target(ctx, target, deadline))
        .buffered(ctx.options.max_concurrent.max(1))
        .collect()
        .await;

    let summary = RunSummary {
        started_at,
        finished_at: Utc::now(),
        reports,
    };

    log::info!(
        "Run finished: {} changed, {} unchanged, {} first seen, {} failed, {} skipped, {} delivery failures",
        summary.changed(),
        summary.unchanged(),
        summary.first_seen(),
        summary.failed(),
        summary.skipped(),
        summary.delivery_failures()
    );

    summary
}

async fn process_target(
    ctx: &RunContext<'_>,
    target: &Target,
    deadline: Option<Instant>,
) -> TargetReport {
    let report = |status| TargetReport {
        target: target.name.clone(),
        url: target.url.clone(),
        status,
        deliveries: Vec::new(),
    };

    if deadline.is_some_and(|d| Instant::now() >= d) {
        log::warn!("Run deadline reached, skipping {}", target.name);
        return report(TargetStatus::Skipped);
    }

    log::debug!("Fetching {} ({})", target.name, target.url);
    let fetched = tokio::time::timeout(ctx.options.fetch_timeout, ctx.fetcher.fetch(&target.url))
        .await
        .unwrap_or(Err(FetchError::Timeout));
    let body = match fetched {
        Ok(body) => body,
        Err(error) => {
            log::error!("Failed to fetch {} ({}): {error}", target.name, target.url);
            return report(TargetStatus::FetchFailed { error });
        }
    };

    let observed_at = Utc::now();
    let current = fingerprint(&body);

    let prior = match ctx.store.last_fingerprint(&target.name).await {
        Ok(prior) => prior,
        Err(e) => {
            log::error!("Cannot read history for {}: {e}", target.name);
            return report(TargetStatus::StorageFailed {
                message: e.to_string(),
            });
        }
    };

    let outcome = classify(prior.as_deref(), &current);
    let record = FingerprintRecord::new(&target.name, &current, observed_at);

    // History is written before any channel hears about the change.
    if let Err(e) = ctx.store.append(&record).await {
        log::error!("Cannot record fingerprint for {}: {e}", target.name);
        return report(TargetStatus::StorageFailed {
            message: e.to_string(),
        });
    }

    match &outcome {
        ChangeOutcome::FirstSeen => log::info!(
            "{}: first seen, fingerprint {}",
            target.name,
            short_fingerprint(&current)
        ),
        ChangeOutcome::Unchanged { .. } => log::info!("{}: no change detected", target.name),
        ChangeOutcome::Changed { prior, .. } => log::info!(
            "{}: content changed ({} -> {})",
            target.name,
            short_fingerprint(prior),
            short_fingerprint(&current)
        ),
    }

    let deliveries = match NotificationEvent::from_outcome(target, &outcome, observed_at) {
        Some(event) => dispatch(ctx.notifiers, &event, ctx.options.notify_timeout).await,
        None => Vec::new(),
    };

    TargetReport {
        deliveries,
        ..report(TargetStatus::Recorded { outcome, record })
    }
}
