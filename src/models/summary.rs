//! Per-run summary handed back to the CLI for logging and exit status.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{DeliveryError, FetchError};
use crate::models::{ChangeOutcome, FingerprintRecord};

/// Result of one channel delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DeliveryError>,
}

impl DeliveryReport {
    pub fn new(channel: impl Into<String>, result: Result<(), DeliveryError>) -> Self {
        Self {
            channel: channel.into(),
            error: result.err(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// How far a target got through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetStatus {
    /// Fetched, classified and appended to history
    Recorded {
        outcome: ChangeOutcome,
        record: FingerprintRecord,
    },
    /// Content could not be retrieved
    FetchFailed { error: FetchError },
    /// History could not be read or written; nothing was notified
    StorageFailed { message: String },
    /// Not started before the run deadline expired
    Skipped,
}

/// Outcome for a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub url: String,
    #[serde(flatten)]
    pub status: TargetStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deliveries: Vec<DeliveryReport>,
}

impl TargetReport {
    pub fn outcome(&self) -> Option<&ChangeOutcome> {
        match &self.status {
            TargetStatus::Recorded { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    /// Whether the target failed to reach the history step.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            TargetStatus::FetchFailed { .. } | TargetStatus::StorageFailed { .. }
        )
    }
}

/// Aggregated results of one run, in target order.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<TargetReport>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn first_seen(&self) -> usize {
        self.count_outcomes(|o| matches!(o, ChangeOutcome::FirstSeen))
    }

    pub fn unchanged(&self) -> usize {
        self.count_outcomes(|o| matches!(o, ChangeOutcome::Unchanged { .. }))
    }

    pub fn changed(&self) -> usize {
        self.count_outcomes(ChangeOutcome::is_changed)
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.status, TargetStatus::Skipped))
            .count()
    }

    pub fn delivery_failures(&self) -> usize {
        self.reports
            .iter()
            .flat_map(|r| &r.deliveries)
            .filter(|d| !d.is_ok())
            .count()
    }

    /// Every target recorded and every delivery succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0 && self.delivery_failures() == 0
    }

    fn count_outcomes(&self, pred: impl Fn(&ChangeOutcome) -> bool) -> usize {
        self.reports
            .iter()
            .filter_map(TargetReport::outcome)
            .filter(|o| pred(*o))
            .count()
    }
}
