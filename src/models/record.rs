//! Fingerprint history records and the values derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Target;

/// One observation of a target's content. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Target name
    pub target: String,

    /// Hex-encoded SHA-256 of the fetched body
    pub fingerprint: String,

    /// When the content was fetched
    pub observed_at: DateTime<Utc>,
}

impl FingerprintRecord {
    pub fn new(
        target: impl Into<String>,
        fingerprint: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            target: target.into(),
            fingerprint: fingerprint.into(),
            observed_at,
        }
    }
}

/// Classification of a new fingerprint against the last recorded one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeOutcome {
    /// No history for the target yet
    FirstSeen,
    /// Same fingerprint as last time
    Unchanged { prior: String },
    /// Fingerprint differs from the last one
    Changed { prior: String, current: String },
}

impl ChangeOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, ChangeOutcome::Changed { .. })
    }

    /// Fingerprint recorded before this run, if any.
    pub fn prior(&self) -> Option<&str> {
        match self {
            ChangeOutcome::FirstSeen => None,
            ChangeOutcome::Unchanged { prior } | ChangeOutcome::Changed { prior, .. } => {
                Some(prior)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeOutcome::FirstSeen => "first seen",
            ChangeOutcome::Unchanged { .. } => "unchanged",
            ChangeOutcome::Changed { .. } => "changed",
        }
    }
}

/// A detected change, handed to every notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub target: Target,
    pub prior_fingerprint: Option<String>,
    pub new_fingerprint: String,
    pub observed_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Build the event for a changed outcome. Returns `None` otherwise.
    pub fn from_outcome(
        target: &Target,
        outcome: &ChangeOutcome,
        observed_at: DateTime<Utc>,
    ) -> Option<Self> {
        match outcome {
            ChangeOutcome::Changed { prior, current } => Some(Self {
                target: target.clone(),
                prior_fingerprint: Some(prior.clone()),
                new_fingerprint: current.clone(),
                observed_at,
            }),
            _ => None,
        }
    }

    /// Prior fingerprint for display; "none" when there was no history.
    pub fn prior_display(&self) -> &str {
        self.prior_fingerprint.as_deref().unwrap_or("none")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_only_for_changed() {
        let target = Target::new("blog", "https://example.com/blog");
        let now = Utc::now();

        assert!(NotificationEvent::from_outcome(&target, &ChangeOutcome::FirstSeen, now).is_none());
        assert!(
            NotificationEvent::from_outcome(
                &target,
                &ChangeOutcome::Unchanged { prior: "a".into() },
                now
            )
            .is_none()
        );

        let event = NotificationEvent::from_outcome(
            &target,
            &ChangeOutcome::Changed {
                prior: "a".into(),
                current: "b".into(),
            },
            now,
        )
        .unwrap();
        assert_eq!(event.prior_fingerprint.as_deref(), Some("a"));
        assert_eq!(event.new_fingerprint, "b");
        assert_eq!(event.target.url, "https://example.com/blog");
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_value(ChangeOutcome::Changed {
            prior: "a".into(),
            current: "b".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "changed");
        assert_eq!(json["prior"], "a");
        assert_eq!(json["current"], "b");
    }
}
