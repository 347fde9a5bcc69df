//! Change detection.
//!
//! Fingerprints fetched content and classifies it against the last
//! recorded fingerprint of the same target.
//!
//! ```text
//! NO_HISTORY ──fetch──▶ STABLE(fp)                         (no notification)
//! STABLE(fp) ──same bytes──▶ STABLE(fp)                    (no notification)
//! STABLE(fp) ──different bytes──▶ STABLE(new)              (notify)
//! ```

use sha2::{Digest, Sha256};

use crate::models::ChangeOutcome;

/// Hex-encoded SHA-256 of `content`.
///
/// No normalization is applied: any byte difference, including an
/// embedded timestamp, yields a different fingerprint.
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Classify `current` against the previously recorded fingerprint.
pub fn classify(prior: Option<&str>, current: &str) -> ChangeOutcome {
    match prior {
        None => ChangeOutcome::FirstSeen,
        Some(prior) if prior == current => ChangeOutcome::Unchanged {
            prior: prior.to_string(),
        },
        Some(prior) => ChangeOutcome::Changed {
            prior: prior.to_string(),
            current: current.to_string(),
        },
    }
}
