//! Utility functions and helpers.

pub mod http;

/// Leading characters of a fingerprint, for log lines.
pub fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
