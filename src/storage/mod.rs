//! Fingerprint history storage.
//!
//! History is an append-only log of `(target, fingerprint, timestamp)`
//! rows. The "last fingerprint" of a target is always derived from the
//! log (highest insertion order), never kept as a separate field.
//!
//! ## Table Layout
//!
//! ```text
//! logs
//! ├── rowid       # implicit, insertion order
//! ├── target      # target name
//! ├── hash        # hex SHA-256 of the fetched body
//! └── timestamp   # RFC 3339, UTC
//! ```

pub mod sqlite;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::FingerprintRecord;

// Re-export for convenience
pub use sqlite::SqliteStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StorageError>;

/// Trait for fingerprint history backends.
///
/// Implementations must serialize concurrent appends so that
/// `last_fingerprint` never observes a half-written record.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Fingerprint of the most recently appended record for `target`.
    ///
    /// `Ok(None)` when the target has no history yet.
    async fn last_fingerprint(&self, target: &str) -> StoreResult<Option<String>>;

    /// Durably append a record. Visible to `last_fingerprint` once this returns.
    async fn append(&self, record: &FingerprintRecord) -> StoreResult<()>;

    /// Up to `limit` records for `target`, newest first.
    async fn history(&self, target: &str, limit: usize) -> StoreResult<Vec<FingerprintRecord>>;
}
