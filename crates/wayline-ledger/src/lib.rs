//! Wayline Ledger
//!
//! This crate provides the idempotency ledger for Wayline. The ledger keeps
//! one record per (reference id, workflow group, stage) and makes
//! redelivered bus messages safe: logging the same request twice converges
//! on a single row with the latest payload winning.
//!
//! The [`Ledger`] trait defines operations for:
//! - Logging stage requests (keyed upsert)
//! - Logging stage responses (keyed update; a response without a logged
//!   request is dropped rather than crashing the handler)
//! - Obsoleting history when a reference id starts a brand-new run
//! - Reading the most recent non-obsolete record of a run
//!
//! All operations are single-key reads/writes; no cross-record locking is
//! needed, and concurrent redeliveries resolve last-writer-wins under the
//! database's own row guarantees.

mod sqlite;
mod types;

pub use sqlite::SqliteLedger;
pub use types::LedgerRecord;

use async_trait::async_trait;
use wayline_message::QueueMessage;

/// Error type for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// The idempotency ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
  /// Log a stage request.
  ///
  /// Looks up the existing non-obsolete record for
  /// (message.reference_id, group, stage). If none exists, inserts a new
  /// record with the request payload; if one exists, overwrites its request
  /// payload, since the bus may redeliver the same trigger when the
  /// downstream call that would normally suppress redelivery failed.
  async fn log_request(
    &self,
    group: &str,
    stage: &str,
    message: &QueueMessage,
  ) -> Result<(), Error>;

  /// Log a stage response against the existing non-obsolete record matching
  /// (message.reference_id, stage). No-op if none exists.
  async fn log_response(&self, stage: &str, message: &QueueMessage) -> Result<(), Error>;

  /// Mark all non-obsolete records for (reference_id, group) obsolete.
  ///
  /// Used when a reference id begins a brand-new run of the same pipeline
  /// family and prior history must not be matched against it.
  async fn obsolete(&self, reference_id: &str, group: &str) -> Result<(), Error>;

  /// The most recent non-obsolete record for (reference_id, group), if any.
  async fn latest(
    &self,
    reference_id: &str,
    group: &str,
  ) -> Result<Option<LedgerRecord>, Error>;
}
