//! Error types for the settlement store.
//!
//! Every store failure is a [`StoreError`]. Tick processors treat all of
//! them as transient for the settlement involved; only failures listing
//! settlements or persisting fired windows are fatal to the scheduler.

use colony_types::SettlementId;

/// Errors that can occur in the settlement store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No settlement with this ID exists.
    #[error("settlement not found: {0}")]
    NotFound(SettlementId),

    /// A settlement with this ID already exists.
    #[error("settlement already exists: {0}")]
    AlreadyExists(SettlementId),

    /// The record changed underneath an open transaction.
    #[error("version conflict on settlement {settlement_id}: expected {expected}, found {found}")]
    VersionConflict {
        /// The settlement.
        settlement_id: SettlementId,
        /// Version the transaction started from.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },

    /// The store could not serve the request right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing a snapshot file failed.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
