//! Whole-store snapshots on disk.
//!
//! The engine writes a snapshot on orderly shutdown and restores it on
//! start, so settlements and the scheduler's fired windows survive a
//! restart. Files are JSON, written to a temporary sibling and renamed into
//! place.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use colony_types::SettlementRecord;

use crate::error::StoreError;
use crate::store::FiredWindows;

/// Everything an [`InMemoryStore`](crate::InMemoryStore) holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Every settlement.
    pub settlements: Vec<SettlementRecord>,
    /// Scheduler window bookkeeping.
    #[serde(default)]
    pub fired_windows: FiredWindows,
}

/// Write a snapshot to `path`.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] or [`StoreError::Io`].
pub async fn write_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    info!(
        path = %path.display(),
        settlements = snapshot.settlements.len(),
        "store snapshot written"
    );
    Ok(())
}

/// Read a snapshot from `path`, or `None` if the file does not exist.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] for a corrupt file and
/// [`StoreError::Io`] for any other read failure.
pub async fn read_snapshot(path: &Path) -> Result<Option<StoreSnapshot>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StoreError::Io(err)),
    }
}
