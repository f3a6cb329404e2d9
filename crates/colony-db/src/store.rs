//! The persistence interface consumed by the engine.
//!
//! A [`SettlementTxn`] is the logical per-settlement update lock: while one
//! is open, no other transaction on the same settlement can begin. Player
//! commands and tick processors both mutate settlements only through a
//! transaction, so a build request never reads an `area_used` that a
//! concurrent completion sweep is about to change.
//!
//! Dropping a transaction without calling [`SettlementTxn::commit`] rolls
//! it back.

use std::collections::BTreeMap;
use std::future::Future;

use colony_types::{SettlementId, SettlementRecord, Subsystem};

use crate::error::StoreError;

/// Last-fired window ID per subsystem.
pub type FiredWindows = BTreeMap<Subsystem, i64>;

/// Transactional access to settlement records.
pub trait SettlementStore: Send + Sync + 'static {
    /// Open transaction type.
    type Txn: SettlementTxn;

    /// IDs of every settlement, in ID order.
    fn list(&self) -> impl Future<Output = Result<Vec<SettlementId>, StoreError>> + Send;

    /// A consistent copy of one settlement.
    fn get(
        &self,
        id: SettlementId,
    ) -> impl Future<Output = Result<SettlementRecord, StoreError>> + Send;

    /// Store a newly founded settlement.
    fn insert(
        &self,
        record: SettlementRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lock a settlement for update.
    fn begin(&self, id: SettlementId)
    -> impl Future<Output = Result<Self::Txn, StoreError>> + Send;

    /// Window IDs most recently fired by the scheduler.
    fn fired_windows(&self) -> impl Future<Output = Result<FiredWindows, StoreError>> + Send;

    /// Durably record that `subsystem` fired for `window_id`.
    fn record_fired(
        &self,
        subsystem: Subsystem,
        window_id: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// An open update transaction on one settlement.
pub trait SettlementTxn: Send {
    /// The working copy.
    fn record(&self) -> &SettlementRecord;

    /// The working copy, mutably.
    fn record_mut(&mut self) -> &mut SettlementRecord;

    /// Write the working copy back, bumping its version.
    fn commit(self) -> impl Future<Output = Result<SettlementRecord, StoreError>> + Send;

    /// Delete the settlement together with its storage, population,
    /// structures, queue and disaster state.
    fn abandon(self) -> impl Future<Output = Result<SettlementRecord, StoreError>> + Send;
}
