//! In-process settlement store.
//!
//! Each settlement lives in its own `tokio::sync::Mutex`; a transaction
//! holds the owned guard for its whole lifetime and edits a private working
//! copy. Commit checks the version the transaction started from before
//! writing back, so a stale working copy can never overwrite newer state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

use colony_types::{SettlementId, SettlementRecord, Subsystem};

use crate::error::StoreError;
use crate::snapshot::StoreSnapshot;
use crate::store::{FiredWindows, SettlementStore, SettlementTxn};

type Slot = Arc<Mutex<Option<SettlementRecord>>>;

#[derive(Debug, Default)]
struct Inner {
    settlements: RwLock<BTreeMap<SettlementId, Slot>>,
    fired: Mutex<FiredWindows>,
    outages: Mutex<BTreeSet<SettlementId>>,
}

/// A transactional settlement store held in memory.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let settlements = snapshot
            .settlements
            .into_iter()
            .map(|record| (record.id(), Arc::new(Mutex::new(Some(record)))))
            .collect();
        Self {
            inner: Arc::new(Inner {
                settlements: RwLock::new(settlements),
                fired: Mutex::new(snapshot.fired_windows),
                outages: Mutex::new(BTreeSet::new()),
            }),
        }
    }

    /// A consistent copy of everything in the store.
    ///
    /// Each settlement is locked in turn, so a snapshot taken while ticks
    /// run never contains a half-applied transaction.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let slots: Vec<Slot> = self.inner.settlements.read().await.values().cloned().collect();
        let mut settlements = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(record) = slot.lock().await.clone() {
                settlements.push(record);
            }
        }
        StoreSnapshot {
            taken_at: Utc::now(),
            settlements,
            fired_windows: self.inner.fired.lock().await.clone(),
        }
    }

    /// Number of settlements stored.
    pub async fn len(&self) -> usize {
        self.inner.settlements.read().await.len()
    }

    /// Whether the store holds no settlements.
    pub async fn is_empty(&self) -> bool {
        self.inner.settlements.read().await.is_empty()
    }

    /// Make the next [`SettlementStore::begin`] on `id` fail with
    /// [`StoreError::Unavailable`], simulating a transient outage.
    pub async fn fail_next_begin(&self, id: SettlementId) {
        self.inner.outages.lock().await.insert(id);
    }

    async fn slot(&self, id: SettlementId) -> Result<Slot, StoreError> {
        self.inner
            .settlements
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }
}

impl SettlementStore for InMemoryStore {
    type Txn = MemoryTxn;

    async fn list(&self) -> Result<Vec<SettlementId>, StoreError> {
        Ok(self.inner.settlements.read().await.keys().copied().collect())
    }

    async fn get(&self, id: SettlementId) -> Result<SettlementRecord, StoreError> {
        let slot = self.slot(id).await?;
        let guard = slot.lock().await;
        guard.clone().ok_or(StoreError::NotFound(id))
    }

    async fn insert(&self, record: SettlementRecord) -> Result<(), StoreError> {
        let id = record.id();
        let mut settlements = self.inner.settlements.write().await;
        if settlements.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        settlements.insert(id, Arc::new(Mutex::new(Some(record))));
        debug!(settlement_id = %id, "settlement stored");
        Ok(())
    }

    async fn begin(&self, id: SettlementId) -> Result<MemoryTxn, StoreError> {
        if self.inner.outages.lock().await.remove(&id) {
            warn!(settlement_id = %id, "simulated store outage");
            return Err(StoreError::Unavailable(format!(
                "settlement {id} temporarily unavailable"
            )));
        }
        let slot = self.slot(id).await?;
        let guard = slot.lock_owned().await;
        let working = guard.clone().ok_or(StoreError::NotFound(id))?;
        Ok(MemoryTxn {
            store: Arc::clone(&self.inner),
            base_version: working.version,
            guard,
            working,
        })
    }

    async fn fired_windows(&self) -> Result<FiredWindows, StoreError> {
        Ok(self.inner.fired.lock().await.clone())
    }

    async fn record_fired(&self, subsystem: Subsystem, window_id: i64) -> Result<(), StoreError> {
        self.inner.fired.lock().await.insert(subsystem, window_id);
        Ok(())
    }
}

/// An open transaction on an [`InMemoryStore`] settlement.
#[derive(Debug)]
pub struct MemoryTxn {
    store: Arc<Inner>,
    base_version: u64,
    guard: OwnedMutexGuard<Option<SettlementRecord>>,
    working: SettlementRecord,
}

impl MemoryTxn {
    fn check_version(&self) -> Result<(), StoreError> {
        let id = self.working.id();
        let stored = self.guard.as_ref().ok_or(StoreError::NotFound(id))?;
        if stored.version != self.base_version {
            return Err(StoreError::VersionConflict {
                settlement_id: id,
                expected: self.base_version,
                found: stored.version,
            });
        }
        Ok(())
    }
}

impl SettlementTxn for MemoryTxn {
    fn record(&self) -> &SettlementRecord {
        &self.working
    }

    fn record_mut(&mut self) -> &mut SettlementRecord {
        &mut self.working
    }

    async fn commit(mut self) -> Result<SettlementRecord, StoreError> {
        self.check_version()?;
        self.working.version = self.base_version.saturating_add(1);
        *self.guard = Some(self.working.clone());
        Ok(self.working)
    }

    async fn abandon(mut self) -> Result<SettlementRecord, StoreError> {
        self.check_version()?;
        let id = self.working.id();
        *self.guard = None;
        self.store.settlements.write().await.remove(&id);
        debug!(settlement_id = %id, "settlement abandoned");
        Ok(self.working)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::DateTime;
    use colony_types::{
        PlayerId, Population, ResourceStock, ResourceStorage, Settlement, WorldId,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn record() -> SettlementRecord {
        let stock = ResourceStock {
            amount: 0,
            capacity: 100,
        };
        SettlementRecord {
            settlement: Settlement {
                id: SettlementId::new(),
                world_id: WorldId::new(),
                owner_id: PlayerId::new(),
                name: String::from("Vault"),
                biome: String::from("tundra"),
                founded_at: DateTime::<Utc>::UNIX_EPOCH,
                last_harvest_at: None,
                town_hall_level: 0,
                area_used: 0,
                area_capacity: 500,
                emergency_repair_until: None,
            },
            storage: ResourceStorage {
                food: stock,
                water: stock,
                wood: stock,
                stone: stock,
                ore: stock,
            },
            population: Population {
                current: 1,
                capacity: 10,
                happiness: Decimal::from(50),
                last_growth_tick: None,
                growth_progress: Decimal::ZERO,
            },
            structures: Vec::new(),
            queue: Vec::new(),
            disaster: None,
            version: 0,
        }
    }

    #[tokio::test]
    async fn commit_bumps_version() {
        let store = InMemoryStore::new();
        let rec = record();
        let id = rec.id();
        store.insert(rec).await.unwrap();

        let mut txn = store.begin(id).await.unwrap();
        txn.record_mut().storage.food.amount = 40;
        let committed = txn.commit().await.unwrap();
        assert_eq!(committed.version, 1);
        assert_eq!(store.get(id).await.unwrap().storage.food.amount, 40);
    }

    #[tokio::test]
    async fn dropped_txn_rolls_back() {
        let store = InMemoryStore::new();
        let rec = record();
        let id = rec.id();
        store.insert(rec).await.unwrap();

        {
            let mut txn = store.begin(id).await.unwrap();
            txn.record_mut().population.current = 99;
        }
        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.population.current, 1);
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn duplicate_insert_rejected() {
        let store = InMemoryStore::new();
        let rec = record();
        store.insert(rec.clone()).await.unwrap();
        assert!(matches!(
            store.insert(rec).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn outage_is_one_shot() {
        let store = InMemoryStore::new();
        let rec = record();
        let id = rec.id();
        store.insert(rec).await.unwrap();
        store.fail_next_begin(id).await;

        assert!(matches!(
            store.begin(id).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.begin(id).await.is_ok());
    }
}
