//! Player commands.
//!
//! Commands run outside the tick loop but take the same per-settlement
//! store transaction the tick processors take, so a build request never
//! races a completion sweep or a resource tick. Every command first runs
//! the lazy construction completion sweep inside its transaction; when the
//! request itself is rejected, the sweep is still committed if it changed
//! anything.
//!
//! Rejections are expected outcomes: they are returned as
//! [`CommandError::Rejected`] and logged at debug level only.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use colony_db::{SettlementStore, SettlementTxn, StoreError};
use colony_types::{
    DisasterId, QueueItemId, ResourceAmounts, SettlementId, SettlementRecord, StructureId,
    StructureType,
};
use colony_world::area::summarize;
use colony_world::construction::{cancel, complete_due, demolish, enqueue};
use colony_world::disaster::acknowledge;
use colony_world::repair::request_repair;
use colony_world::validation::{validate_build, validate_upgrade};
use colony_world::{
    AreaSummary, BuildRejection, ConstructionReport, Demolition, Enqueued, Founding,
    HarvestReport, RepairQuote, WorldError, WorldRules, found_settlement, harvest,
    repair_window_remaining,
};

use crate::broadcast::{Broadcaster, GatewayEvent, Room};
use crate::clock::Clock;
use crate::processors::{ConstructionUpdate, DisasterCleared, ResourceUpdate, deliver};

/// Errors returned to the player.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The request broke a settlement rule.
    #[error("request rejected: {0}")]
    Rejected(BuildRejection),

    /// The store failed or the settlement does not exist.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The request referenced a missing entity, or a rule failed.
    #[error("world error: {0}")]
    World(#[from] WorldError),
}

impl CommandError {
    /// The rejection, when the request broke a rule.
    pub const fn rejection(&self) -> Option<&BuildRejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Store(_) | Self::World(_) => None,
        }
    }
}

/// Player-facing settlement operations.
pub struct Commands<S, B, C> {
    store: Arc<S>,
    broadcaster: Arc<B>,
    clock: Arc<C>,
    rules: Arc<WorldRules>,
}

impl<S, B, C> Clone for Commands<S, B, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            broadcaster: Arc::clone(&self.broadcaster),
            clock: Arc::clone(&self.clock),
            rules: Arc::clone(&self.rules),
        }
    }
}

impl<S, B, C> std::fmt::Debug for Commands<S, B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commands").finish_non_exhaustive()
    }
}

impl<S, B, C> Commands<S, B, C>
where
    S: SettlementStore,
    B: Broadcaster,
    C: Clock,
{
    /// Wire the command surface.
    pub fn new(store: Arc<S>, broadcaster: Arc<B>, clock: Arc<C>, rules: WorldRules) -> Self {
        Self {
            store,
            broadcaster,
            clock,
            rules: Arc::new(rules),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Found a settlement with its storage and population.
    pub async fn found_settlement(
        &self,
        founding: Founding,
    ) -> Result<SettlementRecord, CommandError> {
        let record = found_settlement(founding, self.clock.now(), &self.rules);
        self.store.insert(record.clone()).await?;
        info!(
            settlement_id = %record.id(),
            name = %record.settlement.name,
            biome = %record.settlement.biome,
            "settlement founded"
        );
        Ok(record)
    }

    /// Delete a settlement and everything it owns.
    pub async fn abandon_settlement(
        &self,
        settlement_id: SettlementId,
    ) -> Result<SettlementRecord, CommandError> {
        let txn = self.store.begin(settlement_id).await?;
        let removed = txn.abandon().await?;
        info!(settlement_id = %settlement_id, "settlement abandoned");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Validate and enqueue a new structure.
    pub async fn request_build(
        &self,
        settlement_id: SettlementId,
        structure_type: StructureType,
    ) -> Result<Enqueued, CommandError> {
        let (mut txn, sweep, now) = self.begin_swept(settlement_id).await?;
        let verdict = validate_build(txn.record(), structure_type)?
            .and_then(|plan| enqueue(txn.record_mut(), plan, now, &self.rules));
        self.finish_queue_change(txn, &sweep, verdict, now).await
    }

    /// Validate and enqueue a one-level upgrade of a standing structure.
    pub async fn request_upgrade(
        &self,
        settlement_id: SettlementId,
        structure_id: StructureId,
    ) -> Result<Enqueued, CommandError> {
        let (mut txn, sweep, now) = self.begin_swept(settlement_id).await?;
        let verdict = validate_upgrade(txn.record(), structure_id)?
            .and_then(|plan| enqueue(txn.record_mut(), plan, now, &self.rules));
        self.finish_queue_change(txn, &sweep, verdict, now).await
    }

    /// Cancel an unfinished queue item, refunding its cost.
    pub async fn cancel_construction(
        &self,
        settlement_id: SettlementId,
        item_id: QueueItemId,
    ) -> Result<ResourceAmounts, CommandError> {
        let (mut txn, sweep, now) = self.begin_swept(settlement_id).await?;
        let refunded = match cancel(txn.record_mut(), item_id, now, &self.rules) {
            Ok(refunded) => refunded,
            Err(e) => {
                self.settle(txn, &sweep, false, now).await?;
                return Err(e.into());
            }
        };
        let record = txn.commit().await?;
        self.emit_construction(&record, &sweep, now);
        Ok(refunded)
    }

    /// Remove a standing structure. The Town Hall cannot be demolished.
    pub async fn demolish_structure(
        &self,
        settlement_id: SettlementId,
        structure_id: StructureId,
    ) -> Result<Demolition, CommandError> {
        let (mut txn, sweep, now) = self.begin_swept(settlement_id).await?;
        let demolition = match demolish(txn.record_mut(), structure_id, now, &self.rules) {
            Ok(demolition) => demolition,
            Err(e) => {
                self.settle(txn, &sweep, false, now).await?;
                return Err(e.into());
            }
        };
        let record = txn.commit().await?;
        info!(
            settlement_id = %settlement_id,
            structure_id = %structure_id,
            structure_type = %demolition.removed.structure_type,
            "structure demolished"
        );
        self.emit_construction(&record, &sweep, now);
        Ok(demolition)
    }

    // -----------------------------------------------------------------------
    // Repairs and disasters
    // -----------------------------------------------------------------------

    /// Pay for a repair of a damaged structure.
    pub async fn request_repair(
        &self,
        settlement_id: SettlementId,
        structure_id: StructureId,
    ) -> Result<RepairQuote, CommandError> {
        let (mut txn, sweep, now) = self.begin_swept(settlement_id).await?;
        match request_repair(txn.record_mut(), structure_id, now, &self.rules.repairs)? {
            Ok(quote) => {
                txn.commit().await?;
                debug!(
                    settlement_id = %settlement_id,
                    structure_id = %structure_id,
                    discounted = quote.discounted,
                    "repair accepted"
                );
                Ok(quote)
            }
            Err(rejection) => {
                self.settle(txn, &sweep, false, now).await?;
                Err(reject(settlement_id, rejection))
            }
        }
    }

    /// Dismiss a disaster aftermath. The emergency repair window stays open.
    pub async fn acknowledge_aftermath(
        &self,
        settlement_id: SettlementId,
    ) -> Result<DisasterId, CommandError> {
        let (mut txn, sweep, now) = self.begin_swept(settlement_id).await?;
        let disaster_id = match acknowledge(txn.record_mut()) {
            Ok(id) => id,
            Err(e) => {
                self.settle(txn, &sweep, false, now).await?;
                return Err(e.into());
            }
        };
        let record = txn.commit().await?;
        deliver(
            self.broadcaster.as_ref(),
            Room::World(record.world_id()),
            GatewayEvent::DisasterCleared,
            &DisasterCleared {
                settlement_id,
                disaster_id,
            },
            now,
        );
        Ok(disaster_id)
    }

    /// Time left in the settlement's emergency repair window.
    pub async fn repair_window_remaining(
        &self,
        settlement_id: SettlementId,
    ) -> Result<TimeDelta, CommandError> {
        let (txn, sweep, now) = self.begin_swept(settlement_id).await?;
        let remaining =
            repair_window_remaining(txn.record().settlement.emergency_repair_until, now);
        self.settle(txn, &sweep, false, now).await?;
        Ok(remaining)
    }

    // -----------------------------------------------------------------------
    // Resources and area
    // -----------------------------------------------------------------------

    /// Harvest everything accumulated offline (login catch-up).
    pub async fn collect_offline(
        &self,
        settlement_id: SettlementId,
    ) -> Result<HarvestReport, CommandError> {
        let (mut txn, sweep, now) = self.begin_swept(settlement_id).await?;
        let report = harvest(txn.record_mut(), now, &self.rules)?;
        let record = txn.commit().await?;
        if !sweep.is_empty() {
            self.emit_construction(&record, &sweep, now);
        }
        deliver(
            self.broadcaster.as_ref(),
            Room::Settlement(settlement_id),
            GatewayEvent::ResourceUpdate,
            &ResourceUpdate {
                settlement_id,
                report: &report,
            },
            now,
        );
        Ok(report)
    }

    /// Capacity, usage, reservations and availability of the area budget.
    pub async fn area_summary(
        &self,
        settlement_id: SettlementId,
    ) -> Result<AreaSummary, CommandError> {
        let (txn, sweep, now) = self.begin_swept(settlement_id).await?;
        let summary = summarize(txn.record());
        self.settle(txn, &sweep, false, now).await?;
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn begin_swept(
        &self,
        settlement_id: SettlementId,
    ) -> Result<(S::Txn, ConstructionReport, DateTime<Utc>), CommandError> {
        let mut txn = self.store.begin(settlement_id).await?;
        let now = self.clock.now();
        let sweep = complete_due(txn.record_mut(), now, &self.rules);
        Ok((txn, sweep, now))
    }

    /// Commit when the command or the sweep changed something; otherwise
    /// roll back.
    async fn settle(
        &self,
        txn: S::Txn,
        sweep: &ConstructionReport,
        changed: bool,
        now: DateTime<Utc>,
    ) -> Result<(), CommandError> {
        if !changed && sweep.is_empty() {
            return Ok(());
        }
        let record = txn.commit().await?;
        if !sweep.is_empty() {
            self.emit_construction(&record, sweep, now);
        }
        Ok(())
    }

    async fn finish_queue_change(
        &self,
        txn: S::Txn,
        sweep: &ConstructionReport,
        verdict: Result<Enqueued, BuildRejection>,
        now: DateTime<Utc>,
    ) -> Result<Enqueued, CommandError> {
        match verdict {
            Ok(enqueued) => {
                let record = txn.commit().await?;
                debug!(
                    settlement_id = %record.id(),
                    item_id = %enqueued.item_id,
                    status = ?enqueued.status,
                    "construction enqueued"
                );
                self.emit_construction(&record, sweep, now);
                Ok(enqueued)
            }
            Err(rejection) => {
                let settlement_id = txn.record().id();
                self.settle(txn, sweep, false, now).await?;
                Err(reject(settlement_id, rejection))
            }
        }
    }

    fn emit_construction(
        &self,
        record: &SettlementRecord,
        sweep: &ConstructionReport,
        now: DateTime<Utc>,
    ) {
        let settlement_id = record.id();
        deliver(
            self.broadcaster.as_ref(),
            Room::Settlement(settlement_id),
            GatewayEvent::ConstructionUpdate,
            &ConstructionUpdate {
                settlement_id,
                report: sweep,
                area: summarize(record),
            },
            now,
        );
    }
}

fn reject(settlement_id: SettlementId, rejection: BuildRejection) -> CommandError {
    debug!(
        settlement_id = %settlement_id,
        code = rejection.code(),
        reason = %rejection,
        "request rejected"
    );
    CommandError::Rejected(rejection)
}
