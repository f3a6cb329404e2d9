//! Per-settlement subsystem processing.
//!
//! One call handles one settlement for one subsystem firing: open a store
//! transaction, apply the subsystem's rules to the working copy, commit if
//! anything changed, then emit the matching gateway events. Any error
//! before the commit drops the transaction, rolling the settlement back to
//! its state before the firing; the settlement is picked up again on the
//! next natural tick.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use tracing::{debug, warn};

use colony_db::{SettlementStore, SettlementTxn, StoreError};
use colony_population::{PopulationChange, PopulationConfig, PopulationError, advance_population};
use colony_types::{DisasterId, SettlementId, SettlementRecord, Subsystem};
use colony_world::area::{AreaSummary, summarize};
use colony_world::construction::complete_due;
use colony_world::disaster::advance;
use colony_world::repair::repair_tick;
use colony_world::{
    ConstructionReport, DisasterTransition, HarvestReport, RepairProgress, WorldError, WorldRules,
    harvest,
};

use crate::broadcast::{BroadcastMessage, Broadcaster, GatewayEvent, Room};

/// Errors raised while processing one settlement.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A settlement rule failed.
    #[error("world rule error: {0}")]
    World(#[from] WorldError),

    /// Population dynamics failed.
    #[error("population error: {0}")]
    Population(#[from] PopulationError),
}

/// Rules and seed shared by every processor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickContext {
    /// World rule tables.
    pub rules: WorldRules,
    /// Population dynamics.
    pub population: PopulationConfig,
    /// World seed for random rolls.
    pub seed: u64,
}

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

/// Payload of `resource-update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUpdate<'a> {
    /// Settlement harvested.
    pub settlement_id: SettlementId,
    /// What the harvest produced and consumed.
    pub report: &'a HarvestReport,
}

/// Payload of `construction-update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionUpdate<'a> {
    /// Settlement whose queue changed.
    pub settlement_id: SettlementId,
    /// Completed and promoted items.
    pub report: &'a ConstructionReport,
    /// Area budget after the changes.
    pub area: AreaSummary,
}

/// Payload of `population-update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationUpdate<'a> {
    /// Settlement updated.
    pub settlement_id: SettlementId,
    /// Change breakdown.
    pub change: &'a PopulationChange,
}

/// Payload of `repair-update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairUpdate<'a> {
    /// Settlement repaired.
    pub settlement_id: SettlementId,
    /// Health restored per structure.
    pub progress: &'a [RepairProgress],
}

/// Payload of `disaster-cleared`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterCleared {
    /// Settlement whose disaster ended.
    pub settlement_id: SettlementId,
    /// The finished disaster.
    pub disaster_id: DisasterId,
}

/// What one subsystem did to a settlement.
#[derive(Debug)]
enum Effect {
    Construction(ConstructionReport),
    Resources(HarvestReport),
    Population(Box<PopulationChange>),
    Repairs(Vec<RepairProgress>),
    Disaster(DisasterTransition),
}

impl Effect {
    fn changed(&self) -> bool {
        match self {
            Self::Construction(report) => !report.is_empty(),
            Self::Resources(_) | Self::Population(_) => true,
            Self::Repairs(progress) => !progress.is_empty(),
            Self::Disaster(transition) => *transition != DisasterTransition::Unchanged,
        }
    }

    fn emit<B: Broadcaster>(&self, broadcaster: &B, record: &SettlementRecord, now: DateTime<Utc>) {
        let settlement_id = record.id();
        let room = Room::Settlement(settlement_id);
        let world = Room::World(record.world_id());
        match self {
            Self::Construction(report) => deliver(
                broadcaster,
                room,
                GatewayEvent::ConstructionUpdate,
                &ConstructionUpdate {
                    settlement_id,
                    report,
                    area: summarize(record),
                },
                now,
            ),
            Self::Resources(report) => deliver(
                broadcaster,
                room,
                GatewayEvent::ResourceUpdate,
                &ResourceUpdate {
                    settlement_id,
                    report,
                },
                now,
            ),
            Self::Population(change) => deliver(
                broadcaster,
                room,
                GatewayEvent::PopulationUpdate,
                &PopulationUpdate {
                    settlement_id,
                    change,
                },
                now,
            ),
            Self::Repairs(progress) => deliver(
                broadcaster,
                room,
                GatewayEvent::RepairUpdate,
                &RepairUpdate {
                    settlement_id,
                    progress,
                },
                now,
            ),
            Self::Disaster(DisasterTransition::Warned(event)) => {
                deliver(broadcaster, world, GatewayEvent::DisasterWarning, event, now);
            }
            Self::Disaster(DisasterTransition::Struck(event)) => {
                deliver(broadcaster, world, GatewayEvent::DisasterImpact, event, now);
            }
            Self::Disaster(DisasterTransition::Aftermath(event)) => {
                deliver(broadcaster, world, GatewayEvent::DisasterAftermath, event, now);
            }
            Self::Disaster(DisasterTransition::Expired(disaster_id)) => deliver(
                broadcaster,
                world,
                GatewayEvent::DisasterCleared,
                &DisasterCleared {
                    settlement_id,
                    disaster_id: *disaster_id,
                },
                now,
            ),
            Self::Disaster(DisasterTransition::Unchanged) => {}
        }
    }
}

/// Send one event, logging instead of failing when delivery breaks.
pub fn deliver<B: Broadcaster>(
    broadcaster: &B,
    room: Room,
    event: GatewayEvent,
    payload: &impl Serialize,
    now: DateTime<Utc>,
) {
    let sent = BroadcastMessage::new(room, event, payload, now)
        .and_then(|message| broadcaster.send(message));
    if let Err(e) = sent {
        warn!(event = %event, room = ?room, error = %e, "broadcast failed");
    }
}

/// Deterministic RNG for one settlement in one window.
pub fn settlement_rng(
    seed: u64,
    subsystem: Subsystem,
    window_id: i64,
    settlement_id: SettlementId,
) -> SmallRng {
    let (high, low) = settlement_id.into_inner().as_u64_pair();
    let window = u64::from_le_bytes(window_id.to_le_bytes());
    let salt = match subsystem {
        Subsystem::Construction => 0x0C0F_FEE0,
        Subsystem::Resources => 0x5EED_0001,
        Subsystem::Population => 0x5EED_0002,
        Subsystem::Repairs => 0x5EED_0003,
        Subsystem::Disasters => 0x5EED_0004,
    };
    SmallRng::seed_from_u64(seed ^ high ^ low.rotate_left(21) ^ window.rotate_left(42) ^ salt)
}

/// Apply one subsystem firing to one settlement.
///
/// Returns whether the settlement changed (and was committed).
///
/// # Errors
///
/// Returns [`ProcessError`] if the store or a rule fails; the settlement
/// is left untouched in that case.
pub async fn process_settlement<S: SettlementStore, B: Broadcaster>(
    store: &S,
    broadcaster: &B,
    ctx: &TickContext,
    subsystem: Subsystem,
    window_id: i64,
    now: DateTime<Utc>,
    settlement_id: SettlementId,
) -> Result<bool, ProcessError> {
    let mut txn = store.begin(settlement_id).await?;
    let mut rng = settlement_rng(ctx.seed, subsystem, window_id, settlement_id);
    let record = txn.record_mut();

    let effect = match subsystem {
        Subsystem::Construction => Effect::Construction(complete_due(record, now, &ctx.rules)),
        Subsystem::Resources => Effect::Resources(harvest(record, now, &ctx.rules)?),
        Subsystem::Population => Effect::Population(Box::new(advance_population(
            record,
            now,
            &mut rng,
            &ctx.rules,
            &ctx.population,
        )?)),
        Subsystem::Repairs => Effect::Repairs(repair_tick(record, &ctx.rules.repairs)),
        Subsystem::Disasters => Effect::Disaster(advance(record, now, &mut rng, &ctx.rules)?),
    };

    if !effect.changed() {
        return Ok(false);
    }
    let committed = txn.commit().await?;
    debug!(
        settlement_id = %settlement_id,
        subsystem = %subsystem,
        version = committed.version,
        "settlement updated"
    );
    effect.emit(broadcaster, &committed, now);
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use colony_db::InMemoryStore;
    use colony_types::{PlayerId, WorldId};
    use colony_world::Founding;
    use colony_world::settlement::found_settlement;

    use super::*;
    use crate::broadcast::RecordingBroadcaster;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn ctx() -> TickContext {
        TickContext {
            rules: WorldRules::default(),
            population: PopulationConfig::default(),
            seed: 42,
        }
    }

    async fn seeded(store: &InMemoryStore) -> SettlementId {
        let record = found_settlement(
            Founding {
                world_id: WorldId::new(),
                owner_id: PlayerId::new(),
                name: String::from("Brindle"),
                biome: String::from("plains"),
            },
            now(),
            &ctx().rules,
        );
        let id = record.id();
        store.insert(record).await.unwrap();
        id
    }

    #[tokio::test]
    async fn first_resource_tick_stamps_harvest_and_broadcasts() {
        let store = InMemoryStore::new();
        let recorder = RecordingBroadcaster::new();
        let id = seeded(&store).await;

        let changed = process_settlement(
            &store, &recorder, &ctx(), Subsystem::Resources, 0, now(), id,
        )
        .await
        .unwrap();
        assert!(changed);
        let record = store.get(id).await.unwrap();
        assert_eq!(record.settlement.last_harvest_at, Some(now()));
        assert_eq!(record.version, 1);
        assert_eq!(recorder.events(), vec![GatewayEvent::ResourceUpdate]);
    }

    #[tokio::test]
    async fn idle_repairs_tick_commits_nothing() {
        let store = InMemoryStore::new();
        let recorder = RecordingBroadcaster::new();
        let id = seeded(&store).await;

        let changed =
            process_settlement(&store, &recorder, &ctx(), Subsystem::Repairs, 0, now(), id)
                .await
                .unwrap();
        assert!(!changed);
        assert_eq!(store.get(id).await.unwrap().version, 0);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn broadcast_failure_does_not_fail_processing() {
        let store = InMemoryStore::new();
        let recorder = RecordingBroadcaster::new();
        recorder.set_failing(true);
        let id = seeded(&store).await;

        let changed = process_settlement(
            &store,
            &recorder,
            &ctx(),
            Subsystem::Population,
            0,
            now() + Duration::minutes(30),
            id,
        )
        .await
        .unwrap();
        assert!(changed);
        assert_eq!(store.get(id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn store_outage_is_reported_and_isolated() {
        let store = InMemoryStore::new();
        let recorder = RecordingBroadcaster::new();
        let id = seeded(&store).await;
        store.fail_next_begin(id).await;

        let result =
            process_settlement(&store, &recorder, &ctx(), Subsystem::Resources, 0, now(), id)
                .await;
        assert!(matches!(result, Err(ProcessError::Store(StoreError::Unavailable(_)))));
        assert_eq!(store.get(id).await.unwrap().version, 0);
    }

    #[test]
    fn rng_differs_per_window_and_subsystem() {
        use rand::Rng;

        let id = SettlementId::new();
        let a: u64 = settlement_rng(1, Subsystem::Disasters, 10, id).random();
        let b: u64 = settlement_rng(1, Subsystem::Disasters, 11, id).random();
        let c: u64 = settlement_rng(1, Subsystem::Population, 10, id).random();
        let again: u64 = settlement_rng(1, Subsystem::Disasters, 10, id).random();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, again);
    }
}
