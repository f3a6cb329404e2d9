//! Core entity structs for the settlement simulation.
//!
//! These are plain data records. Rules that mutate them live in
//! `colony-world` and `colony-population`; persistence lives behind the
//! store interface in `colony-db`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    DisasterKind, DisasterPhase, QueueStatus, ResourceType, StructureCategory, StructureType,
};
use crate::ids::{DisasterId, PlayerId, QueueItemId, SettlementId, StructureId, WorldId};

// ---------------------------------------------------------------------------
// Resource quantities
// ---------------------------------------------------------------------------

/// A whole-unit quantity for each of the five resources.
///
/// Used for build costs, refunds, storage bonuses and disaster losses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceAmounts {
    /// Food units.
    pub food: u32,
    /// Water units.
    pub water: u32,
    /// Wood units.
    pub wood: u32,
    /// Stone units.
    pub stone: u32,
    /// Ore units.
    pub ore: u32,
}

impl ResourceAmounts {
    /// All-zero amounts.
    pub const ZERO: Self = Self {
        food: 0,
        water: 0,
        wood: 0,
        stone: 0,
        ore: 0,
    };

    /// Quantity of a single resource.
    pub const fn get(&self, resource: ResourceType) -> u32 {
        match resource {
            ResourceType::Food => self.food,
            ResourceType::Water => self.water,
            ResourceType::Wood => self.wood,
            ResourceType::Stone => self.stone,
            ResourceType::Ore => self.ore,
        }
    }

    /// Mutable access to a single resource quantity.
    pub const fn get_mut(&mut self, resource: ResourceType) -> &mut u32 {
        match resource {
            ResourceType::Food => &mut self.food,
            ResourceType::Water => &mut self.water,
            ResourceType::Wood => &mut self.wood,
            ResourceType::Stone => &mut self.stone,
            ResourceType::Ore => &mut self.ore,
        }
    }

    /// Whether every quantity is zero.
    pub const fn is_zero(&self) -> bool {
        self.food == 0 && self.water == 0 && self.wood == 0 && self.stone == 0 && self.ore == 0
    }

    /// Iterate `(resource, quantity)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceType, u32)> + '_ {
        ResourceType::ALL.into_iter().map(|r| (r, self.get(r)))
    }
}

/// Amount and ceiling of one stored resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceStock {
    /// Current amount, always within `[0, capacity]`.
    pub amount: u32,
    /// Storage ceiling.
    pub capacity: u32,
}

/// The five stored resources of a settlement.
///
/// Owned exclusively by one settlement. Amounts are clamped to
/// `[0, capacity]` by every mutation in `colony-world::storage`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceStorage {
    /// Food stock.
    pub food: ResourceStock,
    /// Water stock.
    pub water: ResourceStock,
    /// Wood stock.
    pub wood: ResourceStock,
    /// Stone stock.
    pub stone: ResourceStock,
    /// Ore stock.
    pub ore: ResourceStock,
}

impl ResourceStorage {
    /// Stock of a single resource.
    pub const fn stock(&self, resource: ResourceType) -> &ResourceStock {
        match resource {
            ResourceType::Food => &self.food,
            ResourceType::Water => &self.water,
            ResourceType::Wood => &self.wood,
            ResourceType::Stone => &self.stone,
            ResourceType::Ore => &self.ore,
        }
    }

    /// Mutable stock of a single resource.
    pub const fn stock_mut(&mut self, resource: ResourceType) -> &mut ResourceStock {
        match resource {
            ResourceType::Food => &mut self.food,
            ResourceType::Water => &mut self.water,
            ResourceType::Wood => &mut self.wood,
            ResourceType::Stone => &mut self.stone,
            ResourceType::Ore => &mut self.ore,
        }
    }

    /// Current amounts of every resource.
    pub const fn amounts(&self) -> ResourceAmounts {
        ResourceAmounts {
            food: self.food.amount,
            water: self.water.amount,
            wood: self.wood.amount,
            stone: self.stone.amount,
            ore: self.ore.amount,
        }
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// Population state of a settlement.
///
/// Mutated only by the population dynamics engine, migration events and
/// disaster casualties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Population {
    /// Current number of residents.
    pub current: u32,
    /// Housing capacity derived from housing structures.
    pub capacity: u32,
    /// Happiness score, 0 to 100.
    #[ts(as = "String")]
    pub happiness: Decimal,
    /// When growth was last applied. `None` before the first population tick.
    pub last_growth_tick: Option<DateTime<Utc>>,
    /// Fractional growth carried between ticks (may be negative).
    #[ts(as = "String")]
    pub growth_progress: Decimal,
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

/// Settlement-wide effects a structure provides per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StructureEffects {
    /// Residents housed per level.
    pub housing_capacity: u32,
    /// Bonus to the housing-quality happiness factor.
    pub housing_quality: u32,
    /// Signed morale modifier.
    pub morale: i32,
    /// Residents sheltered from disasters per level.
    pub shelter_capacity: u32,
    /// Defense rating contributed per level.
    pub defense_rating: u32,
    /// Extra storage capacity per level.
    pub storage_bonus: ResourceAmounts,
    /// Whether this structure acts as a disaster warning system.
    pub warning_system: bool,
    /// Whether this structure provides medical care.
    pub medical: bool,
}

/// Immutable catalog entry describing a structure kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StructureDefinition {
    /// The kind this definition describes (catalog key).
    pub structure_type: StructureType,
    /// Building or extractor.
    pub category: StructureCategory,
    /// Display name.
    pub name: String,
    /// Area consumed (buildings only; zero-cost buildings skip the area check).
    pub area_cost: u32,
    /// Town Hall level required to build.
    pub min_town_hall_level: u32,
    /// At most one instance per settlement.
    pub unique: bool,
    /// Highest level reachable through upgrades.
    pub max_level: u32,
    /// Workers needed for full production (extractors).
    pub staffing_required: u32,
    /// Resources charged to build level 1.
    pub build_cost: ResourceAmounts,
    /// Build duration for level 1 in milliseconds.
    pub build_duration_ms: u64,
    /// Settlement-wide effects per level.
    pub effects: StructureEffects,
}

/// A structure standing in a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StructureInstance {
    /// Unique instance ID.
    pub id: StructureId,
    /// Owning settlement.
    pub settlement_id: SettlementId,
    /// Catalog key of the definition.
    pub structure_type: StructureType,
    /// Copied from the definition for cheap filtering.
    pub category: StructureCategory,
    /// Current level, at least 1.
    pub level: u32,
    /// Structural health, 0 to 100.
    pub health: u32,
    /// Whether a paid repair is waiting for the repairs tick.
    pub repair_pending: bool,
    /// When construction completed.
    pub built_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Construction queue
// ---------------------------------------------------------------------------

/// What a construction queue item will do on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ConstructionAction {
    /// Create a new level-1 instance.
    Build,
    /// Raise an existing instance to `target_level`.
    Upgrade {
        /// The instance being upgraded.
        structure_id: StructureId,
        /// Level after completion.
        target_level: u32,
    },
}

/// One entry of a settlement's construction queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConstructionQueueItem {
    /// Unique item ID.
    pub id: QueueItemId,
    /// Target settlement.
    pub settlement_id: SettlementId,
    /// Definition being built or upgraded.
    pub structure_type: StructureType,
    /// Build or upgrade.
    pub action: ConstructionAction,
    /// Lifecycle status.
    pub status: QueueStatus,
    /// When the request was accepted (FIFO key).
    pub enqueued_at: DateTime<Utc>,
    /// When the item was promoted to `ACTIVE`.
    pub started_at: Option<DateTime<Utc>>,
    /// Build duration once active.
    pub duration_ms: u64,
    /// Area reserved while the item is not complete.
    pub area_reserved: u32,
    /// Resources charged at enqueue, refunded on cancellation.
    pub cost_paid: ResourceAmounts,
}

// ---------------------------------------------------------------------------
// Disasters
// ---------------------------------------------------------------------------

/// Damage applied at the moment of impact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ImpactReport {
    /// Residents killed.
    pub casualties: u32,
    /// Structures damaged but still standing.
    pub structures_damaged: u32,
    /// Structures destroyed and removed.
    pub structures_destroyed: u32,
    /// Aggregate damage: health lost plus casualties.
    pub total_damage: u32,
}

/// Summary computed on entering the aftermath phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AftermathSummary {
    /// Residents killed.
    pub casualties: u32,
    /// Structures damaged but still standing.
    pub structures_damaged: u32,
    /// Structures destroyed and removed.
    pub structures_destroyed: u32,
    /// Aggregate damage the losses derive from.
    pub total_damage: u32,
    /// Resources lost from storage.
    pub resource_loss: ResourceAmounts,
    /// Happiness points lost.
    #[ts(as = "String")]
    pub happiness_loss: Decimal,
}

/// A disaster progressing through its lifecycle at one settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DisasterEvent {
    /// Unique event ID.
    pub id: DisasterId,
    /// World (broadcast room) the settlement belongs to.
    pub world_id: WorldId,
    /// Affected settlement.
    pub settlement_id: SettlementId,
    /// Disaster kind.
    pub kind: DisasterKind,
    /// Severity, 1 to 5.
    pub severity: u32,
    /// Current phase.
    pub phase: DisasterPhase,
    /// When the warning was raised.
    pub warned_at: DateTime<Utc>,
    /// When the disaster strikes.
    pub impact_at: DateTime<Utc>,
    /// Damage report, present from `IMPACT` on.
    pub impact: Option<ImpactReport>,
    /// When the aftermath began.
    pub aftermath_started_at: Option<DateTime<Utc>>,
    /// End of the emergency repair window.
    pub repair_window_ends_at: Option<DateTime<Utc>>,
    /// Loss summary, present from `AFTERMATH` on.
    pub aftermath_summary: Option<AftermathSummary>,
}

// ---------------------------------------------------------------------------
// Settlement aggregate
// ---------------------------------------------------------------------------

/// Settlement identity plus derived, cached fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Settlement {
    /// Unique settlement ID.
    pub id: SettlementId,
    /// World the settlement lives in.
    pub world_id: WorldId,
    /// Owning player.
    pub owner_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Biome name from world generation (drives production efficiency).
    pub biome: String,
    /// When the settlement was founded.
    pub founded_at: DateTime<Utc>,
    /// Last time production was harvested. `None` before first activation.
    pub last_harvest_at: Option<DateTime<Utc>>,
    /// Cached Town Hall level (0 when none is built).
    pub town_hall_level: u32,
    /// Cached area consumed by standing buildings.
    pub area_used: u32,
    /// Cached area capacity.
    pub area_capacity: u32,
    /// End of the emergency repair discount window, if one was opened.
    pub emergency_repair_until: Option<DateTime<Utc>>,
}

/// Everything persisted for one settlement, read and written atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SettlementRecord {
    /// Identity and cached derived fields.
    pub settlement: Settlement,
    /// Resource storage.
    pub storage: ResourceStorage,
    /// Population state.
    pub population: Population,
    /// Standing structures in build order.
    pub structures: Vec<StructureInstance>,
    /// Construction queue in FIFO order.
    pub queue: Vec<ConstructionQueueItem>,
    /// Current disaster, if any.
    pub disaster: Option<DisasterEvent>,
    /// Optimistic concurrency version, bumped on every committed write.
    pub version: u64,
}

impl SettlementRecord {
    /// Settlement ID shortcut.
    pub const fn id(&self) -> SettlementId {
        self.settlement.id
    }

    /// World ID shortcut.
    pub const fn world_id(&self) -> WorldId {
        self.settlement.world_id
    }

    /// Look up a standing structure by ID.
    pub fn structure(&self, id: StructureId) -> Option<&StructureInstance> {
        self.structures.iter().find(|s| s.id == id)
    }

    /// Look up a standing structure by ID, mutably.
    pub fn structure_mut(&mut self, id: StructureId) -> Option<&mut StructureInstance> {
        self.structures.iter_mut().find(|s| s.id == id)
    }

    /// Current disaster phase (`DORMANT` when no event exists).
    pub fn disaster_phase(&self) -> DisasterPhase {
        self.disaster
            .as_ref()
            .map_or(DisasterPhase::Dormant, |d| d.phase)
    }
}
