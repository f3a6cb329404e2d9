//! Build and upgrade validation pipeline.
//!
//! A build request runs these stages in order; the first failure wins and
//! later stages are never evaluated:
//! 1. Town Hall gate -- is the Town Hall level high enough?
//! 2. Uniqueness -- does a unique definition already stand or sit in the queue?
//! 3. Area -- for `BUILDING`s with nonzero area cost, does the remaining
//!    area (after reservations by unfinished queue items) cover the cost?
//! 4. Resources -- can storage pay the build cost?
//!
//! An upgrade request checks that the structure exists, the Town Hall gate,
//! the definition's maximum level, that no upgrade of the same structure is
//! already queued, and finally the resources.
//!
//! Rejections are expected outcomes returned to the requester. They carry
//! the required and available figures and a stable machine code.

use serde::Serialize;

use colony_types::{
    ConstructionAction, QueueItemId, QueueStatus, ResourceAmounts, ResourceType,
    SettlementRecord, StructureCategory, StructureDefinition, StructureId, StructureType,
};

use crate::area::reserved_area;
use crate::catalog::{cost_for_level, definition, duration_for_level};
use crate::error::WorldError;
use crate::storage::first_shortfall;

/// The structure blocking a unique build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum UniqueConflict {
    /// A standing instance.
    Standing(StructureId),
    /// An unfinished queue item.
    Queued(QueueItemId),
}

/// Why a build, upgrade or repair request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildRejection {
    /// The Town Hall level is below the definition's minimum.
    #[error("town hall level {current} is below the required {required}")]
    TownHallLevelTooLow {
        /// Minimum Town Hall level.
        required: u32,
        /// Current Town Hall level (0 when none stands).
        current: u32,
    },

    /// A unique definition already stands or is queued.
    #[error("{structure_type} is unique and already present")]
    UniqueConstraintViolated {
        /// The unique definition.
        structure_type: StructureType,
        /// The conflicting structure or queue item.
        conflict: UniqueConflict,
    },

    /// Not enough free area for the building.
    #[error("insufficient area: {required} required, {available} available")]
    InsufficientArea {
        /// Area cost of the building.
        required: u32,
        /// Area left after standing buildings and reservations.
        available: u32,
    },

    /// Storage cannot pay the cost.
    #[error("insufficient {resource}: {required} required, {available} available")]
    InsufficientResources {
        /// First short resource in storage order.
        resource: ResourceType,
        /// Amount required.
        required: u32,
        /// Amount in storage.
        available: u32,
    },

    /// The referenced structure does not exist.
    #[error("structure not found: {structure_id}")]
    StructureNotFound {
        /// The missing structure.
        structure_id: StructureId,
    },

    /// The structure is already at its definition's maximum level.
    #[error("structure {structure_id} is already at max level {max_level}")]
    MaxLevelReached {
        /// The structure.
        structure_id: StructureId,
        /// Maximum level of its definition.
        max_level: u32,
    },

    /// An upgrade of the same structure is already queued.
    #[error("an upgrade of structure {structure_id} is already queued")]
    UpgradeAlreadyQueued {
        /// The structure.
        structure_id: StructureId,
    },

    /// The structure is at full health.
    #[error("structure {structure_id} is not damaged")]
    StructureNotDamaged {
        /// The structure.
        structure_id: StructureId,
    },

    /// A paid repair is already in progress.
    #[error("structure {structure_id} already has a repair pending")]
    RepairAlreadyPending {
        /// The structure.
        structure_id: StructureId,
    },
}

impl BuildRejection {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TownHallLevelTooLow { .. } => "TOWN_HALL_LEVEL_TOO_LOW",
            Self::UniqueConstraintViolated { .. } => "UNIQUE_CONSTRAINT_VIOLATED",
            Self::InsufficientArea { .. } => "INSUFFICIENT_AREA",
            Self::InsufficientResources { .. } => "INSUFFICIENT_RESOURCES",
            Self::StructureNotFound { .. } => "STRUCTURE_NOT_FOUND",
            Self::MaxLevelReached { .. } => "MAX_LEVEL_REACHED",
            Self::UpgradeAlreadyQueued { .. } => "UPGRADE_ALREADY_QUEUED",
            Self::StructureNotDamaged { .. } => "STRUCTURE_NOT_DAMAGED",
            Self::RepairAlreadyPending { .. } => "REPAIR_ALREADY_PENDING",
        }
    }
}

/// A validated request, ready to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Definition being built or upgraded.
    pub structure_type: StructureType,
    /// Build or upgrade.
    pub action: ConstructionAction,
    /// Resources to charge.
    pub cost: ResourceAmounts,
    /// Build duration once active.
    pub duration_ms: u64,
    /// Area to reserve while unfinished.
    pub area: u32,
}

/// Outcome of a validation pass: a plan, or a rejection.
///
/// The outer `Result` carries internal failures (arithmetic overflow while
/// scaling costs), which are not player-facing.
pub type Validation<T> = Result<Result<T, BuildRejection>, WorldError>;

/// Validate a request to build a new structure.
pub fn validate_build(
    record: &SettlementRecord,
    structure_type: StructureType,
) -> Validation<BuildPlan> {
    let def = definition(structure_type);
    let cost = cost_for_level(&def, 1)?;
    let duration_ms = duration_for_level(&def, 1)?;

    let verdict = check_town_hall(record, &def)
        .and_then(|()| check_unique(record, &def))
        .and_then(|()| check_area(record, &def))
        .and_then(|()| check_resources(record, &cost));

    Ok(verdict.map(|()| BuildPlan {
        structure_type,
        action: ConstructionAction::Build,
        cost,
        duration_ms,
        area: area_reservation(&def),
    }))
}

/// Validate a request to upgrade a standing structure by one level.
pub fn validate_upgrade(
    record: &SettlementRecord,
    structure_id: StructureId,
) -> Validation<BuildPlan> {
    let Some(structure) = record.structure(structure_id) else {
        return Ok(Err(BuildRejection::StructureNotFound { structure_id }));
    };
    let def = definition(structure.structure_type);
    let target_level = structure.level.saturating_add(1);

    if let Err(rejection) = check_town_hall(record, &def) {
        return Ok(Err(rejection));
    }
    if structure.level >= def.max_level {
        return Ok(Err(BuildRejection::MaxLevelReached {
            structure_id,
            max_level: def.max_level,
        }));
    }
    let already_queued = record.queue.iter().any(|item| {
        item.status != QueueStatus::Complete
            && matches!(
                item.action,
                ConstructionAction::Upgrade { structure_id: queued, .. } if queued == structure_id
            )
    });
    if already_queued {
        return Ok(Err(BuildRejection::UpgradeAlreadyQueued { structure_id }));
    }

    let cost = cost_for_level(&def, target_level)?;
    let duration_ms = duration_for_level(&def, target_level)?;
    Ok(check_resources(record, &cost).map(|()| BuildPlan {
        structure_type: structure.structure_type,
        action: ConstructionAction::Upgrade {
            structure_id,
            target_level,
        },
        cost,
        duration_ms,
        area: 0,
    }))
}

/// Stage 1: Town Hall gate.
fn check_town_hall(
    record: &SettlementRecord,
    def: &StructureDefinition,
) -> Result<(), BuildRejection> {
    let current = record.settlement.town_hall_level;
    if current < def.min_town_hall_level {
        return Err(BuildRejection::TownHallLevelTooLow {
            required: def.min_town_hall_level,
            current,
        });
    }
    Ok(())
}

/// Stage 2: uniqueness, counting unfinished queue items.
fn check_unique(record: &SettlementRecord, def: &StructureDefinition) -> Result<(), BuildRejection> {
    if !def.unique {
        return Ok(());
    }
    let standing = record
        .structures
        .iter()
        .find(|s| s.structure_type == def.structure_type)
        .map(|s| UniqueConflict::Standing(s.id));
    let queued = || {
        record
            .queue
            .iter()
            .find(|item| {
                item.status != QueueStatus::Complete
                    && item.structure_type == def.structure_type
                    && item.action == ConstructionAction::Build
            })
            .map(|item| UniqueConflict::Queued(item.id))
    };
    match standing.or_else(queued) {
        Some(conflict) => Err(BuildRejection::UniqueConstraintViolated {
            structure_type: def.structure_type,
            conflict,
        }),
        None => Ok(()),
    }
}

/// Stage 3: area, for area-consuming buildings only.
fn check_area(record: &SettlementRecord, def: &StructureDefinition) -> Result<(), BuildRejection> {
    let required = area_reservation(def);
    if required == 0 {
        return Ok(());
    }
    let available = record
        .settlement
        .area_capacity
        .saturating_sub(record.settlement.area_used)
        .saturating_sub(reserved_area(&record.queue));
    if available < required {
        return Err(BuildRejection::InsufficientArea {
            required,
            available,
        });
    }
    Ok(())
}

/// Stage 4: resources.
fn check_resources(
    record: &SettlementRecord,
    cost: &ResourceAmounts,
) -> Result<(), BuildRejection> {
    match first_shortfall(&record.storage, cost) {
        Some(shortfall) => Err(BuildRejection::InsufficientResources {
            resource: shortfall.resource,
            required: shortfall.required,
            available: shortfall.available,
        }),
        None => Ok(()),
    }
}

/// Area a new build reserves: the area cost for buildings, zero otherwise.
fn area_reservation(def: &StructureDefinition) -> u32 {
    match def.category {
        StructureCategory::Building => def.area_cost,
        StructureCategory::Extractor => 0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use colony_types::{ConstructionQueueItem, PlayerId, WorldId};

    use super::*;
    use crate::rules::WorldRules;
    use crate::settlement::{Founding, found_settlement, new_instance, recompute_derived};

    fn settlement(with_town_hall: bool) -> (SettlementRecord, WorldRules) {
        let mut rules = WorldRules::default();
        rules.settlement.grant_town_hall = with_town_hall;
        rules.settlement.starting_resources = ResourceAmounts {
            food: 1000,
            water: 1000,
            wood: 1000,
            stone: 1000,
            ore: 1000,
        };
        let record = found_settlement(
            Founding {
                world_id: WorldId::new(),
                owner_id: PlayerId::new(),
                name: String::from("Test"),
                biome: String::from("plains"),
            },
            Utc::now(),
            &rules,
        );
        (record, rules)
    }

    fn build(
        record: &SettlementRecord,
        structure_type: StructureType,
    ) -> Result<BuildPlan, BuildRejection> {
        validate_build(record, structure_type).unwrap()
    }

    fn add_houses(record: &mut SettlementRecord, rules: &WorldRules, houses: usize) {
        for _ in 0..houses {
            record
                .structures
                .push(new_instance(record.id(), StructureType::House, Utc::now()));
        }
        recompute_derived(record, rules);
    }

    #[test]
    fn town_hall_gate_preempts_area() {
        // No Town Hall: capacity 500, completely filled. A Manor needs Town
        // Hall 3 and 120 area, so both checks fail; the gate is reported.
        let (mut record, rules) = settlement(false);
        add_houses(&mut record, &rules, 10);
        assert_eq!(record.settlement.area_used, 500);
        assert_eq!(record.settlement.area_capacity, 500);

        assert_eq!(
            build(&record, StructureType::Manor),
            Err(BuildRejection::TownHallLevelTooLow {
                required: 3,
                current: 0,
            })
        );
    }

    #[test]
    fn unique_structure_cannot_be_built_twice() {
        let (record, _) = settlement(true);
        let result = build(&record, StructureType::TownHall);
        assert_eq!(result.map_err(|r| r.code()), Err("UNIQUE_CONSTRAINT_VIOLATED"));
    }

    #[test]
    fn queued_unique_structure_counts() {
        let (mut record, _) = settlement(true);
        let plan = build(&record, StructureType::Watchtower).unwrap();
        let item_id = QueueItemId::new();
        record.queue.push(queued(&record, item_id, &plan));
        assert_eq!(
            build(&record, StructureType::Watchtower),
            Err(BuildRejection::UniqueConstraintViolated {
                structure_type: StructureType::Watchtower,
                conflict: UniqueConflict::Queued(item_id),
            })
        );
    }

    fn queued(record: &SettlementRecord, id: QueueItemId, plan: &BuildPlan) -> ConstructionQueueItem {
        ConstructionQueueItem {
            id,
            settlement_id: record.id(),
            structure_type: plan.structure_type,
            action: plan.action,
            status: QueueStatus::Queued,
            enqueued_at: Utc::now(),
            started_at: None,
            duration_ms: plan.duration_ms,
            area_reserved: plan.area,
            cost_paid: plan.cost,
        }
    }

    #[test]
    fn area_check_counts_reservations() {
        // Town Hall 1: capacity 600, used 100. Eight houses use 400 more,
        // leaving exactly 100.
        let (mut record, rules) = settlement(true);
        add_houses(&mut record, &rules, 8);
        assert!(build(&record, StructureType::House).is_ok());

        // A queued Tavern reserves 70, leaving 30: a house no longer fits.
        let plan = build(&record, StructureType::Tavern).unwrap();
        record.queue.push(queued(&record, QueueItemId::new(), &plan));
        assert_eq!(
            build(&record, StructureType::House),
            Err(BuildRejection::InsufficientArea {
                required: 50,
                available: 30,
            })
        );
    }

    #[test]
    fn extractors_and_zero_area_buildings_bypass_area() {
        // Town Hall 2: capacity 700, filled by the hall and twelve houses.
        let (mut record, rules) = settlement(true);
        if let Some(hall) = record.structures.first_mut() {
            hall.level = 2;
        }
        add_houses(&mut record, &rules, 12);
        assert_eq!(record.settlement.area_used, 700);
        assert_eq!(record.settlement.area_capacity, 700);

        assert!(build(&record, StructureType::Farm).is_ok());
        assert!(build(&record, StructureType::Wall).is_ok());
        assert_eq!(
            build(&record, StructureType::House).map_err(|r| r.code()),
            Err("INSUFFICIENT_AREA")
        );
    }

    #[test]
    fn resources_checked_last() {
        let (mut record, _) = settlement(true);
        record.storage.wood.amount = 5;
        assert_eq!(
            build(&record, StructureType::House),
            Err(BuildRejection::InsufficientResources {
                resource: ResourceType::Wood,
                required: 30,
                available: 5,
            })
        );
    }

    #[test]
    fn upgrade_rules() {
        let (mut record, _) = settlement(true);
        let farm = new_instance(record.id(), StructureType::Farm, Utc::now());
        let farm_id = farm.id;
        record.structures.push(farm);

        let plan = validate_upgrade(&record, farm_id).unwrap().unwrap();
        assert_eq!(
            plan.action,
            ConstructionAction::Upgrade {
                structure_id: farm_id,
                target_level: 2,
            }
        );
        assert_eq!(plan.cost.wood, 30);
        assert_eq!(plan.area, 0);

        let missing = StructureId::new();
        assert_eq!(
            validate_upgrade(&record, missing).unwrap(),
            Err(BuildRejection::StructureNotFound {
                structure_id: missing
            })
        );

        record.queue.push(queued(&record, QueueItemId::new(), &plan));
        assert_eq!(
            validate_upgrade(&record, farm_id).unwrap(),
            Err(BuildRejection::UpgradeAlreadyQueued {
                structure_id: farm_id
            })
        );

        record.queue.clear();
        record.structure_mut(farm_id).unwrap().level = 5;
        assert_eq!(
            validate_upgrade(&record, farm_id).unwrap(),
            Err(BuildRejection::MaxLevelReached {
                structure_id: farm_id,
                max_level: 5,
            })
        );
    }

    #[test]
    fn rejection_serializes_with_code() {
        let rejection = BuildRejection::InsufficientArea {
            required: 50,
            available: 10,
        };
        let json = serde_json::to_value(&rejection).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "INSUFFICIENT_AREA",
                "required": 50,
                "available": 10,
            })
        );
    }
}
