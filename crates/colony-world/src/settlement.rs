//! Settlement founding and derived-field recomputation.
//!
//! `town_hall_level`, `area_used`, `area_capacity`, population capacity and
//! storage capacities are cached on the record. [`recompute_derived`] is the
//! only writer of those fields and must run inside the same transaction as
//! any structure change, so readers never observe a stale `area_used`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use colony_types::{
    PlayerId, Population, QueueStatus, ResourceAmounts, ResourceType, Settlement, SettlementId,
    SettlementRecord, StructureCategory, StructureId, StructureInstance, StructureType, WorldId,
};

use crate::area::{area_capacity, area_used};
use crate::catalog::definition;
use crate::rules::WorldRules;
use crate::storage::{initial_storage, recompute_capacities};

/// Founding defaults and base capacities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Housing available with no housing structures.
    #[serde(default = "default_base_housing")]
    pub base_housing: u32,
    /// Storage ceiling per resource with no storage structures.
    #[serde(default = "default_base_storage_capacity")]
    pub base_storage_capacity: u32,
    /// Residents at founding.
    #[serde(default = "default_starting_population")]
    pub starting_population: u32,
    /// Happiness at founding.
    #[serde(default = "default_starting_happiness")]
    pub starting_happiness: Decimal,
    /// Opening stock.
    #[serde(default = "default_starting_resources")]
    pub starting_resources: ResourceAmounts,
    /// Whether a level-1 Town Hall stands at founding.
    #[serde(default = "default_grant_town_hall")]
    pub grant_town_hall: bool,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            base_housing: default_base_housing(),
            base_storage_capacity: default_base_storage_capacity(),
            starting_population: default_starting_population(),
            starting_happiness: default_starting_happiness(),
            starting_resources: default_starting_resources(),
            grant_town_hall: default_grant_town_hall(),
        }
    }
}

const fn default_base_housing() -> u32 {
    10
}

const fn default_base_storage_capacity() -> u32 {
    1000
}

const fn default_starting_population() -> u32 {
    8
}

fn default_starting_happiness() -> Decimal {
    Decimal::from(60)
}

const fn default_starting_resources() -> ResourceAmounts {
    ResourceAmounts {
        food: 300,
        water: 300,
        wood: 250,
        stone: 200,
        ore: 50,
    }
}

const fn default_grant_town_hall() -> bool {
    true
}

/// Who founds a settlement, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Founding {
    /// World the settlement joins.
    pub world_id: WorldId,
    /// Owning player.
    pub owner_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Biome of the founding tile.
    pub biome: String,
}

/// Create a settlement together with its storage and population.
pub fn found_settlement(
    founding: Founding,
    now: DateTime<Utc>,
    rules: &WorldRules,
) -> SettlementRecord {
    let id = SettlementId::new();
    let config = &rules.settlement;

    let mut structures = Vec::new();
    if config.grant_town_hall {
        structures.push(new_instance(id, StructureType::TownHall, now));
    }

    let mut record = SettlementRecord {
        settlement: Settlement {
            id,
            world_id: founding.world_id,
            owner_id: founding.owner_id,
            name: founding.name,
            biome: founding.biome,
            founded_at: now,
            last_harvest_at: None,
            town_hall_level: 0,
            area_used: 0,
            area_capacity: 0,
            emergency_repair_until: None,
        },
        storage: initial_storage(config.base_storage_capacity, &config.starting_resources),
        population: Population {
            current: config.starting_population,
            capacity: 0,
            happiness: config.starting_happiness,
            last_growth_tick: None,
            growth_progress: Decimal::ZERO,
        },
        structures,
        queue: Vec::new(),
        disaster: None,
        version: 0,
    };
    recompute_derived(&mut record, rules);
    record
}

/// A fresh level-1 instance at full health.
pub fn new_instance(
    settlement_id: SettlementId,
    structure_type: StructureType,
    now: DateTime<Utc>,
) -> StructureInstance {
    StructureInstance {
        id: StructureId::new(),
        settlement_id,
        structure_type,
        category: definition(structure_type).category,
        level: 1,
        health: 100,
        repair_pending: false,
        built_at: now,
    }
}

/// Town Hall level, or 0 when none stands.
pub fn town_hall_level(structures: &[StructureInstance]) -> u32 {
    structures
        .iter()
        .filter(|s| s.structure_type == StructureType::TownHall)
        .map(|s| s.level)
        .max()
        .unwrap_or(0)
}

/// Housing capacity: base plus housing per level of every structure.
pub fn housing_capacity(structures: &[StructureInstance], base: u32) -> u32 {
    structures.iter().fold(base, |total, s| {
        let housing = definition(s.structure_type).effects.housing_capacity;
        total.saturating_add(housing.saturating_mul(s.level))
    })
}

/// Recompute every cached field from the standing structures.
pub fn recompute_derived(record: &mut SettlementRecord, rules: &WorldRules) {
    let level = town_hall_level(&record.structures);
    record.settlement.town_hall_level = level;
    record.settlement.area_used = area_used(&record.structures);
    record.settlement.area_capacity = area_capacity(level, &rules.area);
    record.population.capacity =
        housing_capacity(&record.structures, rules.settlement.base_housing);
    recompute_capacities(
        &mut record.storage,
        &record.structures,
        rules.settlement.base_storage_capacity,
    );
}

/// A violated settlement invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditFinding {
    /// A cached field disagrees with the value derived from structures.
    StaleDerivedField(&'static str),
    /// Standing buildings use more area than the settlement has.
    AreaOverCapacity {
        /// Area in use.
        used: u32,
        /// Area capacity.
        capacity: u32,
    },
    /// More than one instance of a unique definition stands.
    DuplicateUnique(StructureType),
    /// More queue items are active than there are slots.
    TooManyActive(usize),
    /// A structure's health or level is out of range.
    StructureOutOfRange(StructureId),
    /// A resource amount exceeds its capacity.
    StorageOverCapacity,
}

/// Check every invariant of a settlement record.
///
/// Returns an empty list for a consistent record.
pub fn audit(record: &SettlementRecord, rules: &WorldRules) -> Vec<AuditFinding> {
    let mut findings = Vec::new();
    let settlement = &record.settlement;

    let level = town_hall_level(&record.structures);
    if settlement.town_hall_level != level {
        findings.push(AuditFinding::StaleDerivedField("town_hall_level"));
    }
    if settlement.area_used != area_used(&record.structures) {
        findings.push(AuditFinding::StaleDerivedField("area_used"));
    }
    if settlement.area_capacity != area_capacity(level, &rules.area) {
        findings.push(AuditFinding::StaleDerivedField("area_capacity"));
    }
    if settlement.area_used > settlement.area_capacity {
        findings.push(AuditFinding::AreaOverCapacity {
            used: settlement.area_used,
            capacity: settlement.area_capacity,
        });
    }

    for structure_type in StructureType::ALL {
        if !definition(structure_type).unique {
            continue;
        }
        let count = record
            .structures
            .iter()
            .filter(|s| s.structure_type == structure_type)
            .count();
        if count > 1 {
            findings.push(AuditFinding::DuplicateUnique(structure_type));
        }
    }

    let active = record
        .queue
        .iter()
        .filter(|item| item.status == QueueStatus::Active)
        .count();
    if active > rules.construction.active_slots {
        findings.push(AuditFinding::TooManyActive(active));
    }

    for structure in &record.structures {
        let max_level = definition(structure.structure_type).max_level;
        let category = definition(structure.structure_type).category;
        if structure.health > 100
            || structure.level == 0
            || structure.level > max_level
            || structure.category != category
        {
            findings.push(AuditFinding::StructureOutOfRange(structure.id));
        }
    }

    if ResourceType::ALL.into_iter().any(|r| {
        let stock = record.storage.stock(r);
        stock.amount > stock.capacity
    }) {
        findings.push(AuditFinding::StorageOverCapacity);
    }

    findings
}

/// Extractors standing in the settlement, in build order.
pub fn extractors(record: &SettlementRecord) -> impl Iterator<Item = &StructureInstance> {
    record
        .structures
        .iter()
        .filter(|s| s.category == StructureCategory::Extractor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn founding() -> Founding {
        Founding {
            world_id: WorldId::new(),
            owner_id: PlayerId::new(),
            name: String::from("Emberfall"),
            biome: String::from("plains"),
        }
    }

    #[test]
    fn founding_grants_a_town_hall_and_consistent_fields() {
        let rules = WorldRules::default();
        let record = found_settlement(founding(), Utc::now(), &rules);

        assert_eq!(record.settlement.town_hall_level, 1);
        assert_eq!(record.settlement.area_capacity, 600);
        assert_eq!(record.settlement.area_used, 100);
        assert_eq!(record.population.capacity, 10);
        assert_eq!(record.population.current, 8);
        assert_eq!(record.storage.food.amount, 300);
        assert!(record.settlement.last_harvest_at.is_none());
        assert!(audit(&record, &rules).is_empty());
    }

    #[test]
    fn founding_without_town_hall_has_base_area() {
        let mut rules = WorldRules::default();
        rules.settlement.grant_town_hall = false;
        let record = found_settlement(founding(), Utc::now(), &rules);
        assert_eq!(record.settlement.town_hall_level, 0);
        assert_eq!(record.settlement.area_capacity, 500);
        assert_eq!(record.settlement.area_used, 0);
    }

    #[test]
    fn houses_add_housing_per_level() {
        let rules = WorldRules::default();
        let mut record = found_settlement(founding(), Utc::now(), &rules);
        let mut house = new_instance(record.id(), StructureType::House, Utc::now());
        house.level = 2;
        record.structures.push(house);
        recompute_derived(&mut record, &rules);
        assert_eq!(record.population.capacity, 26);
        assert_eq!(record.settlement.area_used, 150);
    }

    #[test]
    fn audit_flags_stale_area() {
        let rules = WorldRules::default();
        let mut record = found_settlement(founding(), Utc::now(), &rules);
        record
            .structures
            .push(new_instance(record.id(), StructureType::House, Utc::now()));
        let findings = audit(&record, &rules);
        assert!(findings.contains(&AuditFinding::StaleDerivedField("area_used")));
    }
}
