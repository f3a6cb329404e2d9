//! Structure catalog: the immutable master definitions.
//!
//! - [`definition`] returns the static [`StructureDefinition`] for each
//!   [`StructureType`]
//! - [`cost_for_level`] and [`duration_for_level`] scale the level-1 cost and
//!   build time by the geometric level multiplier, so reaching level `n`
//!   costs `1.5^(n-1)` times the original build

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use colony_types::{
    ResourceAmounts, ResourceType, StructureCategory, StructureDefinition, StructureEffects,
    StructureType,
};

use crate::error::WorldError;
use crate::production::level_multiplier;

/// Return the catalog definition for a given [`StructureType`].
#[allow(clippy::too_many_lines)] // One literal per structure kind reads better than a builder.
pub fn definition(structure_type: StructureType) -> StructureDefinition {
    match structure_type {
        // ---- Civic ----
        StructureType::TownHall => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Town Hall"),
            area_cost: 100,
            min_town_hall_level: 0,
            unique: true,
            max_level: 10,
            staffing_required: 0,
            build_cost: amounts(0, 0, 100, 100, 0),
            build_duration_ms: 600_000,
            effects: StructureEffects {
                morale: 5,
                shelter_capacity: 10,
                defense_rating: 10,
                ..StructureEffects::default()
            },
        },

        // ---- Housing ----
        StructureType::House => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("House"),
            area_cost: 50,
            min_town_hall_level: 1,
            unique: false,
            max_level: 5,
            staffing_required: 0,
            build_cost: amounts(0, 0, 30, 10, 0),
            build_duration_ms: 120_000,
            effects: StructureEffects {
                housing_capacity: 8,
                ..StructureEffects::default()
            },
        },
        StructureType::Manor => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Manor"),
            area_cost: 120,
            min_town_hall_level: 3,
            unique: false,
            max_level: 3,
            staffing_required: 0,
            build_cost: amounts(0, 0, 80, 60, 10),
            build_duration_ms: 480_000,
            effects: StructureEffects {
                housing_capacity: 12,
                housing_quality: 15,
                morale: 3,
                ..StructureEffects::default()
            },
        },

        // ---- Safety ----
        StructureType::Shelter => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Shelter"),
            area_cost: 60,
            min_town_hall_level: 1,
            unique: false,
            max_level: 3,
            staffing_required: 0,
            build_cost: amounts(0, 0, 20, 40, 0),
            build_duration_ms: 180_000,
            effects: StructureEffects {
                shelter_capacity: 25,
                ..StructureEffects::default()
            },
        },
        StructureType::Hospital => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Hospital"),
            area_cost: 100,
            min_town_hall_level: 2,
            unique: true,
            max_level: 3,
            staffing_required: 0,
            build_cost: amounts(20, 20, 60, 60, 10),
            build_duration_ms: 600_000,
            effects: StructureEffects {
                morale: 2,
                medical: true,
                ..StructureEffects::default()
            },
        },
        StructureType::Watchtower => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Watchtower"),
            area_cost: 30,
            min_town_hall_level: 1,
            unique: true,
            max_level: 3,
            staffing_required: 0,
            build_cost: amounts(0, 0, 40, 20, 0),
            build_duration_ms: 240_000,
            effects: StructureEffects {
                defense_rating: 10,
                warning_system: true,
                ..StructureEffects::default()
            },
        },
        StructureType::Barracks => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Barracks"),
            area_cost: 100,
            min_town_hall_level: 2,
            unique: false,
            max_level: 5,
            staffing_required: 0,
            build_cost: amounts(30, 0, 60, 40, 20),
            build_duration_ms: 420_000,
            effects: StructureEffects {
                housing_capacity: 4,
                defense_rating: 30,
                ..StructureEffects::default()
            },
        },
        // Walls are laid along the perimeter and take no interior area.
        StructureType::Wall => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Wall"),
            area_cost: 0,
            min_town_hall_level: 2,
            unique: false,
            max_level: 5,
            staffing_required: 0,
            build_cost: amounts(0, 0, 10, 50, 0),
            build_duration_ms: 300_000,
            effects: StructureEffects {
                defense_rating: 20,
                ..StructureEffects::default()
            },
        },

        // ---- Morale ----
        StructureType::Tavern => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Tavern"),
            area_cost: 70,
            min_town_hall_level: 1,
            unique: true,
            max_level: 3,
            staffing_required: 0,
            build_cost: amounts(20, 10, 50, 20, 0),
            build_duration_ms: 240_000,
            effects: StructureEffects {
                morale: 10,
                ..StructureEffects::default()
            },
        },
        StructureType::Temple => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Temple"),
            area_cost: 90,
            min_town_hall_level: 2,
            unique: true,
            max_level: 3,
            staffing_required: 0,
            build_cost: amounts(0, 0, 40, 80, 10),
            build_duration_ms: 540_000,
            effects: StructureEffects {
                morale: 15,
                ..StructureEffects::default()
            },
        },

        // ---- Storage ----
        StructureType::Granary => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Granary"),
            area_cost: 60,
            min_town_hall_level: 1,
            unique: false,
            max_level: 5,
            staffing_required: 0,
            build_cost: amounts(0, 0, 40, 20, 0),
            build_duration_ms: 180_000,
            effects: StructureEffects {
                storage_bonus: amounts(500, 0, 0, 0, 0),
                ..StructureEffects::default()
            },
        },
        StructureType::Cistern => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Cistern"),
            area_cost: 50,
            min_town_hall_level: 1,
            unique: false,
            max_level: 5,
            staffing_required: 0,
            build_cost: amounts(0, 0, 10, 40, 0),
            build_duration_ms: 180_000,
            effects: StructureEffects {
                storage_bonus: amounts(0, 500, 0, 0, 0),
                ..StructureEffects::default()
            },
        },
        StructureType::Warehouse => StructureDefinition {
            structure_type,
            category: StructureCategory::Building,
            name: String::from("Warehouse"),
            area_cost: 80,
            min_town_hall_level: 1,
            unique: false,
            max_level: 5,
            staffing_required: 0,
            build_cost: amounts(0, 0, 50, 30, 0),
            build_duration_ms: 240_000,
            effects: StructureEffects {
                storage_bonus: amounts(0, 0, 400, 400, 400),
                ..StructureEffects::default()
            },
        },

        // ---- Extractors ----
        StructureType::Farm => extractor(structure_type, "Farm", 0, 5, amounts(0, 0, 20, 0, 0), 60_000),
        StructureType::FishingDock => {
            extractor(structure_type, "Fishing Dock", 1, 4, amounts(0, 0, 30, 5, 0), 90_000)
        }
        StructureType::Well => extractor(structure_type, "Well", 0, 2, amounts(0, 0, 0, 15, 0), 60_000),
        StructureType::LumberMill => {
            extractor(structure_type, "Lumber Mill", 0, 4, amounts(0, 0, 10, 10, 0), 90_000)
        }
        StructureType::Quarry => {
            extractor(structure_type, "Quarry", 1, 5, amounts(0, 0, 25, 0, 0), 120_000)
        }
        StructureType::Mine => {
            extractor(structure_type, "Mine", 2, 6, amounts(10, 0, 40, 20, 0), 240_000)
        }
    }
}

/// Every catalog definition, buildings first.
pub fn all_definitions() -> Vec<StructureDefinition> {
    StructureType::ALL.into_iter().map(definition).collect()
}

/// Resources needed to reach `level` (1 for a fresh build).
///
/// Each component is `ceil(base × 1.5^(level-1))`.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if the scaled cost does not
/// fit in a `u32`.
pub fn cost_for_level(
    definition: &StructureDefinition,
    level: u32,
) -> Result<ResourceAmounts, WorldError> {
    let multiplier = level_multiplier(level);
    let mut cost = ResourceAmounts::ZERO;
    for (resource, base) in definition.build_cost.iter() {
        *cost.get_mut(resource) = scale_up(base, multiplier)?;
    }
    Ok(cost)
}

/// Build duration in milliseconds for reaching `level`.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if the scaled duration does
/// not fit in a `u64`.
pub fn duration_for_level(definition: &StructureDefinition, level: u32) -> Result<u64, WorldError> {
    Decimal::from(definition.build_duration_ms)
        .checked_mul(level_multiplier(level))
        .map(|d| d.ceil())
        .and_then(|d| d.to_u64())
        .ok_or(WorldError::ArithmeticOverflow)
}

/// Per-level storage bonus a structure grants for one resource.
pub fn storage_bonus(definition: &StructureDefinition, resource: ResourceType) -> u32 {
    definition.effects.storage_bonus.get(resource)
}

fn scale_up(base: u32, multiplier: Decimal) -> Result<u32, WorldError> {
    Decimal::from(base)
        .checked_mul(multiplier)
        .map(|d| d.ceil())
        .and_then(|d| d.to_u32())
        .ok_or(WorldError::ArithmeticOverflow)
}

const fn amounts(food: u32, water: u32, wood: u32, stone: u32, ore: u32) -> ResourceAmounts {
    ResourceAmounts {
        food,
        water,
        wood,
        stone,
        ore,
    }
}

fn extractor(
    structure_type: StructureType,
    name: &str,
    min_town_hall_level: u32,
    staffing_required: u32,
    build_cost: ResourceAmounts,
    build_duration_ms: u64,
) -> StructureDefinition {
    StructureDefinition {
        structure_type,
        category: StructureCategory::Extractor,
        name: String::from(name),
        area_cost: 0,
        min_town_hall_level,
        unique: false,
        max_level: 5,
        staffing_required,
        build_cost,
        build_duration_ms,
        effects: StructureEffects::default(),
    }
}
