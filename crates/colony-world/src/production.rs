//! Resource production engine.
//!
//! The hourly rate of one extractor is
//! `base_rate × biome_efficiency × level_multiplier`, rounded to two decimal
//! places. The settlement rate then scales each extractor by its staffing
//! and health factors and sums the results per resource.
//!
//! Unknown resource/extractor combinations produce exactly zero rather than
//! an error so that catalog changes never break a running settlement.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use colony_types::{
    Population, ResourceType, StructureCategory, StructureId, StructureInstance, StructureType,
};

use crate::catalog::definition;

/// Hourly rate per resource.
pub type HourlyRates = BTreeMap<ResourceType, Decimal>;

/// Tunable production and upkeep parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Food eaten per resident per hour.
    #[serde(default = "default_food_per_capita")]
    pub food_per_capita: Decimal,
    /// Water drunk per resident per hour.
    #[serde(default = "default_water_per_capita")]
    pub water_per_capita: Decimal,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            food_per_capita: default_food_per_capita(),
            water_per_capita: default_water_per_capita(),
        }
    }
}

fn default_food_per_capita() -> Decimal {
    Decimal::new(1, 1)
}

fn default_water_per_capita() -> Decimal {
    Decimal::new(1, 1)
}

/// Geometric level multiplier: `1.5^(level-1)`.
///
/// Level 0 is treated as level 1. Saturates instead of overflowing.
pub fn level_multiplier(level: u32) -> Decimal {
    let ratio = Decimal::new(15, 1);
    let mut multiplier = Decimal::ONE;
    for _ in 1..level {
        multiplier = multiplier.saturating_mul(ratio);
    }
    multiplier
}

/// Base hourly output of a level-1 extractor for one resource.
///
/// Returns zero for combinations the extractor does not produce.
pub fn base_rate(resource: ResourceType, extractor: StructureType) -> Decimal {
    match (extractor, resource) {
        (StructureType::Farm, ResourceType::Food) => Decimal::from(10),
        (StructureType::FishingDock, ResourceType::Food) => Decimal::from(8),
        (StructureType::Well, ResourceType::Water) => Decimal::from(12),
        (StructureType::LumberMill, ResourceType::Wood) => Decimal::from(8),
        (StructureType::Quarry, ResourceType::Stone) => Decimal::from(6),
        (StructureType::Mine, ResourceType::Ore) => Decimal::from(4),
        (StructureType::Mine, ResourceType::Stone) => Decimal::ONE,
        _ => Decimal::ZERO,
    }
}

/// Efficiency of a biome for one resource. Unknown biomes yield 1.
pub fn biome_efficiency(biome: &str, resource: ResourceType) -> Decimal {
    // (food, water, wood, stone, ore) in tenths
    let row: [i64; 5] = match biome.to_ascii_lowercase().as_str() {
        "plains" => [12, 10, 8, 9, 8],
        "forest" => [9, 10, 15, 8, 8],
        "mountains" => [6, 9, 8, 15, 15],
        "desert" => [4, 5, 3, 12, 11],
        "tundra" => [5, 8, 6, 10, 12],
        "swamp" => [8, 13, 11, 6, 7],
        "coast" => [13, 11, 8, 8, 7],
        _ => return Decimal::ONE,
    };
    let tenths = match resource {
        ResourceType::Food => row[0],
        ResourceType::Water => row[1],
        ResourceType::Wood => row[2],
        ResourceType::Stone => row[3],
        ResourceType::Ore => row[4],
    };
    Decimal::new(tenths, 1)
}

/// Hourly rate of one extractor at `level` in `biome`, rounded to 2 dp.
pub fn production_rate(
    resource: ResourceType,
    extractor: StructureType,
    biome: &str,
    level: u32,
) -> Decimal {
    let base = base_rate(resource, extractor);
    if base.is_zero() {
        return Decimal::ZERO;
    }
    base.saturating_mul(biome_efficiency(biome, resource))
        .saturating_mul(level_multiplier(level))
        .round_dp(2)
}

/// [`production_rate`] keyed by wire names.
///
/// Returns exactly zero when either name is unknown.
pub fn rate_for_names(resource: &str, extractor: &str, biome: &str, level: u32) -> Decimal {
    match (resource.parse::<ResourceType>(), extractor.parse::<StructureType>()) {
        (Ok(resource), Ok(extractor)) => production_rate(resource, extractor, biome, level),
        _ => Decimal::ZERO,
    }
}

/// Staffing factor per extractor, in structure order.
///
/// Workers are assigned from the current population to extractors in the
/// order they were built; each extractor takes up to its requirement.
/// The factor is `staffed / required`, or 1 when no staff is required.
pub fn staffing_factors(
    structures: &[StructureInstance],
    population: &Population,
) -> Vec<(StructureId, Decimal)> {
    let mut idle = population.current;
    structures
        .iter()
        .filter(|s| s.category == StructureCategory::Extractor)
        .map(|s| {
            let required = definition(s.structure_type).staffing_required;
            if required == 0 {
                return (s.id, Decimal::ONE);
            }
            let staffed = idle.min(required);
            idle = idle.saturating_sub(staffed);
            let factor = Decimal::from(staffed)
                .checked_div(Decimal::from(required))
                .unwrap_or(Decimal::ZERO);
            (s.id, factor)
        })
        .collect()
}

/// Health factor: `health / 100`.
pub fn health_factor(health: u32) -> Decimal {
    Decimal::from(health.min(100))
        .checked_div(Decimal::ONE_HUNDRED)
        .unwrap_or(Decimal::ZERO)
}

/// Total hourly production of a settlement.
///
/// Every resource appears in the result, with zero when nothing produces it.
pub fn settlement_rates(
    structures: &[StructureInstance],
    population: &Population,
    biome: &str,
) -> HourlyRates {
    let mut rates: HourlyRates = ResourceType::ALL
        .into_iter()
        .map(|r| (r, Decimal::ZERO))
        .collect();

    let staffing = staffing_factors(structures, population);
    for (id, staffing_factor) in staffing {
        let Some(structure) = structures.iter().find(|s| s.id == id) else {
            continue;
        };
        let factor = staffing_factor.saturating_mul(health_factor(structure.health));
        for resource in ResourceType::ALL {
            let rate = production_rate(resource, structure.structure_type, biome, structure.level);
            if rate.is_zero() {
                continue;
            }
            let entry = rates.entry(resource).or_insert(Decimal::ZERO);
            *entry = entry.saturating_add(rate.saturating_mul(factor));
        }
    }
    rates
}

/// Hourly upkeep of the current population.
pub fn consumption_rates(population: &Population, config: &ProductionConfig) -> HourlyRates {
    let residents = Decimal::from(population.current);
    ResourceType::ALL
        .into_iter()
        .map(|resource| {
            let per_capita = match resource {
                ResourceType::Food => config.food_per_capita,
                ResourceType::Water => config.water_per_capita,
                ResourceType::Wood | ResourceType::Stone | ResourceType::Ore => Decimal::ZERO,
            };
            (resource, per_capita.saturating_mul(residents))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use colony_types::SettlementId;
    use rust_decimal_macros::dec;

    use super::*;

    fn extractor(structure_type: StructureType, level: u32, health: u32) -> StructureInstance {
        StructureInstance {
            id: StructureId::new(),
            settlement_id: SettlementId::new(),
            structure_type,
            category: StructureCategory::Extractor,
            level,
            health,
            repair_pending: false,
            built_at: Utc::now(),
        }
    }

    fn population(current: u32) -> Population {
        Population {
            current,
            capacity: 100,
            happiness: dec!(50),
            last_growth_tick: None,
            growth_progress: Decimal::ZERO,
        }
    }

    #[test]
    fn level_multiplier_is_geometric() {
        assert_eq!(level_multiplier(1), dec!(1));
        assert_eq!(level_multiplier(2), dec!(1.5));
        assert_eq!(level_multiplier(3), dec!(2.25));
        for level in 1..8 {
            let ratio = level_multiplier(level + 1).checked_div(level_multiplier(level));
            assert_eq!(ratio, Some(dec!(1.5)));
        }
    }

    #[test]
    fn rate_rounds_to_two_places() {
        // 4 * 1.1 (desert ore) * 3.375 (level 4) = 14.85
        let rate = production_rate(ResourceType::Ore, StructureType::Mine, "desert", 4);
        assert_eq!(rate, dec!(14.85));
        assert!(rate.scale() <= 2);

        // 8 * 0.3 * 5.0625 = 12.15
        let rate = production_rate(ResourceType::Wood, StructureType::LumberMill, "desert", 5);
        assert_eq!(rate, dec!(12.15));
    }

    #[test]
    fn unknown_biome_uses_unit_efficiency() {
        let rate = production_rate(ResourceType::Food, StructureType::Farm, "moon", 1);
        assert_eq!(rate, dec!(10));
    }

    #[test]
    fn unknown_names_yield_exactly_zero() {
        assert_eq!(rate_for_names("gold", "farm", "plains", 1), Decimal::ZERO);
        assert_eq!(rate_for_names("food", "castle", "plains", 1), Decimal::ZERO);
        assert_eq!(rate_for_names("ore", "farm", "plains", 3), Decimal::ZERO);
        assert_eq!(rate_for_names("food", "farm", "plains", 1), dec!(12));
    }

    #[test]
    fn understaffed_extractors_produce_proportionally() {
        // Farm needs 5, well needs 2; 6 residents fill the farm and half the well.
        let structures = vec![
            extractor(StructureType::Farm, 1, 100),
            extractor(StructureType::Well, 1, 100),
        ];
        let rates = settlement_rates(&structures, &population(6), "unknown");
        assert_eq!(rates.get(&ResourceType::Food), Some(&dec!(10)));
        assert_eq!(rates.get(&ResourceType::Water), Some(&dec!(6)));
        assert_eq!(rates.get(&ResourceType::Ore), Some(&Decimal::ZERO));
    }

    #[test]
    fn damaged_extractor_produces_by_health() {
        let structures = vec![extractor(StructureType::Farm, 1, 40)];
        let rates = settlement_rates(&structures, &population(10), "unknown");
        assert_eq!(rates.get(&ResourceType::Food), Some(&dec!(4)));
    }

    #[test]
    fn mine_produces_ore_and_stone() {
        let structures = vec![extractor(StructureType::Mine, 1, 100)];
        let rates = settlement_rates(&structures, &population(6), "unknown");
        assert_eq!(rates.get(&ResourceType::Ore), Some(&dec!(4)));
        assert_eq!(rates.get(&ResourceType::Stone), Some(&dec!(1)));
    }

    #[test]
    fn consumption_scales_with_population() {
        let rates = consumption_rates(&population(25), &ProductionConfig::default());
        assert_eq!(rates.get(&ResourceType::Food), Some(&dec!(2.5)));
        assert_eq!(rates.get(&ResourceType::Water), Some(&dec!(2.5)));
        assert_eq!(rates.get(&ResourceType::Wood), Some(&Decimal::ZERO));
    }
}
