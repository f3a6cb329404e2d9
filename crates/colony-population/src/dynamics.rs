//! The population tick.
//!
//! Order within one tick: capacity, happiness, growth, immigration,
//! emigration. Growth reads the freshly computed happiness.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use colony_types::SettlementRecord;
use colony_world::rules::WorldRules;
use colony_world::settlement::housing_capacity;

use crate::config::PopulationConfig;
use crate::error::PopulationError;
use crate::growth::{GrowthOutcome, apply_growth};
use crate::happiness::HappinessFactors;
use crate::migration::{roll_emigration, roll_immigration};

/// Everything one population tick changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationChange {
    /// Residents before the tick.
    pub previous: u32,
    /// Residents after the tick.
    pub current: u32,
    /// Housing capacity.
    pub capacity: u32,
    /// New happiness.
    pub happiness: Decimal,
    /// Inputs to happiness.
    pub factors: HappinessFactors,
    /// Natural growth applied.
    pub growth: GrowthOutcome,
    /// Residents who arrived.
    pub immigrants: u32,
    /// Residents who left.
    pub emigrants: u32,
}

/// Run one population tick for a settlement.
///
/// # Errors
///
/// Returns [`PopulationError::ArithmeticOverflow`] if a checked operation
/// fails; the record may then hold a partially applied tick and should be
/// discarded by the caller.
pub fn advance_population(
    record: &mut SettlementRecord,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
    world: &WorldRules,
    config: &PopulationConfig,
) -> Result<PopulationChange, PopulationError> {
    let previous = record.population.current;
    record.population.capacity =
        housing_capacity(&record.structures, world.settlement.base_housing);

    let factors = HappinessFactors::evaluate(record, &world.production, config);
    let happiness = factors.weighted(&config.weights)?;
    record.population.happiness = happiness;

    let growth = apply_growth(&mut record.population, now, config.max_growth_hours)?;

    let population = &mut record.population;
    let immigrants = roll_immigration(
        happiness,
        population.current,
        population.capacity,
        config,
        rng,
    );
    population.current = population.current.saturating_add(immigrants);

    let emigrants = roll_emigration(happiness, population.current, config, rng);
    population.current = population.current.saturating_sub(emigrants);

    debug!(
        settlement_id = %record.settlement.id,
        previous,
        current = record.population.current,
        happiness = %happiness,
        immigrants,
        emigrants,
        "population tick"
    );

    Ok(PopulationChange {
        previous,
        current: record.population.current,
        capacity: record.population.capacity,
        happiness,
        factors,
        growth,
        immigrants,
        emigrants,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use colony_types::{PlayerId, StructureType, WorldId};
    use colony_world::settlement::{Founding, found_settlement, new_instance, recompute_derived};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 30, 0).single().unwrap()
    }

    fn village(world: &WorldRules) -> SettlementRecord {
        let mut record = found_settlement(
            Founding {
                world_id: WorldId::new(),
                owner_id: PlayerId::new(),
                name: String::from("Lowmeadow"),
                biome: String::from("plains"),
            },
            t0(),
            world,
        );
        for structure_type in [StructureType::House, StructureType::House] {
            record
                .structures
                .push(new_instance(record.id(), structure_type, t0()));
        }
        recompute_derived(&mut record, world);
        record.population.last_growth_tick = Some(t0());
        record
    }

    #[test]
    fn tick_recomputes_capacity_and_happiness() {
        let world = WorldRules::default();
        let config = PopulationConfig::default();
        let mut record = village(&world);
        record.population.capacity = 0;
        let mut rng = SmallRng::seed_from_u64(42);

        let change = advance_population(
            &mut record,
            t0() + Duration::hours(1),
            &mut rng,
            &world,
            &config,
        )
        .unwrap();

        assert_eq!(change.capacity, 26);
        assert_eq!(record.population.happiness, change.happiness);
        assert_eq!(
            change.happiness,
            change.factors.weighted(&config.weights).unwrap()
        );
        assert!(change.current <= change.capacity);
    }

    #[test]
    fn starving_settlement_loses_happiness() {
        let world = WorldRules::default();
        let config = PopulationConfig::default();
        let mut fed = village(&world);
        let mut starving = village(&world);
        starving.storage.food.amount = 0;
        starving.storage.water.amount = 0;
        let mut rng = SmallRng::seed_from_u64(1);

        let now = t0() + Duration::hours(1);
        let fed = advance_population(&mut fed, now, &mut rng, &world, &config).unwrap();
        let starving = advance_population(&mut starving, now, &mut rng, &world, &config).unwrap();
        assert!(starving.happiness < fed.happiness);
        assert_eq!(starving.factors.resource_sufficiency, Decimal::ZERO);
    }

    #[test]
    fn population_never_drops_below_one() {
        let world = WorldRules::default();
        let mut config = PopulationConfig::default();
        config.max_migration_chance_bp = 10_000;
        let mut record = village(&world);
        record.population.current = 2;
        record.storage.food.amount = 0;
        record.storage.water.amount = 0;
        let mut rng = SmallRng::seed_from_u64(9);

        for hour in 1..=48 {
            advance_population(
                &mut record,
                t0() + Duration::hours(hour),
                &mut rng,
                &world,
                &config,
            )
            .unwrap();
            assert!(record.population.current >= 1);
        }
    }
}
