//! The resource tick: offline accumulation applied to storage.
//!
//! One routine serves both the hourly resources subsystem and the
//! player-triggered login catch-up. Production and per-capita upkeep are
//! computed over the same effective period and netted before storage is
//! touched, so a settlement at capacity does not lose food it would have
//! eaten anyway.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use colony_types::{ResourceAmounts, ResourceType, SettlementRecord};

use crate::accumulation::{effective_hours_since, units_over};
use crate::error::WorldError;
use crate::production::{HourlyRates, consumption_rates, settlement_rates};
use crate::rules::WorldRules;
use crate::storage::{deposit, withdraw};

/// Outcome of one harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestReport {
    /// Effective hours credited.
    pub effective_hours: Decimal,
    /// Gross production over the period.
    pub produced: ResourceAmounts,
    /// Gross upkeep over the period.
    pub consumed: ResourceAmounts,
    /// Amounts in storage afterwards.
    pub stored: ResourceAmounts,
    /// Whether this was the settlement's first harvest.
    pub first_activation: bool,
}

/// Current hourly production and upkeep rates for a settlement.
pub fn hourly_rates(record: &SettlementRecord, rules: &WorldRules) -> (HourlyRates, HourlyRates) {
    (
        settlement_rates(
            &record.structures,
            &record.population,
            &record.settlement.biome,
        ),
        consumption_rates(&record.population, &rules.production),
    )
}

/// Harvest everything accumulated since `last_harvest_at`.
///
/// The first activation only stamps `last_harvest_at`.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if a checked operation fails.
pub fn harvest(
    record: &mut SettlementRecord,
    now: DateTime<Utc>,
    rules: &WorldRules,
) -> Result<HarvestReport, WorldError> {
    let first_activation = record.settlement.last_harvest_at.is_none();
    let effective = effective_hours_since(
        record.settlement.last_harvest_at,
        now,
        &rules.accumulation,
    )?;
    let (production, upkeep) = hourly_rates(record, rules);

    let mut produced = ResourceAmounts::ZERO;
    let mut consumed = ResourceAmounts::ZERO;
    for resource in ResourceType::ALL {
        let rate = production.get(&resource).copied().unwrap_or(Decimal::ZERO);
        let use_rate = upkeep.get(&resource).copied().unwrap_or(Decimal::ZERO);
        let gain = units_over(rate, effective)?;
        let loss = units_over(use_rate, effective)?;
        *produced.get_mut(resource) = gain;
        *consumed.get_mut(resource) = loss;

        if gain >= loss {
            deposit(&mut record.storage, resource, gain.saturating_sub(loss));
        } else {
            withdraw(&mut record.storage, resource, loss.saturating_sub(gain));
        }
    }

    // Never move the timestamp backwards on clock skew.
    let stamp = record
        .settlement
        .last_harvest_at
        .map_or(now, |last| last.max(now));
    record.settlement.last_harvest_at = Some(stamp);

    debug!(
        settlement_id = %record.settlement.id,
        effective_hours = %effective,
        first_activation,
        "harvested"
    );

    Ok(HarvestReport {
        effective_hours: effective,
        produced,
        consumed,
        stored: record.storage.amounts(),
        first_activation,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use colony_types::{PlayerId, StructureType, WorldId};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::settlement::{Founding, found_settlement, new_instance, recompute_derived};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).single().unwrap()
    }

    /// Plains settlement of 10 with one fully staffed Farm and Well.
    fn farmstead(rules: &WorldRules) -> SettlementRecord {
        let mut record = found_settlement(
            Founding {
                world_id: WorldId::new(),
                owner_id: PlayerId::new(),
                name: String::from("Harvest Moon"),
                biome: String::from("plains"),
            },
            t0(),
            rules,
        );
        for structure_type in [StructureType::Farm, StructureType::Well] {
            record
                .structures
                .push(new_instance(record.id(), structure_type, t0()));
        }
        recompute_derived(&mut record, rules);
        record.population.current = 10;
        record
    }

    #[test]
    fn first_activation_only_stamps_the_clock() {
        let rules = WorldRules::default();
        let mut record = farmstead(&rules);
        let before = record.storage.amounts();

        let report = harvest(&mut record, t0(), &rules).unwrap();
        assert!(report.first_activation);
        assert_eq!(report.effective_hours, Decimal::ZERO);
        assert_eq!(report.stored, before);
        assert_eq!(record.settlement.last_harvest_at, Some(t0()));
    }

    #[test]
    fn nets_production_against_upkeep() {
        let rules = WorldRules::default();
        let mut record = farmstead(&rules);
        harvest(&mut record, t0(), &rules).unwrap();
        let (production, upkeep) = hourly_rates(&record, &rules);
        let food_rate = production.get(&ResourceType::Food).copied().unwrap();
        assert_eq!(upkeep.get(&ResourceType::Food).copied(), Some(dec!(1.0)));

        let food_before = record.storage.food.amount;
        let report = harvest(&mut record, t0() + Duration::hours(2), &rules).unwrap();
        assert_eq!(report.effective_hours, dec!(2));
        assert_eq!(report.consumed.food, 2);
        let gain = units_over(food_rate, dec!(2)).unwrap();
        assert_eq!(report.produced.food, gain);
        assert_eq!(
            record.storage.food.amount,
            food_before.saturating_add(gain).saturating_sub(2)
        );
        assert_eq!(report.produced.stone, 0);
    }

    #[test]
    fn starving_settlement_clamps_at_zero() {
        let rules = WorldRules::default();
        let mut record = farmstead(&rules);
        record.structures.retain(|s| s.structure_type == StructureType::TownHall);
        record.storage.water.amount = 3;
        record.settlement.last_harvest_at = Some(t0());

        harvest(&mut record, t0() + Duration::hours(24), &rules).unwrap();
        assert_eq!(record.storage.water.amount, 0);
    }

    #[test]
    fn storage_never_exceeds_capacity() {
        let rules = WorldRules::default();
        let mut record = farmstead(&rules);
        record.settlement.last_harvest_at = Some(t0());

        harvest(&mut record, t0() + Duration::days(30), &rules).unwrap();
        for resource in ResourceType::ALL {
            let stock = record.storage.stock(resource);
            assert!(stock.amount <= stock.capacity);
        }
    }

    #[test]
    fn skewed_clock_produces_nothing() {
        let rules = WorldRules::default();
        let mut record = farmstead(&rules);
        record.settlement.last_harvest_at = Some(t0());
        let report = harvest(&mut record, t0() - Duration::hours(3), &rules).unwrap();
        assert_eq!(report.produced, ResourceAmounts::ZERO);
        assert_eq!(record.settlement.last_harvest_at, Some(t0()));
    }
}
