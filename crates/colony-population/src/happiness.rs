//! Happiness: a weighted blend of six 0--100 factors.
//!
//! | factor                | default weight |
//! |-----------------------|----------------|
//! | resource sufficiency  | 30%            |
//! | housing quality       | 20%            |
//! | disaster preparedness | 15%            |
//! | recent trauma         | 15%            |
//! | morale                | 15%            |
//! | NPC relations         | 5%             |
//!
//! Recent trauma and NPC relations are held at fixed baselines by
//! [`recent_trauma_factor`] and [`npc_relations_factor`].

use rust_decimal::Decimal;
use serde::Serialize;

use colony_types::{ResourceStorage, SettlementRecord, StructureInstance};
use colony_world::catalog::definition;
use colony_world::production::ProductionConfig;

use crate::config::{HappinessWeights, PopulationConfig};
use crate::error::PopulationError;

// ---------------------------------------------------------------------------
// Factors
// ---------------------------------------------------------------------------

/// The six happiness inputs, each clamped to 0--100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HappinessFactors {
    /// Hours of food and water buffer against saturation.
    pub resource_sufficiency: Decimal,
    /// Crowding score plus housing bonuses.
    pub housing_quality: Decimal,
    /// Shelter coverage, warning system, medical care and defense.
    pub disaster_preparedness: Decimal,
    /// Lingering effect of past disasters.
    pub recent_trauma: Decimal,
    /// Structure morale modifiers.
    pub morale: Decimal,
    /// Relations with NPC factions.
    pub npc_relations: Decimal,
}

impl HappinessFactors {
    /// Evaluate every factor for a settlement.
    pub fn evaluate(
        record: &SettlementRecord,
        production: &ProductionConfig,
        config: &PopulationConfig,
    ) -> Self {
        let population = &record.population;
        Self {
            resource_sufficiency: resource_sufficiency(
                &record.storage,
                population.current,
                production,
                config.buffer_saturation_hours,
            ),
            housing_quality: housing_quality(
                population.current,
                population.capacity,
                &record.structures,
            ),
            disaster_preparedness: disaster_preparedness(&record.structures, population.current),
            recent_trauma: recent_trauma_factor(),
            morale: morale(&record.structures),
            npc_relations: npc_relations_factor(),
        }
    }

    /// Weighted happiness, rounded to two decimal places.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::ArithmeticOverflow`] if a checked
    /// operation fails.
    pub fn weighted(&self, weights: &HappinessWeights) -> Result<Decimal, PopulationError> {
        let pairs = [
            (self.resource_sufficiency, weights.resource_sufficiency),
            (self.housing_quality, weights.housing_quality),
            (self.disaster_preparedness, weights.disaster_preparedness),
            (self.recent_trauma, weights.recent_trauma),
            (self.morale, weights.morale),
            (self.npc_relations, weights.npc_relations),
        ];
        let mut sum = Decimal::ZERO;
        for (factor, weight) in pairs {
            let term = factor
                .checked_mul(Decimal::from(weight))
                .ok_or_else(|| PopulationError::overflow("happiness term"))?;
            sum = sum
                .checked_add(term)
                .ok_or_else(|| PopulationError::overflow("happiness sum"))?;
        }
        let total = Decimal::from(weights.total().max(1));
        let happiness = sum
            .checked_div(total)
            .ok_or_else(|| PopulationError::overflow("happiness average"))?;
        Ok(clamp_factor(happiness).round_dp(2))
    }
}

/// Clamp a factor to the 0--100 range.
fn clamp_factor(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// Ratio `a / b` that never fails; zero when `b` is zero.
fn ratio(a: Decimal, b: Decimal) -> Decimal {
    a.checked_div(b).unwrap_or(Decimal::ZERO)
}

/// Buffer hours of food and water over the saturation point, times 100.
///
/// An empty settlement needs nothing and scores 100.
pub fn resource_sufficiency(
    storage: &ResourceStorage,
    residents: u32,
    production: &ProductionConfig,
    saturation_hours: u32,
) -> Decimal {
    if residents == 0 {
        return Decimal::ONE_HUNDRED;
    }
    let people = Decimal::from(residents);
    let buffer_hours = |amount: u32, per_capita: Decimal| {
        let usage = per_capita.saturating_mul(people);
        if usage <= Decimal::ZERO {
            None
        } else {
            Some(ratio(Decimal::from(amount), usage))
        }
    };
    let food = buffer_hours(storage.food.amount, production.food_per_capita);
    let water = buffer_hours(storage.water.amount, production.water_per_capita);
    let buffer = match (food, water) {
        (Some(f), Some(w)) => f.min(w),
        (Some(h), None) | (None, Some(h)) => h,
        (None, None) => return Decimal::ONE_HUNDRED,
    };
    let saturation = Decimal::from(saturation_hours.max(1));
    clamp_factor(
        buffer
            .min(saturation)
            .saturating_mul(Decimal::ONE_HUNDRED)
            .checked_div(saturation)
            .unwrap_or(Decimal::ZERO),
    )
}

/// Crowding score plus the housing-quality bonus of every structure.
pub fn housing_quality(
    residents: u32,
    capacity: u32,
    structures: &[StructureInstance],
) -> Decimal {
    let crowding = if capacity == 0 {
        if residents == 0 {
            Decimal::from(90)
        } else {
            Decimal::ZERO
        }
    } else {
        let occupancy = ratio(Decimal::from(residents), Decimal::from(capacity));
        if occupancy <= Decimal::new(5, 1) {
            Decimal::from(90)
        } else if occupancy <= Decimal::new(8, 1) {
            Decimal::from(75)
        } else if occupancy <= Decimal::ONE {
            Decimal::from(55)
        } else {
            let overcrowding = occupancy.saturating_sub(Decimal::ONE);
            Decimal::from(55).saturating_sub(overcrowding.saturating_mul(Decimal::ONE_HUNDRED))
        }
    };
    let bonus = structures.iter().fold(0_u32, |total, s| {
        let per_level = definition(s.structure_type).effects.housing_quality;
        total.saturating_add(per_level.saturating_mul(s.level))
    });
    clamp_factor(crowding.saturating_add(Decimal::from(bonus)))
}

/// `40 × shelter coverage + 20 (warning) + 20 (medical) + 20 × defense/100`.
pub fn disaster_preparedness(structures: &[StructureInstance], residents: u32) -> Decimal {
    let mut shelter: u32 = 0;
    let mut defense: u32 = 0;
    let mut warning = false;
    let mut medical = false;
    for structure in structures {
        let effects = definition(structure.structure_type).effects;
        shelter = shelter.saturating_add(effects.shelter_capacity.saturating_mul(structure.level));
        defense = defense.saturating_add(effects.defense_rating.saturating_mul(structure.level));
        warning |= effects.warning_system;
        medical |= effects.medical;
    }

    let coverage = if residents == 0 {
        Decimal::ONE
    } else {
        ratio(Decimal::from(shelter), Decimal::from(residents)).min(Decimal::ONE)
    };
    let defense_share = ratio(Decimal::from(defense), Decimal::ONE_HUNDRED).min(Decimal::ONE);
    let twenty = Decimal::from(20);

    let mut score = Decimal::from(40).saturating_mul(coverage);
    if warning {
        score = score.saturating_add(twenty);
    }
    if medical {
        score = score.saturating_add(twenty);
    }
    clamp_factor(score.saturating_add(twenty.saturating_mul(defense_share)))
}

/// Fixed baseline for disaster trauma until trauma decay is tracked.
pub const fn recent_trauma_factor() -> Decimal {
    Decimal::from_parts(80, 0, 0, false, 0)
}

/// `50 + Σ morale × level`, clamped.
pub fn morale(structures: &[StructureInstance]) -> Decimal {
    let modifiers = structures.iter().fold(Decimal::ZERO, |total, s| {
        let per_level = Decimal::from(definition(s.structure_type).effects.morale);
        total.saturating_add(per_level.saturating_mul(Decimal::from(s.level)))
    });
    clamp_factor(Decimal::from(50).saturating_add(modifiers))
}

/// Fixed neutral baseline for NPC relations until factions exist.
pub const fn npc_relations_factor() -> Decimal {
    Decimal::from_parts(50, 0, 0, false, 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use colony_types::{ResourceAmounts, SettlementId, StructureType};
    use colony_world::settlement::new_instance;
    use colony_world::storage::initial_storage;
    use rust_decimal_macros::dec;

    use super::*;

    fn build(types: &[StructureType]) -> Vec<StructureInstance> {
        let settlement = SettlementId::new();
        types
            .iter()
            .map(|t| new_instance(settlement, *t, Utc::now()))
            .collect()
    }

    fn stocked(food: u32, water: u32) -> ResourceStorage {
        initial_storage(
            10_000,
            &ResourceAmounts {
                food,
                water,
                ..ResourceAmounts::ZERO
            },
        )
    }

    #[test]
    fn sufficiency_saturates_at_seventy_two_hours() {
        let production = ProductionConfig::default();
        // 10 residents eat 1 food/h: 36 food is half the saturation buffer.
        assert_eq!(
            resource_sufficiency(&stocked(36, 500), 10, &production, 72),
            dec!(50)
        );
        assert_eq!(
            resource_sufficiency(&stocked(5000, 5000), 10, &production, 72),
            dec!(100)
        );
        assert_eq!(
            resource_sufficiency(&stocked(0, 500), 10, &production, 72),
            dec!(0)
        );
        assert_eq!(
            resource_sufficiency(&stocked(0, 0), 0, &production, 72),
            dec!(100)
        );
    }

    #[test]
    fn crowding_bands() {
        assert_eq!(housing_quality(4, 10, &[]), dec!(90));
        assert_eq!(housing_quality(7, 10, &[]), dec!(75));
        assert_eq!(housing_quality(10, 10, &[]), dec!(55));
        // 20% over capacity costs 20 points.
        assert_eq!(housing_quality(12, 10, &[]), dec!(35));
        assert_eq!(housing_quality(30, 10, &[]), dec!(0));
    }

    #[test]
    fn housing_bonus_adds_to_crowding_score() {
        let manor = build(&[StructureType::Manor]);
        let bonus = definition(StructureType::Manor).effects.housing_quality;
        assert_eq!(
            housing_quality(10, 10, &manor),
            dec!(55) + Decimal::from(bonus)
        );
    }

    #[test]
    fn preparedness_components() {
        assert_eq!(disaster_preparedness(&[], 10), dec!(0));
        let defended = build(&[
            StructureType::Shelter,
            StructureType::Watchtower,
            StructureType::Hospital,
        ]);
        // Shelter covers 25 of 10 residents; watchtower adds 10 defense.
        assert_eq!(disaster_preparedness(&defended, 10), dec!(82));
    }

    #[test]
    fn placeholders_are_fixed() {
        assert_eq!(recent_trauma_factor(), dec!(80));
        assert_eq!(npc_relations_factor(), dec!(50));
    }

    #[test]
    fn weighted_happiness() {
        let factors = HappinessFactors {
            resource_sufficiency: dec!(100),
            housing_quality: dec!(55),
            disaster_preparedness: dec!(20),
            recent_trauma: dec!(80),
            morale: dec!(55),
            npc_relations: dec!(50),
        };
        // 30 + 11 + 3 + 12 + 8.25 + 2.5
        let happiness = factors.weighted(&HappinessWeights::default()).unwrap();
        assert_eq!(happiness, dec!(66.75));
    }
}
