//! Immigration and emigration rolls.
//!
//! Each population tick rolls once for immigration and once for emigration.
//! Chances are basis points, never above `max_migration_chance_bp`. A fired
//! event moves a bounded random group capped at a percentage of the current
//! population, so no single event can evacuate a settlement.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::PopulationConfig;

/// Basis points in one whole.
const BASIS_POINTS: u32 = 10_000;

/// Scale `max_bp` by a fraction in `[0, 1]`.
fn scaled_chance(max_bp: u32, fraction: Decimal) -> u32 {
    Decimal::from(max_bp)
        .saturating_mul(fraction.clamp(Decimal::ZERO, Decimal::ONE))
        .floor()
        .to_u32()
        .unwrap_or(0)
        .min(max_bp)
}

/// Immigration chance in basis points.
///
/// Zero below the threshold or without spare housing. Scales with the
/// happiness margin above the threshold and with the spare capacity
/// fraction.
pub fn immigration_chance_bp(
    happiness: Decimal,
    current: u32,
    capacity: u32,
    config: &PopulationConfig,
) -> u32 {
    let threshold = Decimal::from(config.immigration_threshold);
    if happiness < threshold || current >= capacity {
        return 0;
    }
    let headroom = Decimal::ONE_HUNDRED.saturating_sub(threshold);
    let margin = happiness
        .saturating_sub(threshold)
        .checked_div(headroom)
        .unwrap_or(Decimal::ZERO);
    let spare = Decimal::from(capacity.saturating_sub(current))
        .checked_div(Decimal::from(capacity))
        .unwrap_or(Decimal::ZERO);
    scaled_chance(config.max_migration_chance_bp, margin.saturating_mul(spare))
}

/// Emigration chance in basis points.
///
/// Zero above the threshold or when only one resident remains. Scales with
/// how far happiness has fallen below the threshold.
pub fn emigration_chance_bp(happiness: Decimal, current: u32, config: &PopulationConfig) -> u32 {
    let threshold = Decimal::from(config.emigration_threshold);
    if happiness > threshold || current <= 1 {
        return 0;
    }
    let deficit = threshold
        .saturating_sub(happiness.max(Decimal::ZERO))
        .checked_div(threshold)
        .unwrap_or(Decimal::ZERO);
    scaled_chance(config.max_migration_chance_bp, deficit)
}

/// Largest group one event may move: `cap_pct` of current, at least one.
pub fn group_cap(current: u32, cap_pct: u32) -> u32 {
    current
        .saturating_mul(cap_pct)
        .checked_div(100)
        .unwrap_or(0)
        .max(1)
}

/// Roll for immigrants. Returns the number who arrive.
pub fn roll_immigration(
    happiness: Decimal,
    current: u32,
    capacity: u32,
    config: &PopulationConfig,
    rng: &mut impl Rng,
) -> u32 {
    let chance = immigration_chance_bp(happiness, current, capacity, config);
    let roll: u32 = rng.random_range(0..BASIS_POINTS);
    if roll >= chance {
        return 0;
    }
    let lo = config.immigration_min.min(config.immigration_max);
    let drawn = rng.random_range(lo..=config.immigration_max);
    drawn
        .min(group_cap(current, config.migration_cap_pct))
        .min(capacity.saturating_sub(current))
}

/// Roll for emigrants. Returns the number who leave.
pub fn roll_emigration(
    happiness: Decimal,
    current: u32,
    config: &PopulationConfig,
    rng: &mut impl Rng,
) -> u32 {
    let chance = emigration_chance_bp(happiness, current, config);
    let roll: u32 = rng.random_range(0..BASIS_POINTS);
    if roll >= chance {
        return 0;
    }
    let lo = config.emigration_min.min(config.emigration_max);
    let drawn = rng.random_range(lo..=config.emigration_max);
    drawn
        .min(group_cap(current, config.migration_cap_pct))
        .min(current.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn immigration_needs_happiness_and_room() {
        let config = PopulationConfig::default();
        assert_eq!(immigration_chance_bp(dec!(74.99), 10, 20, &config), 0);
        assert_eq!(immigration_chance_bp(dec!(100), 20, 20, &config), 0);
        // Full margin, half the housing free: 5000 * 1 * 0.5.
        assert_eq!(immigration_chance_bp(dec!(100), 10, 20, &config), 2500);
        assert_eq!(immigration_chance_bp(dec!(87.5), 10, 20, &config), 1250);
    }

    #[test]
    fn emigration_needs_misery_and_residents() {
        let config = PopulationConfig::default();
        assert_eq!(emigration_chance_bp(dec!(35.01), 10, &config), 0);
        assert_eq!(emigration_chance_bp(dec!(0), 1, &config), 0);
        assert_eq!(emigration_chance_bp(dec!(0), 10, &config), 5000);
        assert_eq!(emigration_chance_bp(dec!(17.5), 10, &config), 2500);
    }

    #[test]
    fn groups_are_capped_at_a_fifth() {
        assert_eq!(group_cap(100, 20), 20);
        assert_eq!(group_cap(12, 20), 2);
        assert_eq!(group_cap(3, 20), 1);
    }

    #[test]
    fn rolls_respect_bounds() {
        let mut config = PopulationConfig::default();
        config.max_migration_chance_bp = 10_000;
        let mut rng = SmallRng::seed_from_u64(42);

        for _ in 0..200 {
            let arrived = roll_immigration(dec!(100), 0, 40, &config, &mut rng);
            assert!(arrived <= 1);
            let arrived = roll_immigration(dec!(100), 30, 60, &config, &mut rng);
            assert!(arrived == 0 || (2..=5).contains(&arrived));
            let left = roll_emigration(dec!(0), 2, &config, &mut rng);
            assert!(left <= 1);
            let left = roll_emigration(dec!(0), 50, &config, &mut rng);
            assert!(left == 0 || (1..=3).contains(&left));
        }
    }

    #[test]
    fn certain_emigration_fires() {
        let mut config = PopulationConfig::default();
        config.max_migration_chance_bp = 10_000;
        let mut rng = SmallRng::seed_from_u64(7);
        assert!(roll_emigration(dec!(0), 50, &config, &mut rng) >= 1);
    }
}
