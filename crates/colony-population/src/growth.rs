//! Natural growth by happiness band.
//!
//! | happiness | hourly rate          |
//! |-----------|----------------------|
//! | 0--30     | -1% rising to 0%     |
//! | 30--50    | 0% rising to 1%      |
//! | 50--75    | 1% rising to 2%      |
//! | 75--100   | 2% rising to 4%      |
//!
//! The rate is interpolated linearly inside its band and scaled by
//! `max(0, 1 - current/capacity)`, so growth in either direction stops at
//! capacity. Fractional people accumulate in `growth_progress` across ticks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use colony_types::Population;
use colony_world::accumulation::hours_between;

use crate::error::PopulationError;

/// Band edges: (happiness from, happiness to, % at from, % at to).
const BANDS: [(i64, i64, i64, i64); 4] = [
    (0, 30, -1, 0),
    (30, 50, 0, 1),
    (50, 75, 1, 2),
    (75, 100, 2, 4),
];

/// Result of applying growth for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthOutcome {
    /// Hourly growth rate as a fraction of current population.
    pub hourly_rate: Decimal,
    /// Hours credited.
    pub hours: Decimal,
    /// Whole residents added (negative when shrinking).
    pub change: i64,
}

/// Unscaled band rate for a happiness value, as a fraction per hour.
pub fn band_rate(happiness: Decimal) -> Decimal {
    let h = happiness.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let (lo, hi, from, to) = BANDS
        .iter()
        .copied()
        .find(|(lo, hi, _, _)| h >= Decimal::from(*lo) && h < Decimal::from(*hi))
        .unwrap_or((75, 100, 2, 4));

    let span = Decimal::from(hi.saturating_sub(lo));
    let position = h
        .saturating_sub(Decimal::from(lo))
        .checked_div(span)
        .unwrap_or(Decimal::ZERO);
    let delta = Decimal::from(to.saturating_sub(from));
    let percent = Decimal::from(from).saturating_add(delta.saturating_mul(position));
    percent
        .checked_div(Decimal::ONE_HUNDRED)
        .unwrap_or(Decimal::ZERO)
}

/// `max(0, 1 - current/capacity)`; zero for a settlement with no housing.
pub fn capacity_headroom(current: u32, capacity: u32) -> Decimal {
    if capacity == 0 {
        return Decimal::ZERO;
    }
    let filled = Decimal::from(current)
        .checked_div(Decimal::from(capacity))
        .unwrap_or(Decimal::ONE);
    Decimal::ONE.saturating_sub(filled).max(Decimal::ZERO)
}

/// Hourly growth rate for a population.
pub fn hourly_growth_rate(happiness: Decimal, current: u32, capacity: u32) -> Decimal {
    band_rate(happiness).saturating_mul(capacity_headroom(current, capacity))
}

/// Apply growth accumulated since `last_growth_tick`.
///
/// The first tick only stamps the clock. Elapsed time is capped at
/// `max_hours`. Population never exceeds capacity through growth and never
/// falls below one.
///
/// # Errors
///
/// Returns [`PopulationError::ArithmeticOverflow`] if a checked operation
/// fails.
pub fn apply_growth(
    population: &mut Population,
    now: DateTime<Utc>,
    max_hours: u32,
) -> Result<GrowthOutcome, PopulationError> {
    let rate = hourly_growth_rate(population.happiness, population.current, population.capacity);
    let hours = population
        .last_growth_tick
        .map_or(Decimal::ZERO, |last| hours_between(last, now))
        .min(Decimal::from(max_hours));
    population.last_growth_tick = Some(
        population
            .last_growth_tick
            .map_or(now, |last| last.max(now)),
    );

    let increment = Decimal::from(population.current)
        .checked_mul(rate)
        .and_then(|x| x.checked_mul(hours))
        .ok_or_else(|| PopulationError::overflow("growth increment"))?;
    let progress = population
        .growth_progress
        .checked_add(increment)
        .ok_or_else(|| PopulationError::overflow("growth progress"))?;
    let whole = progress.trunc();
    let requested = whole
        .to_i64()
        .ok_or_else(|| PopulationError::overflow("growth whole residents"))?;

    let change = if requested >= 0 {
        let room = population.capacity.saturating_sub(population.current);
        let added = u32::try_from(requested).unwrap_or(u32::MAX).min(room);
        population.current = population.current.saturating_add(added);
        i64::from(added)
    } else {
        let spare = population.current.saturating_sub(1);
        let removed = u32::try_from(requested.unsigned_abs())
            .unwrap_or(u32::MAX)
            .min(spare);
        population.current = population.current.saturating_sub(removed);
        i64::from(removed).saturating_neg()
    };
    population.growth_progress = progress.saturating_sub(whole);

    Ok(GrowthOutcome {
        hourly_rate: rate,
        hours,
        change,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 0, 30, 0).single().unwrap()
    }

    fn population(current: u32, capacity: u32, happiness: Decimal) -> Population {
        Population {
            current,
            capacity,
            happiness,
            last_growth_tick: Some(t0()),
            growth_progress: Decimal::ZERO,
        }
    }

    #[test]
    fn band_edges() {
        assert_eq!(band_rate(dec!(0)), dec!(-0.01));
        assert_eq!(band_rate(dec!(15)), dec!(-0.005));
        assert_eq!(band_rate(dec!(30)), dec!(0));
        assert_eq!(band_rate(dec!(40)), dec!(0.005));
        assert_eq!(band_rate(dec!(50)), dec!(0.01));
        assert_eq!(band_rate(dec!(75)), dec!(0.02));
        assert_eq!(band_rate(dec!(100)), dec!(0.04));
    }

    #[test]
    fn growth_stops_at_capacity() {
        assert_eq!(hourly_growth_rate(dec!(90), 20, 20), dec!(0));
        assert_eq!(hourly_growth_rate(dec!(90), 25, 20), dec!(0));
        assert_eq!(hourly_growth_rate(dec!(10), 20, 20), dec!(0));
        assert_eq!(hourly_growth_rate(dec!(100), 10, 20), dec!(0.02));
    }

    #[test]
    fn fractional_growth_carries_over() {
        // 50 residents at 1%/h with headroom 0.5 grow 0.25 per hour.
        let mut pop = population(50, 100, dec!(50));
        let first = apply_growth(&mut pop, t0() + Duration::hours(2), 24).unwrap();
        assert_eq!(first.change, 0);
        assert_eq!(pop.growth_progress, dec!(0.5));

        let second = apply_growth(&mut pop, t0() + Duration::hours(4), 24).unwrap();
        assert_eq!(second.change, 1);
        assert_eq!(pop.current, 51);
        assert_eq!(pop.growth_progress, dec!(0));
    }

    #[test]
    fn elapsed_time_is_capped() {
        let mut pop = population(50, 100, dec!(50));
        let outcome = apply_growth(&mut pop, t0() + Duration::hours(100), 24).unwrap();
        assert_eq!(outcome.hours, dec!(24));
        assert_eq!(outcome.change, 6);
    }

    #[test]
    fn decline_never_empties_the_settlement() {
        let mut pop = population(2, 1000, dec!(0));
        pop.growth_progress = dec!(-5);
        apply_growth(&mut pop, t0() + Duration::hours(1), 24).unwrap();
        assert_eq!(pop.current, 1);
    }

    #[test]
    fn first_tick_only_stamps() {
        let mut pop = population(10, 20, dec!(90));
        pop.last_growth_tick = None;
        let outcome = apply_growth(&mut pop, t0(), 24).unwrap();
        assert_eq!(outcome.change, 0);
        assert_eq!(pop.last_growth_tick, Some(t0()));
    }
}
