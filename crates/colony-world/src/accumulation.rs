//! Offline accumulation with diminishing returns.
//!
//! Elapsed wall-clock time is converted to *effective hours* through a tier
//! table before it multiplies a production rate. Tier bounds are expressed
//! in effective hours: with the default table the first 24 raw hours count
//! fully, the next 48 raw hours count at half rate (24 effective), the next
//! 192 raw hours count at quarter rate (48 effective), and nothing counts
//! beyond 96 effective hours.
//!
//! | raw hours | effective hours |
//! |-----------|-----------------|
//! | 1         | 1               |
//! | 24        | 24              |
//! | 30        | 27              |
//! | 60        | 42              |
//! | 168       | 72              |
//! | 264+      | 96              |

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::WorldError;

/// Milliseconds per hour.
const MS_PER_HOUR: i64 = 3_600_000;

/// One diminishing-returns tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulationTier {
    /// Effective-hour ceiling of this tier (cumulative).
    pub until_effective_hours: Decimal,
    /// Fraction of each raw hour credited inside the tier.
    pub rate: Decimal,
}

/// Tier table for offline accumulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulationConfig {
    /// Tiers ordered by ascending ceiling; the last ceiling is the hard cap.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<AccumulationTier>,
}

impl Default for AccumulationConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

fn default_tiers() -> Vec<AccumulationTier> {
    vec![
        AccumulationTier {
            until_effective_hours: Decimal::from(24),
            rate: Decimal::ONE,
        },
        AccumulationTier {
            until_effective_hours: Decimal::from(48),
            rate: Decimal::new(5, 1),
        },
        AccumulationTier {
            until_effective_hours: Decimal::from(96),
            rate: Decimal::new(25, 2),
        },
    ]
}

impl AccumulationConfig {
    /// Check that ceilings strictly ascend and rates lie in `(0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidRule`] describing the first problem.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.tiers.is_empty() {
            return Err(WorldError::InvalidRule("accumulation tiers are empty"));
        }
        let mut previous = Decimal::ZERO;
        for tier in &self.tiers {
            if tier.until_effective_hours <= previous {
                return Err(WorldError::InvalidRule(
                    "accumulation tier ceilings must strictly ascend",
                ));
            }
            if tier.rate <= Decimal::ZERO || tier.rate > Decimal::ONE {
                return Err(WorldError::InvalidRule(
                    "accumulation tier rates must be in (0, 1]",
                ));
            }
            previous = tier.until_effective_hours;
        }
        Ok(())
    }

    /// The hard cap on effective hours.
    pub fn cap(&self) -> Decimal {
        self.tiers
            .last()
            .map_or(Decimal::ZERO, |t| t.until_effective_hours)
    }
}

/// Raw hours between two instants; negative spans (clock skew) become zero.
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    let millis = to.signed_duration_since(from).num_milliseconds();
    if millis <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(millis)
        .checked_div(Decimal::from(MS_PER_HOUR))
        .unwrap_or(Decimal::ZERO)
}

/// Convert raw elapsed hours into effective hours, tier by tier.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if a checked operation fails.
pub fn effective_hours(
    raw_hours: Decimal,
    config: &AccumulationConfig,
) -> Result<Decimal, WorldError> {
    let mut remaining = raw_hours.max(Decimal::ZERO);
    let mut effective = Decimal::ZERO;
    let mut floor = Decimal::ZERO;

    for tier in &config.tiers {
        if remaining.is_zero() {
            break;
        }
        let span = tier
            .until_effective_hours
            .checked_sub(floor)
            .ok_or(WorldError::ArithmeticOverflow)?;
        let raw_capacity = span
            .checked_div(tier.rate)
            .ok_or(WorldError::ArithmeticOverflow)?;
        let used = remaining.min(raw_capacity);
        let credited = used
            .checked_mul(tier.rate)
            .ok_or(WorldError::ArithmeticOverflow)?;
        effective = effective
            .checked_add(credited)
            .ok_or(WorldError::ArithmeticOverflow)?;
        remaining = remaining
            .checked_sub(used)
            .ok_or(WorldError::ArithmeticOverflow)?;
        floor = tier.until_effective_hours;
    }

    Ok(effective.min(config.cap()))
}

/// Effective hours between the last harvest and `now`.
///
/// `None` means the settlement has never harvested: first activation
/// accumulates nothing.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if a checked operation fails.
pub fn effective_hours_since(
    last_harvest_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &AccumulationConfig,
) -> Result<Decimal, WorldError> {
    match last_harvest_at {
        None => Ok(Decimal::ZERO),
        Some(last) => effective_hours(hours_between(last, now), config),
    }
}

/// Whole units produced by `rate` over `effective` hours: `floor(rate × h)`.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if the product does not fit
/// in a `u32`.
pub fn units_over(rate: Decimal, effective: Decimal) -> Result<u32, WorldError> {
    if rate <= Decimal::ZERO || effective <= Decimal::ZERO {
        return Ok(0);
    }
    rate.checked_mul(effective)
        .map(|q| q.floor())
        .and_then(|q| q.to_u32())
        .ok_or(WorldError::ArithmeticOverflow)
}

/// Accumulated quantity for an hourly `rate` since `last_harvest_at`.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if a checked operation fails.
pub fn accumulate(
    rate: Decimal,
    last_harvest_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &AccumulationConfig,
) -> Result<u32, WorldError> {
    let effective = effective_hours_since(last_harvest_at, now, config)?;
    units_over(rate, effective)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    use super::*;

    fn at(hours_ago: i64) -> (Option<DateTime<Utc>>, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single();
        let now = now.unwrap_or_else(Utc::now);
        (Some(now - Duration::hours(hours_ago)), now)
    }

    fn accumulated(hours: i64) -> Option<u32> {
        let (last, now) = at(hours);
        accumulate(dec!(10), last, now, &AccumulationConfig::default()).ok()
    }

    #[test]
    fn one_hour_counts_fully() {
        assert_eq!(accumulated(1), Some(10));
    }

    #[test]
    fn first_day_counts_fully() {
        assert_eq!(accumulated(24), Some(240));
    }

    #[test]
    fn hours_past_a_day_count_half() {
        assert_eq!(accumulated(30), Some(270));
        assert_eq!(accumulated(60), Some(420));
    }

    #[test]
    fn a_week_reaches_the_quarter_tier() {
        // 24 + 48 * 0.5 + 96 * 0.25 = 72 effective hours.
        assert_eq!(accumulated(168), Some(720));
    }

    #[test]
    fn effective_hours_are_capped() {
        assert_eq!(accumulated(264), Some(960));
        assert_eq!(accumulated(1000), Some(960));
    }

    #[test]
    fn first_activation_accumulates_nothing() {
        let (_, now) = at(0);
        let got = accumulate(dec!(10), None, now, &AccumulationConfig::default()).ok();
        assert_eq!(got, Some(0));
    }

    #[test]
    fn clock_skew_accumulates_nothing() {
        assert_eq!(accumulated(-5), Some(0));
    }

    #[test]
    fn fractional_result_is_floored() {
        let (last, now) = at(1);
        let got = accumulate(dec!(2.75), last, now, &AccumulationConfig::default()).ok();
        assert_eq!(got, Some(2));
    }

    #[test]
    fn validate_rejects_unordered_tiers() {
        let mut config = AccumulationConfig::default();
        config.tiers.reverse();
        assert!(config.validate().is_err());
        assert!(AccumulationConfig::default().validate().is_ok());
        assert!(AccumulationConfig { tiers: Vec::new() }.validate().is_err());
    }
}
