//! Structure repairs and the emergency repair window.
//!
//! A player pays up front for a repair: the structure's build cost at its
//! current level, scaled by the missing health fraction and rounded up.
//! While the settlement's emergency repair window is open the price is
//! discounted. The paid repair is then carried out by the hourly repairs
//! tick, which restores a fixed amount of health per tick until the
//! structure is whole again.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use colony_types::{ResourceAmounts, Settlement, SettlementRecord, StructureId, StructureInstance};

use crate::catalog::{cost_for_level, definition};
use crate::error::WorldError;
use crate::storage::pay;
use crate::validation::{BuildRejection, Validation};

/// Repair pricing and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Health restored per repairs tick.
    #[serde(default = "default_health_per_tick")]
    pub health_per_tick: u32,
    /// Length of the emergency repair window opened by a disaster aftermath.
    #[serde(default = "default_emergency_window_hours")]
    pub emergency_window_hours: u32,
    /// Discount on repair costs while the window is open, in percent.
    #[serde(default = "default_emergency_discount_pct")]
    pub emergency_discount_pct: u32,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            health_per_tick: default_health_per_tick(),
            emergency_window_hours: default_emergency_window_hours(),
            emergency_discount_pct: default_emergency_discount_pct(),
        }
    }
}

const fn default_health_per_tick() -> u32 {
    25
}

const fn default_emergency_window_hours() -> u32 {
    48
}

const fn default_emergency_discount_pct() -> u32 {
    50
}

/// Price of an accepted repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairQuote {
    /// Structure being repaired.
    pub structure_id: StructureId,
    /// Resources charged.
    pub cost: ResourceAmounts,
    /// Whether the emergency discount applied.
    pub discounted: bool,
}

/// Health restored to one structure by a repairs tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairProgress {
    /// The structure.
    pub structure_id: StructureId,
    /// Health after this tick.
    pub health: u32,
    /// Whether the repair finished.
    pub finished: bool,
}

/// Time left in the emergency repair window, clamped to zero.
pub fn repair_window_remaining(until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    until
        .map(|end| end.signed_duration_since(now))
        .filter(|left| *left > Duration::zero())
        .unwrap_or_else(Duration::zero)
}

/// Whether the settlement's emergency repair window is open at `now`.
pub fn emergency_window_active(settlement: &Settlement, now: DateTime<Utc>) -> bool {
    repair_window_remaining(settlement.emergency_repair_until, now) > Duration::zero()
}

/// Cost to restore a structure to full health.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if a checked operation fails.
pub fn repair_cost(
    structure: &StructureInstance,
    discounted: bool,
    config: &RepairConfig,
) -> Result<ResourceAmounts, WorldError> {
    let base = cost_for_level(&definition(structure.structure_type), structure.level)?;
    let missing = Decimal::from(100_u32.saturating_sub(structure.health.min(100)));
    let mut fraction = missing
        .checked_div(Decimal::ONE_HUNDRED)
        .ok_or(WorldError::ArithmeticOverflow)?;
    if discounted {
        let keep = Decimal::from(100_u32.saturating_sub(config.emergency_discount_pct.min(100)));
        fraction = fraction
            .checked_mul(keep)
            .and_then(|f| f.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(WorldError::ArithmeticOverflow)?;
    }

    let mut cost = ResourceAmounts::ZERO;
    for (resource, quantity) in base.iter() {
        *cost.get_mut(resource) = Decimal::from(quantity)
            .checked_mul(fraction)
            .map(|c| c.ceil())
            .and_then(|c| c.to_u32())
            .ok_or(WorldError::ArithmeticOverflow)?;
    }
    Ok(cost)
}

/// Charge for a repair and mark the structure as pending.
pub fn request_repair(
    record: &mut SettlementRecord,
    structure_id: StructureId,
    now: DateTime<Utc>,
    config: &RepairConfig,
) -> Validation<RepairQuote> {
    let discounted = emergency_window_active(&record.settlement, now);
    let Some(structure) = record.structure(structure_id) else {
        return Ok(Err(BuildRejection::StructureNotFound { structure_id }));
    };
    if structure.health >= 100 {
        return Ok(Err(BuildRejection::StructureNotDamaged { structure_id }));
    }
    if structure.repair_pending {
        return Ok(Err(BuildRejection::RepairAlreadyPending { structure_id }));
    }

    let cost = repair_cost(structure, discounted, config)?;
    if let Err(shortfall) = pay(&mut record.storage, &cost) {
        return Ok(Err(BuildRejection::InsufficientResources {
            resource: shortfall.resource,
            required: shortfall.required,
            available: shortfall.available,
        }));
    }
    if let Some(structure) = record.structure_mut(structure_id) {
        structure.repair_pending = true;
    }
    Ok(Ok(RepairQuote {
        structure_id,
        cost,
        discounted,
    }))
}

/// Advance every pending repair by one tick.
pub fn repair_tick(record: &mut SettlementRecord, config: &RepairConfig) -> Vec<RepairProgress> {
    record
        .structures
        .iter_mut()
        .filter(|s| s.repair_pending)
        .map(|s| {
            s.health = s.health.saturating_add(config.health_per_tick).min(100);
            let finished = s.health >= 100;
            if finished {
                s.repair_pending = false;
            }
            RepairProgress {
                structure_id: s.id,
                health: s.health,
                finished,
            }
        })
        .collect()
}
