//! Disaster lifecycle state machine.
//!
//! ```text
//! DORMANT --roll--> WARNING --lead time--> IMPACT --next check--> AFTERMATH
//!    ^                                                                |
//!    +-------------- window expiry or acknowledgement ----------------+
//! ```
//!
//! [`advance`] performs at most one transition per call and is driven by the
//! periodic disaster check. All randomness comes from the caller's RNG, so
//! a seeded RNG reproduces a disaster exactly.
//!
//! Resource losses in the aftermath derive from the impact's total damage
//! `D`: food `floor(1.5 D)`, water `floor(2 D)`, wood `floor(0.5 D)`.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use colony_types::{
    AftermathSummary, DisasterEvent, DisasterId, DisasterKind, DisasterPhase, ImpactReport,
    ResourceAmounts, SettlementRecord, StructureType,
};

use crate::catalog::definition;
use crate::construction::drop_upgrades_of;
use crate::error::WorldError;
use crate::rules::WorldRules;
use crate::settlement::recompute_derived;
use crate::storage::debit;

/// Basis points in one whole.
const BASIS_POINTS: u32 = 10_000;

/// Disaster probabilities and damage parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisasterConfig {
    /// Chance per check that a dormant settlement receives a warning.
    #[serde(default = "default_warning_chance_bp")]
    pub warning_chance_bp: u32,
    /// Time between warning and impact.
    #[serde(default = "default_lead_time_secs")]
    pub lead_time_secs: u32,
    /// Highest severity rolled (lowest is 1).
    #[serde(default = "default_max_severity")]
    pub max_severity: u32,
    /// Casualty rate per severity point among exposed residents.
    #[serde(default = "default_exposed_casualty_bp")]
    pub exposed_casualty_bp: u32,
    /// Casualty rate per severity point among sheltered residents.
    #[serde(default = "default_sheltered_casualty_bp")]
    pub sheltered_casualty_bp: u32,
    /// Per-severity chance that a structure at 50 health is hit.
    #[serde(default = "default_hit_chance_bp")]
    pub hit_chance_bp: u32,
    /// Lowest per-severity damage roll.
    #[serde(default = "default_damage_min")]
    pub damage_min: u32,
    /// Highest per-severity damage roll.
    #[serde(default = "default_damage_max")]
    pub damage_max: u32,
    /// Food lost per point of total damage.
    #[serde(default = "default_food_loss")]
    pub food_loss_per_damage: Decimal,
    /// Water lost per point of total damage.
    #[serde(default = "default_water_loss")]
    pub water_loss_per_damage: Decimal,
    /// Wood lost per point of total damage.
    #[serde(default = "default_wood_loss")]
    pub wood_loss_per_damage: Decimal,
    /// Happiness lost per severity point.
    #[serde(default = "default_happiness_loss_per_severity")]
    pub happiness_loss_per_severity: u32,
    /// Cap on happiness lost to a single disaster.
    #[serde(default = "default_happiness_loss_cap")]
    pub happiness_loss_cap: u32,
}

impl Default for DisasterConfig {
    fn default() -> Self {
        Self {
            warning_chance_bp: default_warning_chance_bp(),
            lead_time_secs: default_lead_time_secs(),
            max_severity: default_max_severity(),
            exposed_casualty_bp: default_exposed_casualty_bp(),
            sheltered_casualty_bp: default_sheltered_casualty_bp(),
            hit_chance_bp: default_hit_chance_bp(),
            damage_min: default_damage_min(),
            damage_max: default_damage_max(),
            food_loss_per_damage: default_food_loss(),
            water_loss_per_damage: default_water_loss(),
            wood_loss_per_damage: default_wood_loss(),
            happiness_loss_per_severity: default_happiness_loss_per_severity(),
            happiness_loss_cap: default_happiness_loss_cap(),
        }
    }
}

const fn default_warning_chance_bp() -> u32 {
    150
}
const fn default_lead_time_secs() -> u32 {
    1800
}
const fn default_max_severity() -> u32 {
    5
}
const fn default_exposed_casualty_bp() -> u32 {
    300
}
const fn default_sheltered_casualty_bp() -> u32 {
    50
}
const fn default_hit_chance_bp() -> u32 {
    1200
}
const fn default_damage_min() -> u32 {
    10
}
const fn default_damage_max() -> u32 {
    20
}
fn default_food_loss() -> Decimal {
    Decimal::new(15, 1)
}
fn default_water_loss() -> Decimal {
    Decimal::from(2)
}
fn default_wood_loss() -> Decimal {
    Decimal::new(5, 1)
}
const fn default_happiness_loss_per_severity() -> u32 {
    5
}
const fn default_happiness_loss_cap() -> u32 {
    30
}

/// The transition taken by one [`advance`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisasterTransition {
    /// Nothing changed.
    Unchanged,
    /// DORMANT to WARNING.
    Warned(DisasterEvent),
    /// WARNING to IMPACT.
    Struck(DisasterEvent),
    /// IMPACT to AFTERMATH.
    Aftermath(DisasterEvent),
    /// AFTERMATH to DORMANT after the repair window expired.
    Expired(DisasterId),
}

/// Run one disaster check for a settlement.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if a checked operation fails.
pub fn advance(
    record: &mut SettlementRecord,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
    rules: &WorldRules,
) -> Result<DisasterTransition, WorldError> {
    let Some(mut event) = record.disaster.take() else {
        return Ok(maybe_warn(record, now, rng, &rules.disasters)
            .map_or(DisasterTransition::Unchanged, DisasterTransition::Warned));
    };

    match event.phase {
        DisasterPhase::Dormant => Ok(maybe_warn(record, now, rng, &rules.disasters)
            .map_or(DisasterTransition::Unchanged, DisasterTransition::Warned)),
        DisasterPhase::Warning if now >= event.impact_at => {
            let report = apply_impact(record, event.severity, rng, rules);
            event.phase = DisasterPhase::Impact;
            event.impact = Some(report);
            info!(
                settlement_id = %record.settlement.id,
                kind = %event.kind,
                severity = event.severity,
                casualties = report.casualties,
                destroyed = report.structures_destroyed,
                "disaster struck"
            );
            record.disaster = Some(event.clone());
            Ok(DisasterTransition::Struck(event))
        }
        DisasterPhase::Impact => {
            let report = event.impact.unwrap_or_default();
            let summary = match apply_aftermath(record, &report, event.severity, &rules.disasters)
            {
                Ok(summary) => summary,
                Err(err) => {
                    record.disaster = Some(event);
                    return Err(err);
                }
            };
            let window_end = open_repair_window(record, now, rules);
            event.phase = DisasterPhase::Aftermath;
            event.aftermath_started_at = Some(now);
            event.repair_window_ends_at = Some(window_end);
            event.aftermath_summary = Some(summary);
            record.disaster = Some(event.clone());
            Ok(DisasterTransition::Aftermath(event))
        }
        DisasterPhase::Aftermath if event.repair_window_ends_at.is_none_or(|end| now >= end) => {
            debug!(settlement_id = %record.settlement.id, "disaster aftermath expired");
            Ok(DisasterTransition::Expired(event.id))
        }
        DisasterPhase::Warning | DisasterPhase::Aftermath => {
            record.disaster = Some(event);
            Ok(DisasterTransition::Unchanged)
        }
    }
}

/// Dismiss the aftermath of a disaster.
///
/// The emergency repair window lives on the settlement and stays open.
///
/// # Errors
///
/// Returns [`WorldError::NoAftermath`] when no aftermath is in progress.
pub fn acknowledge(record: &mut SettlementRecord) -> Result<DisasterId, WorldError> {
    match record.disaster.as_ref() {
        Some(event) if event.phase == DisasterPhase::Aftermath => {
            let id = event.id;
            record.disaster = None;
            Ok(id)
        }
        _ => Err(WorldError::NoAftermath),
    }
}

/// Resource losses derived from total damage.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if a loss does not fit in `u32`.
pub fn aftermath_losses(
    total_damage: u32,
    config: &DisasterConfig,
) -> Result<ResourceAmounts, WorldError> {
    let scaled = |per_damage: Decimal| {
        Decimal::from(total_damage)
            .checked_mul(per_damage)
            .map(|loss| loss.floor())
            .and_then(|loss| loss.to_u32())
            .ok_or(WorldError::ArithmeticOverflow)
    };
    Ok(ResourceAmounts {
        food: scaled(config.food_loss_per_damage)?,
        water: scaled(config.water_loss_per_damage)?,
        wood: scaled(config.wood_loss_per_damage)?,
        stone: 0,
        ore: 0,
    })
}

/// Happiness lost to a disaster of the given severity.
pub fn happiness_loss(severity: u32, config: &DisasterConfig) -> u32 {
    severity
        .saturating_mul(config.happiness_loss_per_severity)
        .min(config.happiness_loss_cap)
}

fn maybe_warn(
    record: &mut SettlementRecord,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
    config: &DisasterConfig,
) -> Option<DisasterEvent> {
    let roll: u32 = rng.random_range(0..BASIS_POINTS);
    if roll >= config.warning_chance_bp {
        return None;
    }

    let kind_index = rng.random_range(0..DisasterKind::ALL.len());
    let kind = DisasterKind::ALL
        .get(kind_index)
        .copied()
        .unwrap_or(DisasterKind::Storm);
    let severity = rng.random_range(1..=config.max_severity.max(1));
    let lead_time = Duration::seconds(i64::from(config.lead_time_secs));

    let event = DisasterEvent {
        id: DisasterId::new(),
        world_id: record.settlement.world_id,
        settlement_id: record.settlement.id,
        kind,
        severity,
        phase: DisasterPhase::Warning,
        warned_at: now,
        impact_at: now.checked_add_signed(lead_time).unwrap_or(now),
        impact: None,
        aftermath_started_at: None,
        repair_window_ends_at: None,
        aftermath_summary: None,
    };
    info!(
        settlement_id = %record.settlement.id,
        kind = %kind,
        severity,
        impact_at = %event.impact_at,
        "disaster warning"
    );
    record.disaster = Some(event.clone());
    Some(event)
}

/// Apply casualties and structural damage for an impact.
pub fn apply_impact(
    record: &mut SettlementRecord,
    severity: u32,
    rng: &mut impl Rng,
    rules: &WorldRules,
) -> ImpactReport {
    let config = &rules.disasters;
    let population = record.population.current;

    let shelter: u32 = record
        .structures
        .iter()
        .map(|s| {
            definition(s.structure_type)
                .effects
                .shelter_capacity
                .saturating_mul(s.level)
        })
        .fold(0, u32::saturating_add);
    let sheltered = population.min(shelter);
    let exposed = population.saturating_sub(sheltered);

    let casualty_share = |count: u32, rate_bp: u32| {
        count
            .saturating_mul(severity)
            .saturating_mul(rate_bp)
            .checked_div(BASIS_POINTS)
            .unwrap_or(0)
    };
    let casualties = casualty_share(exposed, config.exposed_casualty_bp)
        .saturating_add(casualty_share(sheltered, config.sheltered_casualty_bp))
        .min(population.saturating_sub(1));
    record.population.current = population.saturating_sub(casualties);

    let mut health_lost: u32 = 0;
    let mut damaged: u32 = 0;
    let mut destroyed: u32 = 0;
    let damage_min = config.damage_min.min(config.damage_max);

    for structure in &mut record.structures {
        let weakness = 150_u32.saturating_sub(structure.health.min(100));
        let chance = severity
            .saturating_mul(config.hit_chance_bp)
            .saturating_mul(weakness)
            .checked_div(100)
            .unwrap_or(0);
        let roll: u32 = rng.random_range(0..BASIS_POINTS);
        if roll >= chance {
            continue;
        }
        let damage = severity.saturating_mul(rng.random_range(damage_min..=config.damage_max));
        let floor = if structure.structure_type == StructureType::TownHall {
            1
        } else {
            0
        };
        let new_health = structure.health.saturating_sub(damage).max(floor);
        health_lost = health_lost.saturating_add(structure.health.saturating_sub(new_health));
        structure.health = new_health;
        if new_health == 0 {
            destroyed = destroyed.saturating_add(1);
        } else {
            damaged = damaged.saturating_add(1);
        }
    }

    let destroyed_ids: Vec<_> = record
        .structures
        .iter()
        .filter(|s| s.health == 0)
        .map(|s| s.id)
        .collect();
    record.structures.retain(|s| s.health > 0);
    for id in destroyed_ids {
        drop_upgrades_of(record, id);
    }
    recompute_derived(record, rules);

    ImpactReport {
        casualties,
        structures_damaged: damaged,
        structures_destroyed: destroyed,
        total_damage: health_lost.saturating_add(casualties),
    }
}

fn apply_aftermath(
    record: &mut SettlementRecord,
    report: &ImpactReport,
    severity: u32,
    config: &DisasterConfig,
) -> Result<AftermathSummary, WorldError> {
    let losses = aftermath_losses(report.total_damage, config)?;
    let resource_loss = debit(&mut record.storage, &losses);

    let loss = Decimal::from(happiness_loss(severity, config));
    record.population.happiness = record
        .population
        .happiness
        .checked_sub(loss)
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO);

    Ok(AftermathSummary {
        casualties: report.casualties,
        structures_damaged: report.structures_damaged,
        structures_destroyed: report.structures_destroyed,
        total_damage: report.total_damage,
        resource_loss,
        happiness_loss: loss,
    })
}

fn open_repair_window(
    record: &mut SettlementRecord,
    now: DateTime<Utc>,
    rules: &WorldRules,
) -> DateTime<Utc> {
    let window = Duration::hours(i64::from(rules.repairs.emergency_window_hours));
    let end = now.checked_add_signed(window).unwrap_or(now);
    record.settlement.emergency_repair_until = Some(end);
    end
}
