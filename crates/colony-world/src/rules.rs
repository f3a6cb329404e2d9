//! The aggregate of every world rule table.
//!
//! [`WorldRules`] is what the tick processors and player commands thread
//! through the pure functions of this crate. It deserializes from the
//! matching sections of the engine configuration file.

use serde::{Deserialize, Serialize};

use crate::accumulation::AccumulationConfig;
use crate::area::AreaConfig;
use crate::construction::ConstructionConfig;
use crate::disaster::DisasterConfig;
use crate::error::WorldError;
use crate::production::ProductionConfig;
use crate::repair::RepairConfig;
use crate::settlement::SettlementConfig;

/// All settlement rule parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldRules {
    /// Founding defaults and base capacities.
    #[serde(default)]
    pub settlement: SettlementConfig,
    /// Build area budget.
    #[serde(default)]
    pub area: AreaConfig,
    /// Offline accumulation tiers.
    #[serde(default)]
    pub accumulation: AccumulationConfig,
    /// Per-capita upkeep.
    #[serde(default)]
    pub production: ProductionConfig,
    /// Construction slots.
    #[serde(default)]
    pub construction: ConstructionConfig,
    /// Disaster probabilities and damage.
    #[serde(default)]
    pub disasters: DisasterConfig,
    /// Repair pacing and emergency discount.
    #[serde(default)]
    pub repairs: RepairConfig,
}

impl WorldRules {
    /// Reject parameter combinations the rules cannot evaluate.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidRule`] naming the first bad parameter.
    pub fn validate(&self) -> Result<(), WorldError> {
        self.accumulation.validate()?;
        if self.construction.active_slots == 0 {
            return Err(WorldError::InvalidRule("construction.active_slots must be > 0"));
        }
        if self.settlement.base_storage_capacity == 0 {
            return Err(WorldError::InvalidRule(
                "settlement.base_storage_capacity must be > 0",
            ));
        }
        if self.disasters.max_severity == 0 {
            return Err(WorldError::InvalidRule("disasters.max_severity must be > 0"));
        }
        if self.disasters.damage_min > self.disasters.damage_max {
            return Err(WorldError::InvalidRule(
                "disasters.damage_min exceeds disasters.damage_max",
            ));
        }
        if self.disasters.warning_chance_bp > 10_000 || self.disasters.hit_chance_bp > 10_000 {
            return Err(WorldError::InvalidRule(
                "disaster chances are basis points and must be <= 10000",
            ));
        }
        if self.repairs.health_per_tick == 0 {
            return Err(WorldError::InvalidRule("repairs.health_per_tick must be > 0"));
        }
        if self.repairs.emergency_discount_pct > 100 {
            return Err(WorldError::InvalidRule(
                "repairs.emergency_discount_pct must be <= 100",
            ));
        }
        Ok(())
    }
}
