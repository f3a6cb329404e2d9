//! Population dynamics parameters.

use serde::{Deserialize, Serialize};

use crate::error::PopulationError;

/// Weights of the six happiness factors, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HappinessWeights {
    /// Food and water buffer.
    #[serde(default = "default_resource_weight")]
    pub resource_sufficiency: u32,
    /// Crowding and housing bonuses.
    #[serde(default = "default_housing_weight")]
    pub housing_quality: u32,
    /// Shelters, warning systems, medical care, defense.
    #[serde(default = "default_preparedness_weight")]
    pub disaster_preparedness: u32,
    /// Lingering effect of past disasters.
    #[serde(default = "default_trauma_weight")]
    pub recent_trauma: u32,
    /// Structure morale modifiers.
    #[serde(default = "default_morale_weight")]
    pub morale: u32,
    /// Relations with neighbouring NPC factions.
    #[serde(default = "default_npc_weight")]
    pub npc_relations: u32,
}

impl Default for HappinessWeights {
    fn default() -> Self {
        Self {
            resource_sufficiency: default_resource_weight(),
            housing_quality: default_housing_weight(),
            disaster_preparedness: default_preparedness_weight(),
            recent_trauma: default_trauma_weight(),
            morale: default_morale_weight(),
            npc_relations: default_npc_weight(),
        }
    }
}

impl HappinessWeights {
    /// Sum of all weights.
    pub const fn total(&self) -> u32 {
        self.resource_sufficiency
            .saturating_add(self.housing_quality)
            .saturating_add(self.disaster_preparedness)
            .saturating_add(self.recent_trauma)
            .saturating_add(self.morale)
            .saturating_add(self.npc_relations)
    }
}

const fn default_resource_weight() -> u32 {
    30
}
const fn default_housing_weight() -> u32 {
    20
}
const fn default_preparedness_weight() -> u32 {
    15
}
const fn default_trauma_weight() -> u32 {
    15
}
const fn default_morale_weight() -> u32 {
    15
}
const fn default_npc_weight() -> u32 {
    5
}

/// Population dynamics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Happiness factor weights.
    #[serde(default)]
    pub weights: HappinessWeights,
    /// Hours of food and water buffer at which sufficiency saturates.
    #[serde(default = "default_buffer_saturation_hours")]
    pub buffer_saturation_hours: u32,
    /// Longest gap credited to growth in one tick.
    #[serde(default = "default_max_growth_hours")]
    pub max_growth_hours: u32,
    /// Happiness at or above which immigrants may arrive.
    #[serde(default = "default_immigration_threshold")]
    pub immigration_threshold: u32,
    /// Happiness at or below which residents may leave.
    #[serde(default = "default_emigration_threshold")]
    pub emigration_threshold: u32,
    /// Ceiling on a migration roll's chance, in basis points.
    #[serde(default = "default_max_migration_chance_bp")]
    pub max_migration_chance_bp: u32,
    /// Smallest group of immigrants.
    #[serde(default = "default_immigration_min")]
    pub immigration_min: u32,
    /// Largest group of immigrants.
    #[serde(default = "default_immigration_max")]
    pub immigration_max: u32,
    /// Smallest group of emigrants.
    #[serde(default = "default_emigration_min")]
    pub emigration_min: u32,
    /// Largest group of emigrants.
    #[serde(default = "default_emigration_max")]
    pub emigration_max: u32,
    /// Cap on one migration event as a percentage of current population.
    #[serde(default = "default_migration_cap_pct")]
    pub migration_cap_pct: u32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            weights: HappinessWeights::default(),
            buffer_saturation_hours: default_buffer_saturation_hours(),
            max_growth_hours: default_max_growth_hours(),
            immigration_threshold: default_immigration_threshold(),
            emigration_threshold: default_emigration_threshold(),
            max_migration_chance_bp: default_max_migration_chance_bp(),
            immigration_min: default_immigration_min(),
            immigration_max: default_immigration_max(),
            emigration_min: default_emigration_min(),
            emigration_max: default_emigration_max(),
            migration_cap_pct: default_migration_cap_pct(),
        }
    }
}

const fn default_buffer_saturation_hours() -> u32 {
    72
}
const fn default_max_growth_hours() -> u32 {
    24
}
const fn default_immigration_threshold() -> u32 {
    75
}
const fn default_emigration_threshold() -> u32 {
    35
}
const fn default_max_migration_chance_bp() -> u32 {
    5000
}
const fn default_immigration_min() -> u32 {
    2
}
const fn default_immigration_max() -> u32 {
    5
}
const fn default_emigration_min() -> u32 {
    1
}
const fn default_emigration_max() -> u32 {
    3
}
const fn default_migration_cap_pct() -> u32 {
    20
}

impl PopulationConfig {
    /// Reject configurations the engine cannot evaluate.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::InvalidConfig`] naming the first problem.
    pub const fn validate(&self) -> Result<(), PopulationError> {
        if self.weights.total() != 100 {
            return Err(PopulationError::InvalidConfig(
                "happiness weights must sum to 100",
            ));
        }
        if self.buffer_saturation_hours == 0 {
            return Err(PopulationError::InvalidConfig(
                "buffer_saturation_hours must be > 0",
            ));
        }
        if self.immigration_threshold >= 100 || self.emigration_threshold == 0 {
            return Err(PopulationError::InvalidConfig(
                "migration thresholds must lie strictly inside 0..100",
            ));
        }
        if self.emigration_threshold >= self.immigration_threshold {
            return Err(PopulationError::InvalidConfig(
                "emigration_threshold must be below immigration_threshold",
            ));
        }
        if self.immigration_min > self.immigration_max || self.emigration_min > self.emigration_max
        {
            return Err(PopulationError::InvalidConfig(
                "migration group bounds are inverted",
            ));
        }
        if self.max_migration_chance_bp > 10_000 {
            return Err(PopulationError::InvalidConfig(
                "max_migration_chance_bp must be <= 10000",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one_hundred() {
        assert_eq!(HappinessWeights::default().total(), 100);
        assert!(PopulationConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: PopulationConfig = serde_yml::from_str("{}").unwrap();
        assert_eq!(config, PopulationConfig::default());
    }

    #[test]
    fn unbalanced_weights_rejected() {
        let mut config = PopulationConfig::default();
        config.weights.morale = 40;
        assert!(config.validate().is_err());
    }
}
