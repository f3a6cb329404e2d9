//! Population dynamics for the Colony simulation.
//!
//! Happiness is a weighted blend of six factors, natural growth follows
//! happiness bands and slows to zero at housing capacity, and migration is
//! rolled once per tick in each direction.
//!
//! # Modules
//!
//! - [`config`] -- Factor weights, thresholds and migration bounds.
//! - [`dynamics`] -- The population tick tying the pieces together.
//! - [`error`] -- Error types for population computations.
//! - [`growth`] -- Band rates and fractional growth accumulation.
//! - [`happiness`] -- The six happiness factors.
//! - [`migration`] -- Immigration and emigration rolls.

pub mod config;
pub mod dynamics;
pub mod error;
pub mod growth;
pub mod happiness;
pub mod migration;

pub use config::{HappinessWeights, PopulationConfig};
pub use dynamics::{PopulationChange, advance_population};
pub use error::PopulationError;
pub use growth::{GrowthOutcome, hourly_growth_rate};
pub use happiness::{HappinessFactors, npc_relations_factor, recent_trauma_factor};
pub use migration::{emigration_chance_bp, immigration_chance_bp};
