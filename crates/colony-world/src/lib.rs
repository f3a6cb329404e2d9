//! Settlement rules for the Colony simulation.
//!
//! Everything in this crate is a pure function over a
//! [`SettlementRecord`](colony_types::SettlementRecord): no I/O, no clocks,
//! no global state. Time is passed in as `now` and randomness as a caller
//! RNG, so a tick replayed with the same inputs produces the same record.
//!
//! # Modules
//!
//! - [`accumulation`] -- Offline accumulation with tiered diminishing returns.
//! - [`area`] -- Area capacity, usage and reservation summaries.
//! - [`catalog`] -- Structure definitions and level scaling.
//! - [`construction`] -- Slot-limited FIFO construction queue.
//! - [`disaster`] -- Disaster lifecycle state machine.
//! - [`error`] -- Error types for rule evaluation.
//! - [`harvest`] -- The resource tick over storage.
//! - [`production`] -- Extractor production rates and per-capita upkeep.
//! - [`repair`] -- Paid repairs and the emergency repair window.
//! - [`rules`] -- [`WorldRules`], the aggregate of every rule table.
//! - [`settlement`] -- Founding, derived-field recomputation and audits.
//! - [`storage`] -- Clamped resource storage arithmetic.
//! - [`validation`] -- Ordered build and upgrade validation.

pub mod accumulation;
pub mod area;
pub mod catalog;
pub mod construction;
pub mod disaster;
pub mod error;
pub mod harvest;
pub mod production;
pub mod repair;
pub mod rules;
pub mod settlement;
pub mod storage;
pub mod validation;

// Re-export primary types at crate root.
pub use accumulation::{AccumulationConfig, AccumulationTier, accumulate, effective_hours};
pub use area::{AreaConfig, AreaSummary};
pub use catalog::definition;
pub use construction::{
    CompletedItem, ConstructionConfig, ConstructionReport, Demolition, Enqueued,
};
pub use disaster::{DisasterConfig, DisasterTransition};
pub use error::WorldError;
pub use harvest::{HarvestReport, harvest};
pub use production::{HourlyRates, ProductionConfig, production_rate, rate_for_names};
pub use repair::{RepairConfig, RepairProgress, RepairQuote, repair_window_remaining};
pub use rules::WorldRules;
pub use settlement::{AuditFinding, Founding, SettlementConfig, found_settlement};
pub use validation::{BuildPlan, BuildRejection, UniqueConflict, Validation};
