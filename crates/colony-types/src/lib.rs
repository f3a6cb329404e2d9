//! Shared type definitions for the Colony settlement simulation.
//!
//! This crate is the single source of truth for every type that crosses a
//! crate boundary in the Colony workspace. Types flow downstream to
//! `TypeScript` via `ts-rs` so the web client and the observer speak the
//! same shapes as the engine.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Resources, structure kinds, lifecycle phases, subsystems
//! - [`structs`] -- Settlement aggregate, storage, population, structures,
//!   construction queue and disaster records

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    DisasterKind, DisasterPhase, QueueStatus, ResourceType, StructureCategory, StructureType,
    Subsystem, UnknownVariant,
};
pub use ids::{DisasterId, PlayerId, QueueItemId, SettlementId, StructureId, WorldId};
pub use structs::{
    AftermathSummary, ConstructionAction, ConstructionQueueItem, DisasterEvent, ImpactReport,
    Population, ResourceAmounts, ResourceStock, ResourceStorage, Settlement, SettlementRecord,
    StructureDefinition, StructureEffects, StructureInstance,
};
