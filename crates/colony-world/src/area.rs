//! Settlement area budget.
//!
//! Area is the abstract floor space consumed by `BUILDING` structures.
//! Capacity is `base + per_town_hall_level × town_hall_level`; extractors
//! and zero-cost buildings never consume it.

use serde::{Deserialize, Serialize};

use colony_types::{
    ConstructionQueueItem, QueueStatus, SettlementRecord, StructureCategory, StructureInstance,
};

use crate::catalog::definition;

/// Area capacity parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaConfig {
    /// Capacity with no Town Hall.
    #[serde(default = "default_base_capacity")]
    pub base_capacity: u32,
    /// Capacity granted per Town Hall level.
    #[serde(default = "default_per_town_hall_level")]
    pub per_town_hall_level: u32,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            base_capacity: default_base_capacity(),
            per_town_hall_level: default_per_town_hall_level(),
        }
    }
}

const fn default_base_capacity() -> u32 {
    500
}

const fn default_per_town_hall_level() -> u32 {
    100
}

/// Point-in-time view of a settlement's area budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaSummary {
    /// Total capacity.
    pub capacity: u32,
    /// Consumed by standing buildings.
    pub used: u32,
    /// Held by construction queue items that have not completed.
    pub reserved: u32,
    /// `capacity - used`.
    pub available: u32,
    /// `available - reserved`: what a new build request may still claim.
    pub buildable: u32,
}

/// Area capacity for a Town Hall level.
pub const fn area_capacity(town_hall_level: u32, config: &AreaConfig) -> u32 {
    config
        .base_capacity
        .saturating_add(config.per_town_hall_level.saturating_mul(town_hall_level))
}

/// Area consumed by standing `BUILDING` structures.
pub fn area_used(structures: &[StructureInstance]) -> u32 {
    structures
        .iter()
        .filter(|s| s.category == StructureCategory::Building)
        .map(|s| definition(s.structure_type).area_cost)
        .fold(0, u32::saturating_add)
}

/// Area held by every queue item that has not completed.
pub fn reserved_area(queue: &[ConstructionQueueItem]) -> u32 {
    queue
        .iter()
        .filter(|item| item.status != QueueStatus::Complete)
        .map(|item| item.area_reserved)
        .fold(0, u32::saturating_add)
}

/// Summarize the cached area fields of a settlement.
pub fn summarize(record: &SettlementRecord) -> AreaSummary {
    let capacity = record.settlement.area_capacity;
    let used = record.settlement.area_used;
    let reserved = reserved_area(&record.queue);
    let available = capacity.saturating_sub(used);
    AreaSummary {
        capacity,
        used,
        reserved,
        available,
        buildable: available.saturating_sub(reserved),
    }
}
