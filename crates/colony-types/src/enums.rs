//! Enumeration types for the settlement simulation.
//!
//! Wire names are stable: resources, structure types and disaster kinds use
//! `snake_case`, while lifecycle states (`QUEUED`, `WARNING`, ...) and
//! structure categories use `SCREAMING_SNAKE_CASE` to match the client
//! protocol.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error returned when a wire name does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` from a single name table.
macro_rules! wire_names {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Stable wire name of this variant.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// One of the five stored resources every settlement tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ResourceType {
    /// Feeds the population.
    Food,
    /// Drinking and sanitation water.
    Water,
    /// Lumber for construction.
    Wood,
    /// Quarried stone for construction.
    Stone,
    /// Raw ore for advanced construction.
    Ore,
}

impl ResourceType {
    /// All resource types in storage order.
    pub const ALL: [Self; 5] = [Self::Food, Self::Water, Self::Wood, Self::Stone, Self::Ore];
}

wire_names!(ResourceType, "resource type", {
    Food => "food",
    Water => "water",
    Wood => "wood",
    Stone => "stone",
    Ore => "ore",
});

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

/// Broad structure category.
///
/// `Building`s consume settlement area and provide settlement-wide effects.
/// `Extractor`s occupy resource tiles and produce raw resources; they never
/// consume area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum StructureCategory {
    /// Area-consuming settlement building.
    Building,
    /// Resource-producing extractor.
    Extractor,
}

/// Every kind of structure that can exist in a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StructureType {
    // --- Buildings ---
    /// Seat of government. Its level gates construction and grants area.
    TownHall,
    /// Basic housing.
    House,
    /// Spacious housing with a quality bonus.
    Manor,
    /// Disaster shelter.
    Shelter,
    /// Treats the injured; improves disaster preparedness.
    Hospital,
    /// Early-warning post for incoming disasters.
    Watchtower,
    /// Garrison adding defense rating.
    Barracks,
    /// Fortification adding defense rating.
    Wall,
    /// Social hub raising morale.
    Tavern,
    /// Place of worship raising morale.
    Temple,
    /// Extra food storage.
    Granary,
    /// Extra water storage.
    Cistern,
    /// Extra wood, stone and ore storage.
    Warehouse,

    // --- Extractors ---
    /// Crop fields producing food.
    Farm,
    /// Fishing dock producing food.
    FishingDock,
    /// Well producing water.
    Well,
    /// Lumber mill producing wood.
    LumberMill,
    /// Quarry producing stone.
    Quarry,
    /// Mine producing ore (and a little stone).
    Mine,
}

impl StructureType {
    /// Every structure type, buildings first.
    pub const ALL: [Self; 19] = [
        Self::TownHall,
        Self::House,
        Self::Manor,
        Self::Shelter,
        Self::Hospital,
        Self::Watchtower,
        Self::Barracks,
        Self::Wall,
        Self::Tavern,
        Self::Temple,
        Self::Granary,
        Self::Cistern,
        Self::Warehouse,
        Self::Farm,
        Self::FishingDock,
        Self::Well,
        Self::LumberMill,
        Self::Quarry,
        Self::Mine,
    ];
}

wire_names!(StructureType, "structure type", {
    TownHall => "town_hall",
    House => "house",
    Manor => "manor",
    Shelter => "shelter",
    Hospital => "hospital",
    Watchtower => "watchtower",
    Barracks => "barracks",
    Wall => "wall",
    Tavern => "tavern",
    Temple => "temple",
    Granary => "granary",
    Cistern => "cistern",
    Warehouse => "warehouse",
    Farm => "farm",
    FishingDock => "fishing_dock",
    Well => "well",
    LumberMill => "lumber_mill",
    Quarry => "quarry",
    Mine => "mine",
});

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Lifecycle status of a construction queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum QueueStatus {
    /// Waiting for a free construction slot (FIFO).
    Queued,
    /// Occupying a construction slot; the build timer is running.
    Active,
    /// Finished; the structure has been instantiated.
    Complete,
}

// ---------------------------------------------------------------------------
// Disasters
// ---------------------------------------------------------------------------

/// Phase of the disaster state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum DisasterPhase {
    /// No disaster in progress.
    Dormant,
    /// A disaster is approaching; impact follows after the lead time.
    Warning,
    /// The disaster struck; damage has been applied.
    Impact,
    /// Post-disaster period with the emergency repair window open.
    Aftermath,
}

/// The kind of natural disaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DisasterKind {
    /// Ground shaking; hard on stone buildings.
    Earthquake,
    /// Rising water.
    Flood,
    /// Spreading fire.
    Wildfire,
    /// Violent storm.
    Storm,
}

impl DisasterKind {
    /// All disaster kinds, used for uniform random selection.
    pub const ALL: [Self; 4] = [Self::Earthquake, Self::Flood, Self::Wildfire, Self::Storm];
}

wire_names!(DisasterKind, "disaster kind", {
    Earthquake => "earthquake",
    Flood => "flood",
    Wildfire => "wildfire",
    Storm => "storm",
});

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// A scheduled simulation subsystem.
///
/// Declaration order is the firing order used when several subsystems
/// become due on the same scheduler wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Subsystem {
    /// Construction completion sweep.
    Construction,
    /// Hourly resource production.
    Resources,
    /// Hourly population dynamics.
    Population,
    /// Hourly repair progress.
    Repairs,
    /// Periodic disaster check.
    Disasters,
}

impl Subsystem {
    /// All subsystems in firing order.
    pub const ALL: [Self; 5] = [
        Self::Construction,
        Self::Resources,
        Self::Population,
        Self::Repairs,
        Self::Disasters,
    ];
}

wire_names!(Subsystem, "subsystem", {
    Construction => "construction",
    Resources => "resources",
    Population => "population",
    Repairs => "repairs",
    Disasters => "disasters",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_type_names_round_trip() {
        for structure_type in StructureType::ALL {
            let parsed: Result<StructureType, _> = structure_type.as_str().parse();
            assert_eq!(parsed.ok(), Some(structure_type));
        }
    }

    #[test]
    fn unknown_resource_name_is_rejected() {
        let parsed = "gold".parse::<ResourceType>();
        assert_eq!(
            parsed,
            Err(UnknownVariant {
                kind: "resource type",
                value: String::from("gold"),
            })
        );
    }

    #[test]
    fn serde_names_match_wire_names() {
        let json = serde_json::to_string(&StructureType::FishingDock).ok();
        assert_eq!(json.as_deref(), Some("\"fishing_dock\""));
        let json = serde_json::to_string(&QueueStatus::Active).ok();
        assert_eq!(json.as_deref(), Some("\"ACTIVE\""));
        let json = serde_json::to_string(&StructureCategory::Extractor).ok();
        assert_eq!(json.as_deref(), Some("\"EXTRACTOR\""));
    }

    #[test]
    fn subsystems_fire_in_declared_order() {
        let mut sorted = Subsystem::ALL;
        sorted.sort();
        assert_eq!(sorted, Subsystem::ALL);
        assert_eq!(Subsystem::ALL.first(), Some(&Subsystem::Construction));
        assert_eq!(Subsystem::ALL.last(), Some(&Subsystem::Disasters));
    }
}
