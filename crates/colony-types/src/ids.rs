//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every persisted entity in the settlement simulation carries a distinct ID
//! type so that a structure ID can never be passed where a settlement ID is
//! expected. All IDs use UUID v7 (time-ordered) so that index order follows
//! creation order.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a persistent world (a broadcast room).
    WorldId
}

define_id! {
    /// Unique identifier for a player account (owned externally).
    PlayerId
}

define_id! {
    /// Unique identifier for a settlement.
    SettlementId
}

define_id! {
    /// Unique identifier for a structure instance inside a settlement.
    StructureId
}

define_id! {
    /// Unique identifier for a construction queue item.
    QueueItemId
}

define_id! {
    /// Unique identifier for a disaster event.
    DisasterId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let settlement = SettlementId::new();
        let structure = StructureId::new();
        assert_ne!(settlement.into_inner(), Uuid::nil());
        assert_ne!(structure.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_parses_from_display() {
        let id = SettlementId::new();
        let parsed: Result<SettlementId, _> = id.to_string().parse();
        assert_eq!(parsed.ok(), Some(id));
    }

    #[test]
    fn id_serializes_as_plain_uuid_string() {
        let id = WorldId::new();
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json, Some(format!("\"{id}\"")));
    }
}
