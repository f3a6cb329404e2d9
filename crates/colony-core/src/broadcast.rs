//! The broadcast gateway consumed by the engine.
//!
//! The core only emits named events into rooms; delivery and connection
//! lifecycle belong to the gateway implementation (the observer's
//! WebSocket hub in production). Delivery is best effort: authoritative
//! state lives in the store and clients resynchronize by re-fetching.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use colony_types::{SettlementId, WorldId};

/// Errors raised while emitting an event.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The payload could not be serialized.
    #[error("failed to serialize broadcast payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The gateway refused or lost the message.
    #[error("broadcast delivery failed: {0}")]
    Delivery(String),
}

/// Audience of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Room {
    /// Every client watching a world.
    World(WorldId),
    /// Clients watching one settlement.
    Settlement(SettlementId),
}

/// Named events emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GatewayEvent {
    /// Storage changed after a resource tick or offline collection.
    ResourceUpdate,
    /// Population changed after a population tick.
    PopulationUpdate,
    /// Queue items completed or were promoted.
    ConstructionUpdate,
    /// Repairs progressed.
    RepairUpdate,
    /// A disaster is about to strike.
    DisasterWarning,
    /// A disaster struck.
    DisasterImpact,
    /// A disaster's aftermath began.
    DisasterAftermath,
    /// A disaster's aftermath ended.
    DisasterCleared,
}

impl GatewayEvent {
    /// Wire name of the event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceUpdate => "resource-update",
            Self::PopulationUpdate => "population-update",
            Self::ConstructionUpdate => "construction-update",
            Self::RepairUpdate => "repair-update",
            Self::DisasterWarning => "disaster-warning",
            Self::DisasterImpact => "disaster-impact",
            Self::DisasterAftermath => "disaster-aftermath",
            Self::DisasterCleared => "disaster-cleared",
        }
    }
}

impl fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message addressed to a room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    /// Audience.
    pub room: Room,
    /// Event name.
    pub event: GatewayEvent,
    /// JSON payload.
    pub payload: serde_json::Value,
    /// When the engine emitted it.
    pub sent_at: DateTime<Utc>,
}

impl BroadcastMessage {
    /// Serialize a payload into a message.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Payload`] if serialization fails.
    pub fn new(
        room: Room,
        event: GatewayEvent,
        payload: &impl Serialize,
        sent_at: DateTime<Utc>,
    ) -> Result<Self, BroadcastError> {
        Ok(Self {
            room,
            event,
            payload: serde_json::to_value(payload)?,
            sent_at,
        })
    }
}

/// A sink for engine events.
pub trait Broadcaster: Send + Sync + 'static {
    /// Deliver a message to its room.
    fn send(&self, message: BroadcastMessage) -> Result<(), BroadcastError>;

    /// Emit an event to every client watching a world.
    fn to_world(
        &self,
        world_id: WorldId,
        event: GatewayEvent,
        payload: &impl Serialize,
    ) -> Result<(), BroadcastError> {
        self.send(BroadcastMessage::new(
            Room::World(world_id),
            event,
            payload,
            Utc::now(),
        )?)
    }

    /// Emit an event to clients watching one settlement.
    fn to_settlement(
        &self,
        settlement_id: SettlementId,
        event: GatewayEvent,
        payload: &impl Serialize,
    ) -> Result<(), BroadcastError> {
        self.send(BroadcastMessage::new(
            Room::Settlement(settlement_id),
            event,
            payload,
            Utc::now(),
        )?)
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn send(&self, _message: BroadcastMessage) -> Result<(), BroadcastError> {
        Ok(())
    }
}

/// Keeps every message in memory; can be told to fail deliveries.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    messages: Mutex<Vec<BroadcastMessage>>,
    failing: AtomicBool,
}

impl RecordingBroadcaster {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far.
    pub fn messages(&self) -> Vec<BroadcastMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of delivered events, in order.
    pub fn events(&self) -> Vec<GatewayEvent> {
        self.messages().into_iter().map(|m| m.event).collect()
    }

    /// Make subsequent deliveries fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn send(&self, message: BroadcastMessage) -> Result<(), BroadcastError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(BroadcastError::Delivery(String::from("recorder offline")));
        }
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_kebab_case() {
        assert_eq!(GatewayEvent::DisasterAftermath.as_str(), "disaster-aftermath");
        let json = serde_json::to_string(&GatewayEvent::ResourceUpdate).ok();
        assert_eq!(json.as_deref(), Some("\"resource-update\""));
    }

    #[test]
    fn recorder_captures_and_fails_on_demand() {
        let recorder = RecordingBroadcaster::new();
        let world = WorldId::new();
        assert!(
            recorder
                .to_world(world, GatewayEvent::DisasterWarning, &serde_json::json!({"severity": 3}))
                .is_ok()
        );
        recorder.set_failing(true);
        assert!(
            recorder
                .to_world(world, GatewayEvent::DisasterImpact, &serde_json::json!({}))
                .is_err()
        );
        let messages = recorder.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages.first().map(|m| m.room), Some(Room::World(world)));
    }
}
