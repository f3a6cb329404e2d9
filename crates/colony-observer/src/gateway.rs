//! In-process broadcast gateway.
//!
//! [`EventGateway`] is the production [`Broadcaster`]: every message the
//! engine emits goes into one [`broadcast`] channel, and each `WebSocket`
//! connection subscribes and filters by room. A send with no subscribers
//! is not an error; nobody is watching.

use tokio::sync::broadcast;

use colony_core::{BroadcastError, BroadcastMessage, Broadcaster, Room};

/// Default number of messages buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of engine events to connected clients.
#[derive(Debug, Clone)]
pub struct EventGateway {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl EventGateway {
    /// A gateway buffering `capacity` messages per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to every message.
    ///
    /// A subscriber that falls more than `capacity` messages behind
    /// receives [`broadcast::error::RecvError::Lagged`] and skips to the
    /// oldest message still buffered.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.tx.subscribe()
    }

    /// Connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventGateway {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster for EventGateway {
    fn send(&self, message: BroadcastMessage) -> Result<(), BroadcastError> {
        // Err only means no client is connected right now.
        let delivered = self.tx.send(message).unwrap_or(0);
        tracing::trace!(delivered, "gateway message sent");
        Ok(())
    }
}

/// Rooms a client asked to watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomFilter {
    /// Rooms to deliver.
    pub rooms: Vec<Room>,
}

impl RoomFilter {
    /// Whether a message belongs to one of the watched rooms. An empty
    /// filter watches everything.
    pub fn accepts(&self, message: &BroadcastMessage) -> bool {
        self.rooms.is_empty() || self.rooms.contains(&message.room)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use colony_core::GatewayEvent;
    use colony_types::{SettlementId, WorldId};

    use super::*;

    fn message(room: Room) -> BroadcastMessage {
        BroadcastMessage::new(room, GatewayEvent::ResourceUpdate, &serde_json::json!({}), Utc::now())
            .unwrap()
    }

    #[test]
    fn send_without_subscribers_is_ok() {
        let gateway = EventGateway::default();
        assert_eq!(gateway.subscriber_count(), 0);
        assert!(gateway.send(message(Room::World(WorldId::new()))).is_ok());
    }

    #[tokio::test]
    async fn subscribers_receive_messages() {
        let gateway = EventGateway::new(8);
        let mut rx = gateway.subscribe();
        let room = Room::Settlement(SettlementId::new());
        gateway.send(message(room)).unwrap();
        assert_eq!(rx.recv().await.unwrap().room, room);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let gateway = EventGateway::new(2);
        let mut rx = gateway.subscribe();
        for _ in 0..5 {
            gateway.send(message(Room::World(WorldId::new()))).unwrap();
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn filter_matches_rooms() {
        let world = Room::World(WorldId::new());
        let other = Room::Settlement(SettlementId::new());
        let filter = RoomFilter { rooms: vec![world] };
        assert!(filter.accepts(&message(world)));
        assert!(!filter.accepts(&message(other)));
        assert!(RoomFilter::default().accepts(&message(other)));
    }
}
