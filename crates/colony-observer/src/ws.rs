//! `WebSocket` handler for real-time engine events.
//!
//! Clients connect to `GET /ws/events` and join rooms through query
//! parameters: every `world` parameter joins a world room, every
//! `settlement` parameter a settlement room. Without parameters a client
//! receives everything. Each [`BroadcastMessage`] is sent as one JSON
//! text frame.
//!
//! If a client falls behind, lagged messages are skipped and the client
//! resumes from the oldest buffered message.
//!
//! [`BroadcastMessage`]: colony_core::BroadcastMessage

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{RawQuery, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use colony_core::Room;
use colony_types::{SettlementId, WorldId};
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::gateway::RoomFilter;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming events for the requested rooms.
///
/// # Route
///
/// `GET /ws/events?world={id}&settlement={id}`
///
/// A malformed room id is rejected with 400 before the upgrade is
/// checked.
pub async fn ws_events(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ObserverError> {
    let filter = parse_rooms(query.as_deref().unwrap_or(""))?;
    Ok(match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_ws(socket, state, filter))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    })
}

/// Parse `world` and `settlement` query parameters into a room filter.
///
/// Unknown parameters are ignored.
pub fn parse_rooms(query: &str) -> Result<RoomFilter, ObserverError> {
    let mut rooms = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let room = match key {
            "world" => WorldId::from_str(value).map(Room::World),
            "settlement" => SettlementId::from_str(value).map(Room::Settlement),
            _ => continue,
        };
        let room = room.map_err(|e| ObserverError::InvalidUuid(format!("{key}={value}: {e}")))?;
        if !rooms.contains(&room) {
            rooms.push(room);
        }
    }
    Ok(RoomFilter { rooms })
}

/// Handle the `WebSocket` lifecycle: subscribe to the gateway and
/// forward each matching message as a text frame.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, filter: RoomFilter) {
    debug!(rooms = filter.rooms.len(), "WebSocket client connected");

    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(message) => {
                        if !filter.accepts(&message) {
                            continue;
                        }
                        let json = match serde_json::to_string(&message) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!(event = %message.event, "Failed to serialize event: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Gateway closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    // Clients only listen.
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_watches_everything() {
        assert!(parse_rooms("").unwrap().rooms.is_empty());
    }

    #[test]
    fn world_and_settlement_rooms_are_parsed() {
        let world = WorldId::new();
        let settlement = SettlementId::new();
        let filter =
            parse_rooms(&format!("world={world}&settlement={settlement}&world={world}&x=1")).unwrap();
        assert_eq!(
            filter.rooms,
            vec![Room::World(world), Room::Settlement(settlement)]
        );
    }

    #[test]
    fn malformed_id_is_rejected() {
        assert!(matches!(
            parse_rooms("settlement=not-a-uuid"),
            Err(ObserverError::InvalidUuid(_))
        ));
    }
}
