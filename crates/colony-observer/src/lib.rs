//! Observer API server and event gateway for the Colony simulation.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Health** (`/api/health`) reporting the scheduler's lifecycle status,
//!   with HTTP 503 once the scheduler has failed
//! - **Tick statistics** (`/api/ticks/stats`, `/api/ticks/report`) served
//!   from the scheduler's [`TickMonitor`]
//! - **`WebSocket` event stream** (`/ws/events`) delivering gateway events
//!   to clients subscribed to world and settlement rooms
//!
//! # Architecture
//!
//! [`EventGateway`] implements the engine's
//! [`Broadcaster`](colony_core::Broadcaster) over a
//! [`tokio::sync::broadcast`] channel. Every `WebSocket` client holds its
//! own receiver and filters messages down to the rooms it asked for.
//! Clients that fall behind skip ahead; the store remains the source of
//! truth and clients resynchronize by re-fetching.
//!
//! [`TickMonitor`]: colony_core::TickMonitor
//! [`EventGateway`]: gateway::EventGateway

pub mod error;
pub mod gateway;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use gateway::EventGateway;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::spawn_observer;
pub use state::AppState;
