//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds handles onto the running scheduler: its tick
//! monitor, its control and health state, and the event gateway that the
//! processors broadcast through. Handlers only read; the tick loop never
//! waits on a request.

use std::sync::Arc;

use colony_core::{BroadcastMessage, SchedulerControl, TickMonitor};
use tokio::sync::broadcast;

use crate::gateway::EventGateway;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Rolling tick statistics.
    pub monitor: Arc<TickMonitor>,
    /// Scheduler lifecycle and health.
    pub control: Arc<SchedulerControl>,
    /// Fan-out of engine events to `WebSocket` clients.
    pub gateway: Arc<EventGateway>,
}

impl AppState {
    /// Assemble state from the scheduler's shared handles.
    pub const fn new(
        monitor: Arc<TickMonitor>,
        control: Arc<SchedulerControl>,
        gateway: Arc<EventGateway>,
    ) -> Self {
        Self {
            monitor,
            control,
            gateway,
        }
    }

    /// Subscribe to every engine event.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.gateway.subscribe()
    }
}
