//! Observer server startup helper for embedding in the engine.
//!
//! Provides [`spawn_observer`] which launches the Observer HTTP + `WebSocket`
//! server on a background Tokio task. The server shuts down together with
//! the scheduler: once a stop is requested on the shared
//! [`SchedulerControl`](colony_core::SchedulerControl), in-flight requests
//! drain and the task exits.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the Observer HTTP server on a background Tokio task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address does not
/// parse. Bind failures surface inside the task and are logged.
pub fn spawn_observer(
    config: ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let addr = config.addr()?;

    let control = Arc::clone(&state.control);
    let shutdown = async move { control.stopped().await };

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::start_server(&config, state, shutdown).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok(handle)
}
