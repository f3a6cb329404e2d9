//! Observer HTTP server lifecycle management.
//!
//! Provides [`start_server`] which binds to a TCP port and runs the
//! Axum server until the supplied shutdown future resolves.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use colony_core::config::ObserverConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the Observer server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

impl From<&ObserverConfig> for ServerConfig {
    fn from(config: &ObserverConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

impl ServerConfig {
    /// Parse the bind address.
    pub fn addr(&self) -> Result<SocketAddr, ServerError> {
        let addr_str = format!("{}:{}", self.host, self.port);
        addr_str
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid address {addr_str}: {e}")))
    }
}

/// Start the Observer HTTP server.
///
/// Binds to the configured address, builds the router, and serves
/// requests until `shutdown` resolves. In-flight requests finish before
/// the function returns.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr = config.addr()?;
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "Observer server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("Observer server stopped");
    Ok(())
}

/// Errors that can occur when starting or running the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
