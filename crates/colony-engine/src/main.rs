//! Engine binary for the Colony simulation.
//!
//! Wires the settlement store, the tick scheduler, and the observer server
//! together and runs until `Ctrl-C` or a fatal scheduler error.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `colony-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Restore the store snapshot, or start empty
//! 4. Seed demo settlements into an empty store
//! 5. Start the Observer API server
//! 6. Run the tick scheduler until stopped
//! 7. Write the store snapshot and log the final tick report

mod error;
mod seed;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colony_core::{
    Clock, ColonyConfig, Commands, SchedulerControl, SystemClock, TickContext, TickMonitor,
    TickScheduler,
};
use colony_db::{InMemoryStore, read_snapshot, write_snapshot};
use colony_observer::{AppState, EventGateway, ServerConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "colony-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step fails or the scheduler
/// stops on a fatal error.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config)?;
    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        loop_interval_ms = config.scheduler.loop_interval_ms,
        "colony-engine starting"
    );

    // 3. Restore or create the store.
    let snapshot_path = config.world.snapshot_path.as_ref().map(PathBuf::from);
    let store = Arc::new(open_store(snapshot_path.as_deref()).await?);

    let clock = Arc::new(SystemClock);
    let gateway = Arc::new(EventGateway::new(config.observer.channel_capacity));
    let rules = config.rules();

    // 4. Seed demo settlements.
    if store.is_empty().await {
        let commands = Commands::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::clone(&clock),
            rules.clone(),
        );
        seed::seed_world(&commands, &config.world).await?;
    } else {
        info!(settlements = store.len().await, "store restored, skipping seeding");
    }

    // 5. Start the Observer API server.
    let started_at = clock.now();
    let monitor = Arc::new(TickMonitor::new(
        started_at,
        config.scheduler.monitor_capacity,
        config.scheduler.deviation_warn_ms,
    ));
    let control = Arc::new(SchedulerControl::new(started_at));
    let observer = if config.observer.enabled {
        let state = Arc::new(AppState::new(
            Arc::clone(&monitor),
            Arc::clone(&control),
            Arc::clone(&gateway),
        ));
        let handle = colony_observer::spawn_observer(ServerConfig::from(&config.observer), state)
            .map_err(|e| EngineError::Observer {
                message: format!("{e}"),
            })?;
        Some(handle)
    } else {
        info!("Observer disabled");
        None
    };

    // 6. Run the scheduler, stopping on Ctrl-C.
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Ctrl-C received, stopping scheduler"),
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C, stopping scheduler"),
            }
            control.request_stop();
        });
    }

    let scheduler = TickScheduler::new(
        Arc::clone(&store),
        Arc::clone(&gateway),
        Arc::clone(&clock),
        Arc::clone(&monitor),
        Arc::clone(&control),
        TickContext {
            rules,
            population: config.population.clone(),
            seed: config.world.seed,
        },
        config.scheduler.clone(),
    );
    let result = scheduler.run().await;

    // 7. Persist and report.
    control.request_stop();
    let observer_exit = match observer {
        Some(handle) => handle.await,
        None => Ok(()),
    };
    if let Err(e) = observer_exit {
        warn!(error = %e, "observer task ended abnormally");
    }
    if let Some(path) = snapshot_path.as_deref() {
        write_snapshot(path, &store.snapshot().await).await?;
    }
    info!(
        "final tick report\n{}",
        monitor.report(clock.now()).await
    );

    match result {
        Ok(summary) => {
            info!(total_ticks = summary.total_ticks, "colony-engine shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "colony-engine stopped on a fatal error");
            Err(EngineError::from(e).into())
        }
    }
}

/// Load configuration from `colony-config.yaml`, falling back to defaults.
fn load_config() -> Result<ColonyConfig, EngineError> {
    let path = Path::new(CONFIG_PATH);
    let config = if path.exists() {
        ColonyConfig::from_file(path)?
    } else {
        let mut config = ColonyConfig::default();
        config.apply_env_overrides();
        config
    };
    config.validate()?;
    Ok(config)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `logging.level`.
fn init_logging(config: &ColonyConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_default| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Logging {
        message: format!("{e}"),
    })
}

/// Restore the store from `path`, or start empty.
async fn open_store(path: Option<&Path>) -> Result<InMemoryStore, EngineError> {
    let Some(path) = path else {
        return Ok(InMemoryStore::new());
    };
    match read_snapshot(path).await? {
        Some(snapshot) => {
            info!(
                path = %path.display(),
                settlements = snapshot.settlements.len(),
                taken_at = %snapshot.taken_at,
                "store snapshot restored"
            );
            Ok(InMemoryStore::from_snapshot(snapshot))
        }
        None => {
            info!(path = %path.display(), "no store snapshot found, starting empty");
            Ok(InMemoryStore::new())
        }
    }
}
