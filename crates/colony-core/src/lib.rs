//! Clock, configuration, tick scheduling and player commands for the Colony
//! simulation.
//!
//! This crate owns the real-time side of the engine: a single cooperative
//! loop that fires every subsystem on its tick window, fans settlement work
//! out over a bounded worker pool, and records timing in a monitor that
//! operators can query. Player commands share the store's per-settlement
//! transactions with the tick processors.
//!
//! # Modules
//!
//! - [`broadcast`] -- [`Broadcaster`] trait, rooms and event names.
//! - [`clock`] -- [`Clock`] abstraction with system and mock clocks.
//! - [`commands`] -- Player commands run outside the tick loop.
//! - [`config`] -- Configuration loading from `colony-config.yaml` into
//!   strongly-typed structs.
//! - [`control`] -- Scheduler health and stop control.
//! - [`monitor`] -- Rolling tick timing statistics and reports.
//! - [`pool`] -- Bounded fan-out over settlements.
//! - [`processors`] -- Per-settlement subsystem processing.
//! - [`schedule`] -- Tick windows and due-window computation.
//! - [`scheduler`] -- The tick loop.
//!
//! [`Broadcaster`]: broadcast::Broadcaster
//! [`Clock`]: clock::Clock

pub mod broadcast;
pub mod clock;
pub mod commands;
pub mod config;
pub mod control;
pub mod monitor;
pub mod pool;
pub mod processors;
pub mod schedule;
pub mod scheduler;

pub use broadcast::{
    BroadcastError, BroadcastMessage, Broadcaster, GatewayEvent, NullBroadcaster,
    RecordingBroadcaster, Room,
};
pub use clock::{Clock, ClockError, MockClock, SystemClock};
pub use commands::{CommandError, Commands};
pub use config::{ColonyConfig, ConfigError, SchedulerConfig};
pub use control::{HealthReport, HealthStatus, SchedulerControl};
pub use monitor::{MonitorSnapshot, TickMonitor};
pub use processors::{ProcessError, TickContext};
pub use schedule::{DueFiring, ScheduleError, TickWindows, WindowPolicy};
pub use scheduler::{RunSummary, SchedulerError, TickScheduler, WakeSummary};
