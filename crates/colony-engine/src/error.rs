//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and scheduler execution.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: colony_core::ConfigError,
    },

    /// The settlement store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: colony_db::StoreError,
    },

    /// A command issued while seeding failed.
    #[error("command error: {source}")]
    Command {
        /// The underlying command error.
        #[from]
        source: colony_core::CommandError,
    },

    /// The tick scheduler stopped on a fatal error.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: colony_core::SchedulerError,
    },

    /// Observer API server failed to start.
    #[error("observer error: {message}")]
    Observer {
        /// Description of the observer failure.
        message: String,
    },

    /// Logging could not be initialized.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}
