//! Scheduler control and health state.
//!
//! Shared between the tick loop, the engine binary (Ctrl-C) and the
//! observer's health endpoint. Hot-path fields are atomics so the loop
//! never waits on a handler.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};

/// Lifecycle status of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Created, loop not yet running.
    Starting,
    /// Loop running.
    Healthy,
    /// Loop exited after a stop request.
    Stopped,
    /// Loop exited on a fatal error.
    Failed,
}

impl HealthStatus {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Healthy => 1,
            Self::Stopped => 2,
            Self::Failed => 3,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Healthy,
            2 => Self::Stopped,
            _ => Self::Failed,
        }
    }
}

/// Health as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Current status.
    pub status: HealthStatus,
    /// Seconds since the control was created.
    pub uptime_secs: i64,
    /// Scheduler wakes completed.
    pub total_ticks: u64,
    /// Why the scheduler failed, if it did.
    pub failure: Option<String>,
}

/// Shared control state of the tick scheduler.
#[derive(Debug)]
pub struct SchedulerControl {
    status: AtomicU8,
    stop_requested: AtomicBool,
    stop_notify: Notify,
    total_ticks: AtomicU64,
    started_at: DateTime<Utc>,
    failure: Mutex<Option<String>>,
}

impl SchedulerControl {
    /// A control in `Starting` state.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            status: AtomicU8::new(HealthStatus::Starting.to_u8()),
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            total_ticks: AtomicU64::new(0),
            started_at,
            failure: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Current status.
    pub fn status(&self) -> HealthStatus {
        HealthStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Mark the loop as running.
    pub fn mark_healthy(&self) {
        self.status
            .store(HealthStatus::Healthy.to_u8(), Ordering::Release);
    }

    /// Mark the loop as cleanly stopped.
    pub fn mark_stopped(&self) {
        self.status
            .store(HealthStatus::Stopped.to_u8(), Ordering::Release);
    }

    /// Mark the loop as failed and remember why.
    pub async fn fail(&self, reason: impl Into<String>) {
        *self.failure.lock().await = Some(reason.into());
        self.status
            .store(HealthStatus::Failed.to_u8(), Ordering::Release);
    }

    /// Why the loop failed, if it did.
    pub async fn failure(&self) -> Option<String> {
        self.failure.lock().await.clone()
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Ask the loop to stop after its current wake.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Resolve once a stop has been requested.
    pub async fn stopped(&self) {
        loop {
            let notified = self.stop_notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }

    // -----------------------------------------------------------------------
    // Counters
    // -----------------------------------------------------------------------

    /// Count one completed wake and return the new total.
    pub fn count_tick(&self) -> u64 {
        self.total_ticks
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    /// Wakes completed so far.
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks.load(Ordering::Acquire)
    }

    /// When the control was created.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Health as of `now`.
    pub async fn health(&self, now: DateTime<Utc>) -> HealthReport {
        HealthReport {
            status: self.status(),
            uptime_secs: now.signed_duration_since(self.started_at).num_seconds().max(0),
            total_ticks: self.total_ticks(),
            failure: self.failure().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn lifecycle_transitions() {
        let control = SchedulerControl::new(Utc::now());
        assert_eq!(control.status(), HealthStatus::Starting);
        control.mark_healthy();
        assert_eq!(control.status(), HealthStatus::Healthy);
        control.fail("store unavailable").await;
        let health = control.health(Utc::now()).await;
        assert_eq!(health.status, HealthStatus::Failed);
        assert_eq!(health.failure.as_deref(), Some("store unavailable"));
    }

    #[tokio::test]
    async fn stop_wakes_waiters() {
        let control = Arc::new(SchedulerControl::new(Utc::now()));
        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.stopped().await })
        };
        tokio::task::yield_now().await;
        control.request_stop();
        assert!(waiter.await.is_ok());
        assert!(control.is_stop_requested());
    }

    #[test]
    fn tick_counter_increments() {
        let control = SchedulerControl::new(Utc::now());
        assert_eq!(control.count_tick(), 1);
        assert_eq!(control.count_tick(), 2);
        assert_eq!(control.total_ticks(), 2);
    }
}
