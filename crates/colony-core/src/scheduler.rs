//! The tick scheduler.
//!
//! A single cooperative loop wakes every `loop_interval_ms`, asks the
//! [`TickWindows`] which subsystems have an unfired window, and runs each
//! due subsystem over every settlement through the bounded worker pool.
//! The last-fired window of each subsystem is written to the store before
//! its batch is dispatched, so a restart at the boundary second cannot fire
//! the same window twice.
//!
//! ```text
//! wake
//!   +-- due(now, fired) ----------> [construction, resources, population,
//!   |                                 repairs, disasters] (firing order)
//!   +-- for each due subsystem:
//!   |     record_fired(window)  --> store
//!   |     run_batch(settlements) -> process_settlement x N
//!   +-- monitor.record(sample)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info, warn};

use colony_db::{FiredWindows, SettlementStore, StoreError};
use colony_types::Subsystem;

use crate::broadcast::Broadcaster;
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::control::SchedulerControl;
use crate::monitor::{FiringSample, TickMonitor, TickSample};
use crate::pool::{PoolError, effective_parallelism, run_batch};
use crate::processors::{TickContext, process_settlement};
use crate::schedule::{DueFiring, ScheduleError, TickWindows};

/// Fatal scheduler errors. Any of these stops the loop.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Window computation failed.
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// The store could not list settlements or persist a fired window.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A batch task panicked.
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),
}

/// What one wake did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeSummary {
    /// Tick number of the wake.
    pub tick: u64,
    /// When the wake started.
    pub at: DateTime<Utc>,
    /// Subsystems that ran.
    pub firings: Vec<FiringSample>,
    /// Subsystems whose window was missed beyond the grace period.
    pub skipped: Vec<Subsystem>,
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Wakes completed.
    pub total_ticks: u64,
}

/// Drives every subsystem on its windows.
pub struct TickScheduler<S, B, C> {
    store: Arc<S>,
    broadcaster: Arc<B>,
    clock: Arc<C>,
    monitor: Arc<TickMonitor>,
    control: Arc<SchedulerControl>,
    ctx: Arc<TickContext>,
    windows: TickWindows,
    config: SchedulerConfig,
    fired: FiredWindows,
    last_report_at: Option<DateTime<Utc>>,
}

impl<S, B, C> TickScheduler<S, B, C>
where
    S: SettlementStore,
    B: Broadcaster,
    C: Clock,
{
    /// Wire a scheduler. Call [`load_fired`](Self::load_fired) (or
    /// [`run`](Self::run), which does) before the first wake.
    pub fn new(
        store: Arc<S>,
        broadcaster: Arc<B>,
        clock: Arc<C>,
        monitor: Arc<TickMonitor>,
        control: Arc<SchedulerControl>,
        ctx: TickContext,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            clock,
            monitor,
            control,
            ctx: Arc::new(ctx),
            windows: TickWindows::from_config(&config),
            config,
            fired: FiredWindows::new(),
            last_report_at: None,
        }
    }

    /// Reload last-fired windows from the store.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Store`] if the store cannot be read.
    pub async fn load_fired(&mut self) -> Result<(), SchedulerError> {
        self.fired = self.store.fired_windows().await?;
        Ok(())
    }

    /// Last-fired window per subsystem, as the scheduler sees it.
    pub const fn fired(&self) -> &FiredWindows {
        &self.fired
    }

    /// Run one wake: fire every due subsystem in order.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] on a fatal failure. Per-settlement
    /// failures are logged and counted, not returned.
    pub async fn wake(&mut self) -> Result<WakeSummary, SchedulerError> {
        let at = self.clock.now();
        let started = Instant::now();
        let mut firings = Vec::new();
        let mut skipped = Vec::new();

        for due in self.windows.due(at, &self.fired)? {
            self.store.record_fired(due.subsystem, due.window_id).await?;
            self.fired.insert(due.subsystem, due.window_id);
            if due.missed {
                warn!(
                    subsystem = %due.subsystem,
                    window_id = due.window_id,
                    expected_at = %due.expected_at,
                    "window missed beyond grace period, skipping"
                );
                skipped.push(due.subsystem);
                continue;
            }
            firings.push(self.fire(due).await?);
        }

        let tick = self.control.count_tick();
        let duration_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.monitor
            .record(TickSample {
                tick,
                at,
                duration_us,
                firings: firings.clone(),
            })
            .await;
        Ok(WakeSummary {
            tick,
            at,
            firings,
            skipped,
        })
    }

    async fn fire(&self, due: DueFiring) -> Result<FiringSample, SchedulerError> {
        let now = self.clock.now();
        let deviation_ms = due.deviation_ms(now);
        let ids = self.store.list().await?;
        let parallelism = effective_parallelism(self.config.worker_parallelism, ids.len());
        let subsystem = due.subsystem;
        let window_id = due.window_id;

        let store = Arc::clone(&self.store);
        let broadcaster = Arc::clone(&self.broadcaster);
        let ctx = Arc::clone(&self.ctx);
        let results = run_batch(ids, parallelism, move |id| {
            let store = Arc::clone(&store);
            let broadcaster = Arc::clone(&broadcaster);
            let ctx = Arc::clone(&ctx);
            async move {
                process_settlement(
                    store.as_ref(),
                    broadcaster.as_ref(),
                    &ctx,
                    subsystem,
                    window_id,
                    now,
                    id,
                )
                .await
            }
        })
        .await?;

        let mut processed = 0_usize;
        let mut changed = 0_usize;
        let mut failed = 0_usize;
        for (settlement_id, result) in results {
            match result {
                Ok(was_changed) => {
                    processed = processed.saturating_add(1);
                    if was_changed {
                        changed = changed.saturating_add(1);
                    }
                }
                Err(e) => {
                    failed = failed.saturating_add(1);
                    warn!(
                        subsystem = %subsystem,
                        settlement_id = %settlement_id,
                        error = %e,
                        "settlement processing failed, retrying next tick"
                    );
                }
            }
        }

        info!(
            subsystem = %subsystem,
            window_id,
            deviation_ms,
            processed,
            changed,
            failed,
            "subsystem fired"
        );
        Ok(FiringSample {
            subsystem,
            deviation_ms,
            processed,
            failed,
        })
    }

    /// Run the loop until a stop is requested or a fatal error occurs.
    ///
    /// # Errors
    ///
    /// Returns the fatal [`SchedulerError`]; the control is marked
    /// `Failed` first.
    pub async fn run(mut self) -> Result<RunSummary, SchedulerError> {
        if let Err(e) = self.load_fired().await {
            return Err(self.fail(e).await);
        }
        self.control.mark_healthy();
        info!(
            loop_interval_ms = self.config.loop_interval_ms,
            fired = ?self.fired,
            "Tick scheduler starting"
        );

        let interval = Duration::from_millis(self.config.loop_interval_ms);
        while !self.control.is_stop_requested() {
            let started = Instant::now();
            if let Err(e) = self.wake().await {
                return Err(self.fail(e).await);
            }
            self.maybe_report().await;

            let pause = interval.saturating_sub(started.elapsed());
            tokio::select! {
                () = self.clock.sleep(pause) => {}
                () = self.control.stopped() => {}
            }
        }

        self.control.mark_stopped();
        let total_ticks = self.control.total_ticks();
        info!(total_ticks, "Tick scheduler stopped");
        Ok(RunSummary { total_ticks })
    }

    async fn fail(&self, e: SchedulerError) -> SchedulerError {
        error!(error = %e, "Tick scheduler failed, shutting down");
        self.control.fail(e.to_string()).await;
        e
    }

    async fn maybe_report(&mut self) {
        let now = self.clock.now();
        let interval = i64::try_from(self.config.report_interval_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        match self.last_report_at {
            None => self.last_report_at = Some(now),
            Some(last) if now.signed_duration_since(last) >= interval => {
                let report = self.monitor.report(now).await;
                info!("\n{report}");
                self.last_report_at = Some(now);
            }
            Some(_) => {}
        }
    }
}

impl<S, B, C> std::fmt::Debug for TickScheduler<S, B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("windows", &self.windows)
            .field("fired", &self.fired)
            .finish_non_exhaustive()
    }
}
