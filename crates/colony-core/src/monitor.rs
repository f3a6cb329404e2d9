//! Tick timing monitor.
//!
//! Diagnostic only: the scheduler feeds it one [`TickSample`] per wake and
//! never reads anything back. The monitor keeps a bounded ring of recent
//! samples plus cumulative per-subsystem counters, and renders them as a
//! [`MonitorSnapshot`] for the observer API or as a plain-text report for
//! the log.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use colony_types::Subsystem;

/// Frame budget at 60 Hz, in microseconds.
const SLOW_TICK_US: u64 = 16_670;

/// Severely slow tick threshold, in microseconds.
const SEVERE_TICK_US: u64 = 50_000;

/// Quarter-hour buckets in one hour.
const LOAD_BUCKETS: usize = 4;

/// One subsystem firing inside a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiringSample {
    /// Subsystem fired.
    pub subsystem: Subsystem,
    /// Actual minus expected trigger time, in milliseconds.
    pub deviation_ms: i64,
    /// Settlements processed successfully.
    pub processed: usize,
    /// Settlements whose processing failed.
    pub failed: usize,
}

/// One scheduler wake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSample {
    /// Monotonic tick number.
    pub tick: u64,
    /// Wall-clock time of the wake.
    pub at: DateTime<Utc>,
    /// Processing time consumed by the wake, in microseconds.
    pub duration_us: u64,
    /// Subsystems fired during the wake.
    pub firings: Vec<FiringSample>,
}

/// Cumulative timing of one subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsystemStats {
    /// Times the subsystem fired.
    pub triggers: u64,
    /// Mean deviation in milliseconds.
    pub avg_deviation_ms: Decimal,
    /// Largest absolute deviation seen, in milliseconds.
    pub max_deviation_ms: i64,
    /// Deviation of the most recent firing.
    pub last_deviation_ms: Option<i64>,
    /// When it last fired.
    pub last_fired_at: Option<DateTime<Utc>>,
    /// Settlements that failed across all firings.
    pub failures: u64,
    #[serde(skip)]
    deviation_sum_ms: i128,
}

/// Samples and processing time falling in one quarter of the hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBucket {
    /// Minute range, e.g. `:15-:30`.
    pub label: String,
    /// Samples in the bucket.
    pub samples: u64,
    /// Total processing time in milliseconds.
    pub total_ms: Decimal,
}

/// Point-in-time statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    /// When the monitor was created.
    pub started_at: DateTime<Utc>,
    /// Seconds since `started_at`.
    pub uptime_secs: i64,
    /// Ticks recorded since start.
    pub total_ticks: u64,
    /// Samples currently held in the ring.
    pub window_samples: usize,
    /// Mean tick duration over the ring.
    pub avg_tick_ms: Decimal,
    /// Median tick duration over the ring.
    pub median_tick_ms: Decimal,
    /// Shortest tick in the ring.
    pub min_tick_ms: Decimal,
    /// Longest tick in the ring.
    pub max_tick_ms: Decimal,
    /// Ticks over one 60 Hz frame since start.
    pub slow_ticks: u64,
    /// Ticks over 50 ms since start.
    pub severe_ticks: u64,
    /// Per-subsystem timing.
    pub subsystems: BTreeMap<Subsystem, SubsystemStats>,
    /// Load over quarter-hour buckets of the ring.
    pub load: Vec<LoadBucket>,
}

#[derive(Debug)]
struct MonitorInner {
    samples: VecDeque<TickSample>,
    total_ticks: u64,
    slow_ticks: u64,
    severe_ticks: u64,
    subsystems: BTreeMap<Subsystem, SubsystemStats>,
}

/// Rolling tick statistics shared by the scheduler and the observer.
#[derive(Debug)]
pub struct TickMonitor {
    started_at: DateTime<Utc>,
    capacity: usize,
    deviation_warn_ms: u64,
    inner: Mutex<MonitorInner>,
}

impl TickMonitor {
    /// Create a monitor holding at most `capacity` samples.
    pub fn new(started_at: DateTime<Utc>, capacity: usize, deviation_warn_ms: u64) -> Self {
        Self {
            started_at,
            capacity: capacity.max(1),
            deviation_warn_ms,
            inner: Mutex::new(MonitorInner {
                samples: VecDeque::with_capacity(capacity.max(1)),
                total_ticks: 0,
                slow_ticks: 0,
                severe_ticks: 0,
                subsystems: BTreeMap::new(),
            }),
        }
    }

    /// Record a completed wake.
    pub async fn record(&self, sample: TickSample) {
        for firing in &sample.firings {
            if firing.deviation_ms.unsigned_abs() > self.deviation_warn_ms {
                warn!(
                    subsystem = %firing.subsystem,
                    tick = sample.tick,
                    deviation_ms = firing.deviation_ms,
                    "subsystem fired off its boundary"
                );
            }
        }

        let mut inner = self.inner.lock().await;
        inner.total_ticks = inner.total_ticks.saturating_add(1);
        if sample.duration_us > SLOW_TICK_US {
            inner.slow_ticks = inner.slow_ticks.saturating_add(1);
        }
        if sample.duration_us > SEVERE_TICK_US {
            inner.severe_ticks = inner.severe_ticks.saturating_add(1);
        }
        for firing in &sample.firings {
            let stats = inner.subsystems.entry(firing.subsystem).or_default();
            stats.triggers = stats.triggers.saturating_add(1);
            stats.deviation_sum_ms = stats
                .deviation_sum_ms
                .saturating_add(i128::from(firing.deviation_ms));
            stats.avg_deviation_ms = Decimal::try_from_i128_with_scale(stats.deviation_sum_ms, 0)
                .ok()
                .and_then(|sum| sum.checked_div(Decimal::from(stats.triggers)))
                .map_or(Decimal::ZERO, |avg| avg.round_dp(2));
            if firing.deviation_ms.unsigned_abs() >= stats.max_deviation_ms.unsigned_abs() {
                stats.max_deviation_ms = firing.deviation_ms;
            }
            stats.last_deviation_ms = Some(firing.deviation_ms);
            stats.last_fired_at = Some(sample.at);
            stats.failures = stats
                .failures
                .saturating_add(u64::try_from(firing.failed).unwrap_or(u64::MAX));
        }
        if inner.samples.len() >= self.capacity {
            inner.samples.pop_front();
        }
        inner.samples.push_back(sample);
    }

    /// Ticks recorded since start.
    pub async fn total_ticks(&self) -> u64 {
        self.inner.lock().await.total_ticks
    }

    /// Current statistics.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> MonitorSnapshot {
        let inner = self.inner.lock().await;

        let mut durations: Vec<u64> = inner.samples.iter().map(|s| s.duration_us).collect();
        durations.sort_unstable();
        let total_us = durations
            .iter()
            .fold(0_u64, |sum, us| sum.saturating_add(*us));
        let count = u64::try_from(durations.len()).unwrap_or(u64::MAX);
        let avg_us = total_us.checked_div(count).unwrap_or(0);
        let median_us = durations
            .get(durations.len().checked_div(2).unwrap_or(0))
            .copied()
            .unwrap_or(0);

        let mut load: Vec<LoadBucket> = (0..LOAD_BUCKETS)
            .map(|quarter| {
                let from = quarter.saturating_mul(15);
                LoadBucket {
                    label: format!(":{from:02}-:{:02}", from.saturating_add(15)),
                    samples: 0,
                    total_ms: Decimal::ZERO,
                }
            })
            .collect();
        for sample in &inner.samples {
            let quarter = usize::try_from(sample.at.minute().checked_div(15).unwrap_or(0))
                .unwrap_or(0);
            if let Some(bucket) = load.get_mut(quarter) {
                bucket.samples = bucket.samples.saturating_add(1);
                bucket.total_ms = bucket
                    .total_ms
                    .saturating_add(micros_to_ms(sample.duration_us));
            }
        }

        MonitorSnapshot {
            started_at: self.started_at,
            uptime_secs: now.signed_duration_since(self.started_at).num_seconds().max(0),
            total_ticks: inner.total_ticks,
            window_samples: inner.samples.len(),
            avg_tick_ms: micros_to_ms(avg_us),
            median_tick_ms: micros_to_ms(median_us),
            min_tick_ms: micros_to_ms(durations.first().copied().unwrap_or(0)),
            max_tick_ms: micros_to_ms(durations.last().copied().unwrap_or(0)),
            slow_ticks: inner.slow_ticks,
            severe_ticks: inner.severe_ticks,
            subsystems: inner.subsystems.clone(),
            load,
        }
    }

    /// Human-readable summary of the current statistics.
    pub async fn report(&self, now: DateTime<Utc>) -> String {
        render_report(&self.snapshot(now).await)
    }
}

/// Render a snapshot as a multi-line report.
pub fn render_report(snapshot: &MonitorSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Tick monitor report ===");
    let _ = writeln!(
        out,
        "uptime: {}s  ticks: {}  window: {} samples",
        snapshot.uptime_secs, snapshot.total_ticks, snapshot.window_samples
    );
    let _ = writeln!(
        out,
        "tick duration ms: avg {} / median {} / min {} / max {}",
        snapshot.avg_tick_ms, snapshot.median_tick_ms, snapshot.min_tick_ms, snapshot.max_tick_ms
    );
    let _ = writeln!(
        out,
        "slow ticks (>16.67ms): {}  severe (>50ms): {}",
        snapshot.slow_ticks, snapshot.severe_ticks
    );
    for (subsystem, stats) in &snapshot.subsystems {
        let _ = writeln!(
            out,
            "{subsystem:<12} fired {:>5}  deviation ms avg {} max {} last {}  failures {}",
            stats.triggers,
            stats.avg_deviation_ms,
            stats.max_deviation_ms,
            stats
                .last_deviation_ms
                .map_or_else(|| String::from("-"), |ms| ms.to_string()),
            stats.failures,
        );
    }
    for bucket in &snapshot.load {
        let _ = writeln!(
            out,
            "load {}: {} samples, {} ms",
            bucket.label, bucket.samples, bucket.total_ms
        );
    }
    out
}

fn micros_to_ms(us: u64) -> Decimal {
    Decimal::from(us)
        .checked_div(Decimal::ONE_THOUSAND)
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sample(tick: u64, offset_secs: i64, duration_us: u64) -> TickSample {
        TickSample {
            tick,
            at: start() + Duration::seconds(offset_secs),
            duration_us,
            firings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn ring_keeps_latest_samples() {
        let monitor = TickMonitor::new(start(), 3, 1000);
        for tick in 0..5 {
            monitor.record(sample(tick, 0, 1000)).await;
        }
        let snap = monitor.snapshot(start()).await;
        assert_eq!(snap.total_ticks, 5);
        assert_eq!(snap.window_samples, 3);
    }

    #[tokio::test]
    async fn duration_statistics_and_slow_counts() {
        let monitor = TickMonitor::new(start(), 10, 1000);
        for (tick, us) in (0_u64..).zip([2_000_u64, 20_000, 60_000, 4_000]) {
            monitor.record(sample(tick, 0, us)).await;
        }
        let snap = monitor.snapshot(start() + Duration::seconds(90)).await;
        assert_eq!(snap.uptime_secs, 90);
        assert_eq!(snap.avg_tick_ms, dec!(21.5));
        assert_eq!(snap.median_tick_ms, dec!(20));
        assert_eq!(snap.min_tick_ms, dec!(2));
        assert_eq!(snap.max_tick_ms, dec!(60));
        assert_eq!(snap.slow_ticks, 2);
        assert_eq!(snap.severe_ticks, 1);
    }

    #[tokio::test]
    async fn deviation_stats_per_subsystem() {
        let monitor = TickMonitor::new(start(), 10, 1000);
        for (tick, deviation) in [(0, 200_i64), (1, -1500), (2, 400)] {
            let mut s = sample(tick, 0, 500);
            s.firings.push(FiringSample {
                subsystem: Subsystem::Resources,
                deviation_ms: deviation,
                processed: 4,
                failed: usize::from(tick == 1),
            });
            monitor.record(s).await;
        }
        let snap = monitor.snapshot(start()).await;
        let stats = snap.subsystems.get(&Subsystem::Resources).unwrap();
        assert_eq!(stats.triggers, 3);
        assert_eq!(stats.avg_deviation_ms, dec!(-300));
        assert_eq!(stats.max_deviation_ms, -1500);
        assert_eq!(stats.last_deviation_ms, Some(400));
        assert_eq!(stats.failures, 1);
        assert!(!snap.subsystems.contains_key(&Subsystem::Population));
    }

    #[tokio::test]
    async fn load_split_by_quarter_hour() {
        let monitor = TickMonitor::new(start(), 10, 1000);
        monitor.record(sample(0, 60, 1_000)).await;
        monitor.record(sample(1, 20 * 60, 3_000)).await;
        monitor.record(sample(2, 50 * 60, 5_000)).await;
        monitor.record(sample(3, 55 * 60, 5_000)).await;
        let snap = monitor.snapshot(start()).await;
        let counts: Vec<u64> = snap.load.iter().map(|b| b.samples).collect();
        assert_eq!(counts, vec![1, 1, 0, 2]);
        assert_eq!(snap.load.get(3).map(|b| b.total_ms), Some(dec!(10)));
        assert_eq!(snap.load.first().map(|b| b.label.as_str()), Some(":00-:15"));
    }

    #[tokio::test]
    async fn report_names_every_fired_subsystem() {
        let monitor = TickMonitor::new(start(), 10, 1000);
        let mut s = sample(0, 0, 800);
        s.firings.push(FiringSample {
            subsystem: Subsystem::Disasters,
            deviation_ms: 12,
            processed: 1,
            failed: 0,
        });
        monitor.record(s).await;
        let report = monitor.report(start()).await;
        assert!(report.contains("disasters"));
        assert!(report.contains("ticks: 1"));
    }
}
