//! Tick windows: when each subsystem is due.
//!
//! Every subsystem owns a sequence of numbered windows. An hourly subsystem
//! opens window `floor((secs - offset) / 3600)` at its offset into the hour;
//! a periodic subsystem opens window `floor(secs / period)` every period.
//! The scheduler compares the current window against the last window it
//! fired, so a subsystem fires at most once per window regardless of how
//! often the loop wakes or whether the process restarted in between.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use colony_db::FiredWindows;
use colony_types::Subsystem;

use crate::config::SchedulerConfig;

/// Seconds in one hour.
const SECONDS_PER_HOUR: i64 = 3600;

/// Errors raised while computing tick windows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// A window policy has a zero-length period.
    #[error("subsystem {0} has a zero-length period")]
    ZeroPeriod(Subsystem),

    /// Window arithmetic left the representable time range.
    #[error("window arithmetic overflow for {0}")]
    Overflow(Subsystem),
}

/// How a subsystem's windows are laid out in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Once per hour at a fixed offset into the hour.
    HourlyOffset {
        /// Seconds past the top of the hour.
        offset_secs: u32,
    },
    /// Every `period_secs` seconds, aligned to the epoch.
    Period {
        /// Window length.
        period_secs: u32,
    },
}

impl WindowPolicy {
    fn span_and_offset(self) -> (i64, i64) {
        match self {
            Self::HourlyOffset { offset_secs } => (SECONDS_PER_HOUR, i64::from(offset_secs)),
            Self::Period { period_secs } => (i64::from(period_secs), 0),
        }
    }
}

/// A subsystem whose current window has not fired yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueFiring {
    /// The subsystem.
    pub subsystem: Subsystem,
    /// Its current window.
    pub window_id: i64,
    /// Start of the window.
    pub expected_at: DateTime<Utc>,
    /// `true` when the wake came later than the grace period allows; the
    /// window is recorded as fired without running.
    pub missed: bool,
}

impl DueFiring {
    /// How late the wake is relative to the window start, in milliseconds.
    pub fn deviation_ms(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.expected_at).num_milliseconds()
    }
}

/// The window policy of every subsystem, in firing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickWindows {
    policies: Vec<(Subsystem, WindowPolicy)>,
    grace: Duration,
}

impl TickWindows {
    /// Build the window table from scheduler configuration.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        let policies = Subsystem::ALL
            .into_iter()
            .map(|subsystem| {
                let policy = match subsystem {
                    Subsystem::Construction => WindowPolicy::Period {
                        period_secs: config.construction_period_secs,
                    },
                    Subsystem::Resources => WindowPolicy::HourlyOffset {
                        offset_secs: config.resources_offset_secs,
                    },
                    Subsystem::Population => WindowPolicy::HourlyOffset {
                        offset_secs: config.population_offset_secs,
                    },
                    Subsystem::Repairs => WindowPolicy::HourlyOffset {
                        offset_secs: config.repairs_offset_secs,
                    },
                    Subsystem::Disasters => WindowPolicy::Period {
                        period_secs: config.disaster_period_secs,
                    },
                };
                (subsystem, policy)
            })
            .collect();
        Self {
            policies,
            grace: Duration::seconds(i64::from(config.fire_grace_secs)),
        }
    }

    /// The policy of one subsystem.
    pub fn policy(&self, subsystem: Subsystem) -> Option<WindowPolicy> {
        self.policies
            .iter()
            .find(|(s, _)| *s == subsystem)
            .map(|(_, policy)| *policy)
    }

    /// Every subsystem whose current window differs from its last fired
    /// window, in firing order.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] for a zero period or out-of-range time.
    pub fn due(
        &self,
        now: DateTime<Utc>,
        fired: &FiredWindows,
    ) -> Result<Vec<DueFiring>, ScheduleError> {
        let mut due = Vec::new();
        for &(subsystem, policy) in &self.policies {
            let current = window_id(subsystem, policy, now)?;
            if fired.get(&subsystem).is_some_and(|last| *last >= current) {
                continue;
            }
            let expected_at = window_start(subsystem, policy, current)?;
            let late = now.signed_duration_since(expected_at);
            due.push(DueFiring {
                subsystem,
                window_id: current,
                expected_at,
                missed: late > self.grace,
            });
        }
        Ok(due)
    }
}

/// The window containing `now`.
///
/// # Errors
///
/// Returns [`ScheduleError::ZeroPeriod`] for a zero-length period.
pub fn window_id(
    subsystem: Subsystem,
    policy: WindowPolicy,
    now: DateTime<Utc>,
) -> Result<i64, ScheduleError> {
    let (span, offset) = policy.span_and_offset();
    if span == 0 {
        return Err(ScheduleError::ZeroPeriod(subsystem));
    }
    now.timestamp()
        .checked_sub(offset)
        .and_then(|secs| secs.checked_div_euclid(span))
        .ok_or(ScheduleError::Overflow(subsystem))
}

/// The instant window `id` opens.
///
/// # Errors
///
/// Returns [`ScheduleError::Overflow`] outside chrono's range.
pub fn window_start(
    subsystem: Subsystem,
    policy: WindowPolicy,
    id: i64,
) -> Result<DateTime<Utc>, ScheduleError> {
    let (span, offset) = policy.span_and_offset();
    id.checked_mul(span)
        .and_then(|secs| secs.checked_add(offset))
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or(ScheduleError::Overflow(subsystem))
}
