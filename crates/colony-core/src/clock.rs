//! Wall-clock abstraction.
//!
//! Everything time-dependent in the engine reads the time through a
//! [`Clock`], never through `Utc::now()` directly. Production uses
//! [`SystemClock`]; tests use [`MockClock`], whose `sleep` advances the
//! mock time instantly so hours of simulated scheduling run without real
//! waits.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Errors that can occur when constructing a clock.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The timestamp could not be parsed.
    #[error("invalid timestamp: {source}")]
    Parse {
        /// The underlying parse error.
        #[from]
        source: chrono::ParseError,
    },
}

/// A source of wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Wait for `duration` of this clock's time to pass.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A manually driven clock with millisecond resolution.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct MockClock {
    millis: Arc<AtomicI64>,
}

impl MockClock {
    /// A mock clock frozen at `start`.
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// A mock clock frozen at an RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Parse`] if `timestamp` is not RFC 3339.
    pub fn parse(timestamp: &str) -> Result<Self, ClockError> {
        let start = DateTime::parse_from_rfc3339(timestamp)?.with_timezone(&Utc);
        Ok(Self::at(start))
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let step = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let _ = self
            .millis
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |ms| {
                Some(ms.saturating_add(step))
            });
    }

    /// Jump to an instant (forwards or backwards).
    pub fn set(&self, instant: DateTime<Utc>) {
        self.millis
            .store(instant.timestamp_millis(), Ordering::Release);
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::Acquire))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances() {
        let clock = MockClock::parse("2026-01-01T00:59:59Z").unwrap();
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now().to_rfc3339(), "2026-01-01T01:00:00+00:00");
    }

    #[test]
    fn clones_share_time() {
        let clock = MockClock::parse("2026-01-01T00:00:00Z").unwrap();
        let other = clock.clone();
        clock.advance(Duration::from_millis(1500));
        assert_eq!(other.now().timestamp_millis(), clock.now().timestamp_millis());
    }

    #[test]
    fn bad_timestamp_rejected() {
        assert!(MockClock::parse("yesterday").is_err());
    }

    #[tokio::test]
    async fn mock_sleep_is_instant() {
        let clock = MockClock::parse("2026-01-01T00:00:00Z").unwrap();
        clock.sleep(Duration::from_secs(3600)).await;
        assert_eq!(clock.now().to_rfc3339(), "2026-01-01T01:00:00+00:00");
    }
}
