//! Injected clock abstraction.
//!
//! A single clock supplies every timestamp of a trace, so offsets and
//! durations across the whole report share one source and one unit
//! (nanoseconds on a monotonic axis). Wall-clock time is only used to anchor
//! the rendered `startTime`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TraceError;

/// A point on a clock's monotonic axis, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Nanoseconds elapsed from `earlier` to `self`.
    pub fn duration_since(self, earlier: Timestamp) -> Result<u64, TraceError> {
        self.0
            .checked_sub(earlier.0)
            .ok_or(TraceError::ClockWentBackwards {
                earlier: earlier.0,
                later: self.0,
            })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Source of monotonic nanosecond timestamps.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current position on the monotonic axis.
    fn now(&self) -> Timestamp;

    /// Wall-clock time corresponding to `at`.
    fn wall_time(&self, at: Timestamp) -> DateTime<Utc>;
}

/// Monotonic clock anchored to the wall clock once, at construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
}

static GLOBAL_CLOCK: OnceLock<SystemClock> = OnceLock::new();

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: Utc::now(),
        }
    }

    /// The process-wide clock, anchored on first use.
    pub fn global() -> &'static SystemClock {
        GLOBAL_CLOCK.get_or_init(SystemClock::new)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // u64 nanoseconds cover ~584 years of process uptime.
        Timestamp(self.origin.elapsed().as_nanos() as u64)
    }

    fn wall_time(&self, at: Timestamp) -> DateTime<Utc> {
        self.wall_origin + nanos(at.0)
    }
}

/// Hand-driven clock for deterministic tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
    wall_origin: DateTime<Utc>,
}

impl ManualClock {
    pub fn new(wall_origin: DateTime<Utc>) -> Self {
        Self {
            now: AtomicU64::new(0),
            wall_origin,
        }
    }

    /// Move the clock forward by `nanos`.
    pub fn advance(&self, nanos: u64) {
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn set(&self, at: u64) {
        self.now.store(at, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::SeqCst))
    }

    fn wall_time(&self, at: Timestamp) -> DateTime<Utc> {
        self.wall_origin + nanos(at.0)
    }
}

/// Saturates at `i64::MAX` nanoseconds.
pub(crate) fn nanos(value: u64) -> Duration {
    Duration::nanoseconds(i64::try_from(value).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(b.duration_since(a).is_ok());
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::default();
        assert_eq!(clock.now(), Timestamp(0));
        clock.advance(1_500);
        clock.advance(500);
        assert_eq!(clock.now(), Timestamp(2_000));
        assert_eq!(
            clock.wall_time(clock.now()),
            DateTime::<Utc>::UNIX_EPOCH + Duration::microseconds(2)
        );
    }

    #[test]
    fn test_duration_since_rejects_backwards() {
        let err = Timestamp(5).duration_since(Timestamp(10)).unwrap_err();
        assert_eq!(
            err,
            TraceError::ClockWentBackwards {
                earlier: 10,
                later: 5
            }
        );
    }
}
