//! Timestamps and injectable clock sources.
//!
//! The store never reads the system clock directly. Every `server_timestamp()`
//! sentinel and every document create/update time goes through a
//! [`ClockSource`], so tests can swap in a [`ManualClock`] and assert exact
//! values.

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A point in time with nanosecond resolution.
///
/// Ordering is `seconds` first, then `nanos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since Unix epoch.
    pub seconds: i64,
    /// Sub-second nanoseconds, always `< 1_000_000_000`.
    pub nanos: u32,
}

impl Timestamp {
    /// Builds a timestamp from milliseconds since Unix epoch.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn from_millis(millis: i64) -> Self {
        Self {
            seconds: millis.div_euclid(1000),
            nanos: (millis.rem_euclid(1000) * 1_000_000) as u32,
        }
    }

    /// Milliseconds since Unix epoch.
    #[must_use]
    pub fn to_millis(&self) -> i64 {
        self.seconds * 1000 + i64::from(self.nanos / 1_000_000)
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds
            .cmp(&other.seconds)
            .then_with(|| self.nanos.cmp(&other.nanos))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Abstraction over the system clock for dependency injection.
///
/// The default implementation ([`SystemClock`]) delegates to
/// `std::time::SystemTime`.
pub trait ClockSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Default clock source that reads the real system time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    #[allow(clippy::cast_possible_wrap)]
    fn now(&self) -> Timestamp {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp {
            seconds: elapsed.as_secs() as i64,
            nanos: elapsed.subsec_nanos(),
        }
    }
}

/// Clock whose time only moves when told to.
///
/// Each call to [`now`](ClockSource::now) returns the current value and then
/// advances it by `step_millis`, so consecutive reads stay distinguishable
/// while remaining fully deterministic.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
    step_millis: i64,
}

impl ManualClock {
    /// Creates a clock starting at `start_millis` that advances by
    /// `step_millis` on every read.
    #[must_use]
    pub fn new(start_millis: i64, step_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
            step_millis,
        }
    }

    /// Moves the clock to an absolute time.
    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, AtomicOrdering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Timestamp {
        let millis = self
            .millis
            .fetch_add(self.step_millis, AtomicOrdering::SeqCst);
        Timestamp::from_millis(millis)
    }
}
