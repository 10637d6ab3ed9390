//! Time sources for the cache
//!
//! The cache never calls the system clock directly. It asks a [`TimeSource`]
//! for the current time, which lets tests drive expiry with a [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source of the current time, measured from an arbitrary fixed origin
///
/// Only differences between two readings are meaningful. Any
/// `Fn() -> Duration` closure can be used as a time source.
pub trait TimeSource: Send + Sync {
    /// Returns the time elapsed since this source's origin
    fn now(&self) -> Duration;
}

impl<F> TimeSource for F
where
    F: Fn() -> Duration + Send + Sync,
{
    fn now(&self) -> Duration {
        self()
    }
}

/// Monotonic clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Creates a clock whose origin is the moment of construction
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to
///
/// Readings have nanosecond resolution.
///
/// Clones share the same underlying counter, so a test can keep one handle
/// and give another to the cache.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current reading
    pub fn set(&self, now: Duration) {
        self.nanos.store(now.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Moves the current reading forward by `by`
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
