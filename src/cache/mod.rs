//! In-memory response cache with time-based expiry
//!
//! This module provides a generic key/value cache that stamps every entry with
//! its creation time and runs a background sweep that evicts entries older than
//! the configured interval. Time is read through an injected [`TimeSource`] so
//! expiry can be tested without waiting on the wall clock.

mod clock;
mod store;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use store::{Cache, CacheConfig, DEFAULT_INTERVAL};
