//! Time-expiring key/value store with a background sweep
//!
//! Provides a `Cache` that keeps entries in memory together with the time they
//! were added. A Tokio task started at construction sweeps the map once per
//! interval and removes every entry older than that interval.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::clock::{SystemClock, TimeSource};

/// Default maximum entry age (6 minutes)
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(360);

/// Smallest period the sweep can be scheduled with
const MIN_TICK: Duration = Duration::from_millis(1);

/// Configuration for a [`Cache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum age of an entry before the sweep evicts it
    pub interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// A stored value and the time it was added
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    created_at: Duration,
    value: V,
}

/// State shared between the cache handle and its sweep task
struct Shared<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    interval: Duration,
    clock: Arc<dyn TimeSource>,
}

impl<V> Shared<V> {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes every entry strictly older than the interval
    fn reap(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_sub(entry.created_at) <= self.interval);
        before - entries.len()
    }
}

/// In-memory cache whose entries expire after a fixed interval
///
/// Reads never check age: an entry stays visible until a sweep removes it.
/// Sweeps run in the background every `interval` and can be triggered
/// synchronously with [`Cache::reap_now`].
///
/// The background sweep needs a Tokio runtime. A cache built outside one
/// holds entries normally but only sweeps when `reap_now` is called.
pub struct Cache<V> {
    shared: Arc<Shared<V>>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl<V> std::fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("interval", &self.shared.interval)
            .field("len", &self.shared.entries().len())
            .field("reaping", &self.is_reaping())
            .finish()
    }
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + 'static,
{
    /// Creates a cache driven by the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config.interval, Arc::new(SystemClock::new()))
    }

    /// Creates a cache with a custom time source and starts its sweep
    ///
    /// # Arguments
    /// * `interval` - Maximum entry age, in the time source's units
    /// * `clock` - Source of the current time for stamping and sweeping
    pub fn with_clock(interval: Duration, clock: Arc<dyn TimeSource>) -> Self {
        let shared = Arc::new(Shared {
            entries: Mutex::new(HashMap::new()),
            interval,
            clock,
        });
        let reaper = spawn_reaper(Arc::downgrade(&shared), interval.max(MIN_TICK));

        Self {
            shared,
            reaper: Mutex::new(reaper),
        }
    }

    /// Inserts or replaces the entry for `key` and returns `value`
    ///
    /// The entry's age starts from the time source's current reading, so
    /// overwriting a key also resets its expiry.
    pub fn add(&self, key: impl Into<String>, value: V) -> V {
        let entry = CacheEntry {
            created_at: self.shared.clock.now(),
            value: value.clone(),
        };
        self.shared.entries().insert(key.into(), entry);
        value
    }

    /// Returns the value stored under `key`, if any
    pub fn get(&self, key: &str) -> Option<V> {
        self.shared
            .entries()
            .get(key)
            .map(|entry| entry.value.clone())
    }
}

impl<V> Cache<V> {
    /// Runs one sweep pass immediately and returns the number of evicted entries
    pub fn reap_now(&self) -> usize {
        let evicted = self.shared.reap();
        if evicted > 0 {
            tracing::debug!(evicted, "cache sweep evicted entries");
        }
        evicted
    }

    /// Cancels the background sweep
    ///
    /// Calling this more than once, or on a cache that never started a sweep,
    /// has no effect.
    pub fn stop_reap_loop(&self) {
        let handle = self
            .reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("cache sweep stopped");
        }
    }

    /// Whether a background sweep is scheduled
    pub fn is_reaping(&self) -> bool {
        self.reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Maximum entry age
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Number of entries currently stored, expired or not
    pub fn len(&self) -> usize {
        self.shared.entries().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        self.stop_reap_loop();
    }
}

/// Spawns the recurring sweep on the current Tokio runtime, if there is one
///
/// The task holds only a weak reference, so it ends once the cache is gone.
fn spawn_reaper<V>(shared: Weak<Shared<V>>, period: Duration) -> Option<JoinHandle<()>>
where
    V: Send + 'static,
{
    let Ok(runtime) = Handle::try_current() else {
        tracing::warn!("no Tokio runtime available; cache entries will not expire automatically");
        return None;
    };

    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first tick (immediate)
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            let evicted = shared.reap();
            if evicted > 0 {
                tracing::debug!(evicted, "cache sweep evicted entries");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use serde_json::json;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn create_test_cache() -> (Cache<serde_json::Value>, ManualClock) {
        let clock = ManualClock::new();
        let cache = Cache::with_clock(INTERVAL, Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let (cache, _clock) = create_test_cache();
        assert!(cache.get("nonexistent_key").is_none());
    }

    #[test]
    fn test_add_returns_value_unchanged() {
        let (cache, _clock) = create_test_cache();
        let value = json!({"data": "v"});

        let returned = cache.add("k", value.clone());

        assert_eq!(returned, value);
        assert_eq!(cache.get("k"), Some(value));
    }

    #[test]
    fn test_falsy_values_are_distinguishable_from_absent() {
        let (cache, _clock) = create_test_cache();
        cache.add("null", serde_json::Value::Null);
        cache.add("empty", json!([]));

        assert_eq!(cache.get("null"), Some(serde_json::Value::Null));
        assert_eq!(cache.get("empty"), Some(json!([])));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_sweep_after_interval_evicts_entry() {
        let (cache, clock) = create_test_cache();
        cache.add("k", json!({"data": "v"}));

        clock.set(Duration::from_millis(101));

        assert_eq!(cache.reap_now(), 1);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_sweep_before_interval_keeps_entry() {
        let (cache, clock) = create_test_cache();
        cache.add("k", json!({"data": "v"}));

        clock.set(Duration::from_millis(99));

        assert_eq!(cache.reap_now(), 0);
        assert_eq!(cache.get("k"), Some(json!({"data": "v"})));
    }

    #[test]
    fn test_entry_exactly_interval_old_is_kept() {
        let (cache, clock) = create_test_cache();
        cache.add("k", json!(1));

        clock.set(INTERVAL);
        cache.reap_now();

        assert_eq!(cache.get("k"), Some(json!(1)));
    }

    #[test]
    fn test_get_does_not_enforce_age() {
        let (cache, clock) = create_test_cache();
        cache.add("k", json!("stale"));

        clock.set(Duration::from_secs(60));

        assert_eq!(cache.get("k"), Some(json!("stale")));
    }

    #[test]
    fn test_overwrite_resets_creation_time() {
        let (cache, clock) = create_test_cache();
        cache.add("k", json!("first"));

        clock.set(Duration::from_millis(80));
        cache.add("k", json!("second"));

        // 150ms after the first add, 70ms after the second
        clock.set(Duration::from_millis(150));
        cache.reap_now();
        assert_eq!(cache.get("k"), Some(json!("second")));

        clock.set(Duration::from_millis(181));
        cache.reap_now();
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_sweep_visits_every_entry() {
        let (cache, clock) = create_test_cache();
        cache.add("old_1", json!(1));
        cache.add("old_2", json!(2));
        clock.set(Duration::from_millis(50));
        cache.add("young", json!(3));

        clock.set(Duration::from_millis(120));

        assert_eq!(cache.reap_now(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("young"), Some(json!(3)));
    }

    #[test]
    fn test_len_counts_expired_entries_until_swept() {
        let (cache, clock) = create_test_cache();
        assert!(cache.is_empty());

        cache.add("k", json!("v"));
        clock.set(Duration::from_millis(500));
        assert_eq!(cache.len(), 1);

        cache.reap_now();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_outside_runtime_has_no_sweep() {
        let (cache, _clock) = create_test_cache();
        assert!(!cache.is_reaping());
        cache.stop_reap_loop();
    }

    #[test]
    fn test_default_config_interval() {
        assert_eq!(CacheConfig::default().interval, Duration::from_secs(360));
    }

    #[tokio::test]
    async fn test_stop_reap_loop_is_idempotent() {
        let (cache, _clock) = create_test_cache();
        assert!(cache.is_reaping());

        cache.stop_reap_loop();
        cache.stop_reap_loop();

        assert!(!cache.is_reaping());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_evicts_expired_entries() {
        let (cache, clock) = create_test_cache();
        cache.add("k", json!({"data": "v"}));
        clock.set(Duration::from_millis(101));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_cache_no_longer_sweeps() {
        let (cache, clock) = create_test_cache();
        cache.stop_reap_loop();
        cache.add("k", json!({"data": "v"}));
        clock.set(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(cache.get("k"), Some(json!({"data": "v"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_sweeps_without_panicking() {
        let clock = ManualClock::new();
        let cache = Cache::with_clock(Duration::ZERO, Arc::new(clock.clone()));
        assert!(cache.is_reaping());
        cache.add("k", json!(1));

        // Several 1ms ticks at the same instant: age 0 equals the interval
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k"), Some(json!(1)));

        clock.advance(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_cache_aborts_sweep_task() {
        let (cache, _clock) = create_test_cache();
        let task = cache
            .reaper
            .lock()
            .unwrap()
            .as_ref()
            .expect("sweep running")
            .abort_handle();
        let shared = Arc::downgrade(&cache.shared);

        drop(cache);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(task.is_finished());
        assert!(shared.upgrade().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_exits_once_cache_is_gone() {
        let (cache, _clock) = create_test_cache();
        // Detach the task so only the weak reference can end it
        let task = cache.reaper.lock().unwrap().take().expect("sweep running");

        drop(cache);
        tokio::time::sleep(INTERVAL * 2).await;

        assert!(task.is_finished());
        task.await.expect("task exits normally");
    }
}
