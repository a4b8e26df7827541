use ahash::AHasher;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::bucket::Bucket;

/// Number of shards for the bucket map.
/// Must be a power of 2 for fast modulo via bitwise AND.
const NUM_SHARDS: usize = 16;

/// Default idle time after which a bucket may be evicted.
pub const DEFAULT_IDLE_EVICTION: Duration = Duration::from_secs(5 * 60);

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Tokens replenished per second
    pub requests_per_second: f64,
    /// Maximum burst, also the initial token count of a new bucket
    pub burst_size: u32,
    /// Buckets untouched for longer than this are removed by `cleanup`
    pub idle_eviction: Duration,
}

impl RateLimiterConfig {
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        RateLimiterConfig {
            requests_per_second,
            burst_size,
            idle_eviction: DEFAULT_IDLE_EVICTION,
        }
    }

    pub fn with_idle_eviction(mut self, idle: Duration) -> Self {
        self.idle_eviction = idle;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        RateLimiterConfig::new(10.0, 20)
    }
}

/// Per-key token bucket rate limiter.
///
/// Keys are distributed across shards by hash. Lookup, refill and spend for a
/// key all happen under its shard lock, so concurrent callers on the same key
/// see a consistent sequential order of token consumption.
pub struct RateLimiter {
    shards: Vec<Mutex<HashMap<String, Bucket>>>,
    rate: f64,
    capacity: f64,
    idle_eviction: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(config: RateLimiterConfig) -> Self {
        let shards = (0..NUM_SHARDS)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();

        RateLimiter {
            shards,
            rate: config.requests_per_second.max(0.0),
            capacity: f64::from(config.burst_size),
            idle_eviction: config.idle_eviction,
        }
    }

    /// Check whether a request for `key` is allowed now, spending a token if so.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// `allow` against an explicit clock reading.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut shard = self.shard(key).lock();

        if let Some(bucket) = shard.get_mut(key) {
            return bucket.try_take(self.rate, self.capacity, now);
        }

        let mut bucket = Bucket::full(self.capacity, now);
        let allowed = bucket.try_take(self.rate, self.capacity, now);
        shard.insert(key.to_string(), bucket);
        allowed
    }

    /// Discard all bucket state.
    pub fn reset(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }

    /// Remove buckets idle for longer than the eviction threshold.
    ///
    /// Returns the number of buckets evicted.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    /// `cleanup` against an explicit clock reading.
    pub fn cleanup_at(&self, now: Instant) -> usize {
        let mut evicted = 0;

        for shard in &self.shards {
            let mut guard = shard.lock();
            let before = guard.len();
            guard.retain(|_, bucket| !bucket.is_idle(self.idle_eviction, now));
            evicted += before - guard.len();
        }

        evicted
    }

    /// Total number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Periodically evict idle buckets on the tokio runtime.
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // First tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let evicted = limiter.cleanup();
                if evicted > 0 {
                    debug!(evicted, remaining = limiter.bucket_count(), "Evicted idle rate-limit buckets");
                }
            }
        })
    }

    #[inline]
    fn shard(&self, key: &str) -> &Mutex<HashMap<String, Bucket>> {
        let mut hasher = AHasher::default();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) & (NUM_SHARDS - 1)]
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .field("idle_eviction", &self.idle_eviction)
            .finish_non_exhaustive()
    }
}
