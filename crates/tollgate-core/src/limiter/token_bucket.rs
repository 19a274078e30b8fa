//! Token-bucket rate limiting, one bucket per derived key.

use ahash::HashMap;
use std::sync::Mutex;
use std::time::Instant;

struct Bucket {
    tokens: f64,
    last_update: Instant,
}

/// Per-instance token-bucket state, guarded by a single mutex per §5's
/// "coarse-grained locking is acceptable" allowance.
pub struct TokenBucketLimiter {
    rate_per_sec: f64,
    capacity: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucketLimiter {
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        Self {
            rate_per_sec,
            capacity: burst.max(1.0),
            buckets: Mutex::new(HashMap::default()),
        }
    }

    /// Admits or rejects `key` at `now`. See §4.4.1 for the refill and idle
    /// eviction rules this implements.
    pub fn admit(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().expect("token bucket mutex poisoned");

        let evict_after = (60.0_f64).max(2.0 * self.capacity / self.rate_per_sec);

        if !buckets.contains_key(key) {
            // First request for this key: admit immediately, bucket starts
            // one token short of full.
            buckets.insert(
                key.to_string(),
                Bucket {
                    tokens: self.capacity - 1.0,
                    last_update: now,
                },
            );
            return true;
        }

        {
            let bucket = buckets.get(key).expect("checked above");
            let elapsed = now.saturating_duration_since(bucket.last_update).as_secs_f64();
            if elapsed > evict_after && bucket.tokens + elapsed * self.rate_per_sec >= self.capacity {
                // Idle long enough to be considered cold; evict and recreate
                // fresh for this tick instead of just touching the timestamp.
                buckets.remove(key);
                buckets.insert(
                    key.to_string(),
                    Bucket {
                        tokens: self.capacity - 1.0,
                        last_update: now,
                    },
                );
                return true;
            }
        }

        let bucket = buckets.get_mut(key).expect("checked above");
        let elapsed = now.saturating_duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        bucket.last_update = now;

        if bucket.tokens < 1.0 {
            false
        } else {
            bucket.tokens -= 1.0;
            true
        }
    }
}
