//! Sliding-window rate limiting, one timestamp log per derived key.

use ahash::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Window {
    timestamps: Vec<Instant>,
    last_update: Instant,
}

pub struct SlidingWindowLimiter {
    rate: u64,
    window_size: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl SlidingWindowLimiter {
    pub fn new(rate: u64, window_size: Duration) -> Self {
        Self {
            rate: rate.max(1),
            window_size,
            windows: Mutex::new(HashMap::default()),
        }
    }

    /// Admits or rejects `key` at `now`. See §4.4.2.
    pub fn admit(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().expect("sliding window mutex poisoned");

        let evict_after = Duration::from_secs(60).max(self.window_size * 2);

        if let Some(existing) = windows.get_mut(key) {
            existing.timestamps.retain(|ts| now.saturating_duration_since(*ts) < self.window_size);
            if existing.timestamps.is_empty()
                && now.saturating_duration_since(existing.last_update) > evict_after
            {
                // Idle long enough to be considered cold; evict and recreate
                // fresh rather than just touching the timestamp.
                windows.remove(key);
            }
        }

        let window = windows.entry(key.to_string()).or_insert_with(|| Window {
            timestamps: Vec::new(),
            last_update: now,
        });

        if window.timestamps.len() as u64 >= self.rate {
            return false;
        }

        window.timestamps.push(now);
        window.last_update = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_rate_within_window() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.admit("k1", t0));
        assert!(limiter.admit("k1", t0));
        assert!(!limiter.admit("k1", t0));
    }

    #[test]
    fn expired_timestamps_free_up_capacity() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(limiter.admit("k1", t0));
        assert!(!limiter.admit("k1", t0 + Duration::from_secs(5)));
        assert!(limiter.admit("k1", t0 + Duration::from_secs(11)));
    }

    #[test]
    fn distinct_keys_track_independent_windows() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.admit("a", t0));
        assert!(!limiter.admit("a", t0));
        assert!(limiter.admit("b", t0));
    }

    #[test]
    fn idle_window_is_evicted_not_just_timestamped_in_place() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(limiter.admit("k1", t0));
        assert_eq!(limiter.windows.lock().unwrap().len(), 1);

        // Idle well past the eviction threshold (max(60s, 2*window) = 60s here),
        // with the single timestamp already expired out of the window.
        let t1 = t0 + Duration::from_secs(120);
        assert!(limiter.admit("k1", t1));

        let windows = limiter.windows.lock().unwrap();
        assert_eq!(windows.len(), 1, "the stale entry must be replaced, not accumulated");
        assert_eq!(windows["k1"].timestamps, vec![t1]);
    }
}
