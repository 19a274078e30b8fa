//! CircuitBreaker (component C5): per-key closed/open/half-open state
//! machine protecting the upstream call the binary crate makes after a
//! route's handler chain admits a request.
//!
//! Rolling counters per key with listener notification always fired outside
//! the internal lock. Keyed per request-derived key rather than one breaker
//! per named service, and built on `std::sync::Mutex` rather than
//! `tokio::sync::RwLock` since the core crate's admission check is
//! synchronous.

use crate::context::Context;
use crate::error::ConfigError;
use crate::keying::derive_key;
use ahash::HashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub id: String,
    #[serde(default = "default_error_rate_percent", rename = "error_rate_percent")]
    pub error_rate_percent: f64,
    #[serde(default = "default_minimum_requests", rename = "minimum_requests")]
    pub minimum_requests: u64,
    #[serde(default = "default_half_open_max", rename = "half_open_max_requests")]
    pub half_open_max_requests: u64,
    #[serde(default = "default_open_timeout", rename = "open_timeout_seconds")]
    pub open_timeout_seconds: u64,
    #[serde(default = "default_slow_threshold_ms", rename = "slow_call_threshold_ms")]
    pub slow_call_threshold_ms: u64,
    #[serde(default = "default_slow_rate_percent", rename = "slow_call_rate_percent")]
    pub slow_call_rate_percent: f64,
    #[serde(default = "default_error_status_code", rename = "error_status_code")]
    pub error_status_code: u16,
    #[serde(default = "default_error_message", rename = "error_message")]
    pub error_message: String,
    #[serde(default = "default_key_strategy", rename = "key_strategy")]
    pub key_strategy: String,
}

fn default_error_rate_percent() -> f64 { 50.0 }
fn default_minimum_requests() -> u64 { 10 }
fn default_half_open_max() -> u64 { 3 }
fn default_open_timeout() -> u64 { 30 }
fn default_slow_threshold_ms() -> u64 { 1000 }
fn default_slow_rate_percent() -> f64 { 50.0 }
fn default_error_status_code() -> u16 { 503 }
fn default_error_message() -> String { "Service Unavailable - Circuit Breaker Open".to_string() }
fn default_key_strategy() -> String { "service".to_string() }

pub fn validate(config: &CircuitBreakerConfig) -> Result<(), ConfigError> {
    if config.error_rate_percent < 1.0 || config.error_rate_percent > 100.0 {
        return Err(ConfigError::InvalidCircuitBreaker {
            id: config.id.clone(),
            message: "error_rate_percent must be within 1..100".to_string(),
        });
    }
    if config.minimum_requests == 0 {
        return Err(ConfigError::InvalidCircuitBreaker {
            id: config.id.clone(),
            message: "minimum_requests must be nonzero".to_string(),
        });
    }
    if config.half_open_max_requests == 0 {
        return Err(ConfigError::InvalidCircuitBreaker {
            id: config.id.clone(),
            message: "half_open_max_requests must be nonzero".to_string(),
        });
    }
    if config.open_timeout_seconds == 0 {
        return Err(ConfigError::InvalidCircuitBreaker {
            id: config.id.clone(),
            message: "open_timeout_seconds must be nonzero".to_string(),
        });
    }
    Ok(())
}

/// Snapshot of one key's state, returned by `get_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitInfo {
    pub key: String,
    pub state: CircuitState,
    pub total_requests: u64,
    pub failure_requests: u64,
    pub slow_requests: u64,
}

/// Notified on state transitions and call outcomes, always outside the
/// breaker's internal lock.
pub trait Listener: Send + Sync {
    fn on_state_change(&self, _key: &str, _from: CircuitState, _to: CircuitState) {}
    fn on_call_success(&self, _key: &str, _response_time_ms: u64) {}
    fn on_call_failure(&self, _key: &str, _response_time_ms: u64) {}
    fn on_call_rejected(&self, _key: &str) {}
}

struct Entry {
    state: CircuitState,
    total_requests: u64,
    failure_requests: u64,
    slow_requests: u64,
    open_time: Option<Instant>,
    half_open_count: u64,
}

impl Entry {
    fn fresh() -> Self {
        Entry {
            state: CircuitState::Closed,
            total_requests: 0,
            failure_requests: 0,
            slow_requests: 0,
            open_time: None,
            half_open_count: 0,
        }
    }

    fn reset_counters(&mut self) {
        self.total_requests = 0;
        self.failure_requests = 0;
        self.slow_requests = 0;
        self.half_open_count = 0;
    }
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    entries: Mutex<HashMap<String, Entry>>,
    listeners: Vec<Box<dyn Listener>>,
}

pub fn build(config: &CircuitBreakerConfig) -> Result<CircuitBreaker, ConfigError> {
    validate(config)?;
    Ok(CircuitBreaker {
        config: config.clone(),
        entries: Mutex::new(HashMap::default()),
        listeners: Vec::new(),
    })
}

impl CircuitBreaker {
    pub fn with_listener(mut self, listener: Box<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn key_for(&self, ctx: &Context) -> String {
        derive_key(&self.config.key_strategy, ctx)
    }

    /// Admission check, run before the upstream call is attempted.
    pub fn handle(&self, ctx: &mut Context) -> bool {
        self.handle_at(ctx, Instant::now())
    }

    fn handle_at(&self, ctx: &mut Context, now: Instant) -> bool {
        let key = self.key_for(ctx);
        ctx.set_attribute("circuit_breaker_key", key.clone());
        // `Instant` has no epoch representation; record wall-clock start so
        // the forwarder can log it alongside the upstream call it's about
        // to make.
        let start_millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        ctx.set_attribute("circuit_breaker_start_time", start_millis);

        let mut transition = None;
        let admitted;
        {
            let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
            let entry = entries.entry(key.clone()).or_insert_with(Entry::fresh);

            admitted = match entry.state {
                CircuitState::Closed => true,
                CircuitState::Open => {
                    let opened_at = entry.open_time.unwrap_or(now);
                    if now.saturating_duration_since(opened_at) >= Duration::from_secs(self.config.open_timeout_seconds) {
                        entry.state = CircuitState::HalfOpen;
                        entry.half_open_count = 0;
                        transition = Some((CircuitState::Open, CircuitState::HalfOpen));
                        true
                    } else {
                        false
                    }
                }
                CircuitState::HalfOpen => entry.half_open_count < self.config.half_open_max_requests,
            };
        }

        if let Some((from, to)) = transition {
            self.notify_state_change(&key, from, to);
        }

        if !admitted {
            self.notify_rejected(&key);
            ctx.abort_with_message(self.config.error_status_code, &self.config.error_message);
        }
        admitted
    }

    pub fn record_success(&self, key: &str, response_time_ms: u64) {
        let slow = response_time_ms > self.config.slow_call_threshold_ms;
        let mut transition = None;
        {
            let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
            let entry = entries.entry(key.to_string()).or_insert_with(Entry::fresh);
            entry.total_requests += 1;
            if slow {
                entry.slow_requests += 1;
            }

            match entry.state {
                CircuitState::Closed => {
                    if self.should_trip(entry) {
                        entry.state = CircuitState::Open;
                        entry.open_time = Some(Instant::now());
                        transition = Some((CircuitState::Closed, CircuitState::Open));
                    }
                }
                CircuitState::HalfOpen => {
                    entry.half_open_count += 1;
                    if entry.half_open_count >= self.config.half_open_max_requests {
                        entry.state = CircuitState::Closed;
                        entry.reset_counters();
                        transition = Some((CircuitState::HalfOpen, CircuitState::Closed));
                    }
                }
                CircuitState::Open => {}
            }
        }
        if let Some((from, to)) = transition {
            self.notify_state_change(key, from, to);
        }
        for listener in &self.listeners {
            listener.on_call_success(key, response_time_ms);
        }
    }

    pub fn record_failure(&self, key: &str, response_time_ms: u64) {
        let slow = response_time_ms > self.config.slow_call_threshold_ms;
        let mut transition = None;
        {
            let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
            let entry = entries.entry(key.to_string()).or_insert_with(Entry::fresh);
            entry.total_requests += 1;
            entry.failure_requests += 1;
            if slow {
                entry.slow_requests += 1;
            }

            match entry.state {
                CircuitState::Closed => {
                    if self.should_trip(entry) {
                        entry.state = CircuitState::Open;
                        entry.open_time = Some(Instant::now());
                        transition = Some((CircuitState::Closed, CircuitState::Open));
                    }
                }
                CircuitState::HalfOpen => {
                    entry.state = CircuitState::Open;
                    entry.open_time = Some(Instant::now());
                    transition = Some((CircuitState::HalfOpen, CircuitState::Open));
                }
                CircuitState::Open => {}
            }
        }
        if let Some((from, to)) = transition {
            self.notify_state_change(key, from, to);
        }
        for listener in &self.listeners {
            listener.on_call_failure(key, response_time_ms);
        }
    }

    /// Trip condition: failure-rate OR slow-rate, both gated on having seen
    /// `minimum_requests`. Tripping on slow-rate too is a deliberate
    /// deviation from the failure-rate-only source behavior — see the
    /// repo's design notes.
    fn should_trip(&self, entry: &Entry) -> bool {
        if entry.total_requests < self.config.minimum_requests {
            return false;
        }
        let failure_rate = entry.failure_requests as f64 / entry.total_requests as f64 * 100.0;
        let slow_rate = entry.slow_requests as f64 / entry.total_requests as f64 * 100.0;
        failure_rate >= self.config.error_rate_percent || slow_rate >= self.config.slow_call_rate_percent
    }

    pub fn force_open(&self, key: &str) {
        let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        let entry = entries.entry(key.to_string()).or_insert_with(Entry::fresh);
        let from = entry.state;
        entry.state = CircuitState::Open;
        entry.open_time = Some(Instant::now());
        drop(entries);
        if from != CircuitState::Open {
            self.notify_state_change(key, from, CircuitState::Open);
        }
    }

    pub fn force_close(&self, key: &str) {
        let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        let entry = entries.entry(key.to_string()).or_insert_with(Entry::fresh);
        let from = entry.state;
        entry.state = CircuitState::Closed;
        entry.reset_counters();
        drop(entries);
        if from != CircuitState::Closed {
            self.notify_state_change(key, from, CircuitState::Closed);
        }
    }

    pub fn reset(&self) {
        let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        entries.clear();
    }

    pub fn get_state(&self, key: &str) -> Option<CircuitState> {
        let entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        entries.get(key).map(|e| e.state)
    }

    pub fn get_info(&self) -> Vec<CircuitInfo> {
        let entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        entries
            .iter()
            .map(|(key, e)| CircuitInfo {
                key: key.clone(),
                state: e.state,
                total_requests: e.total_requests,
                failure_requests: e.failure_requests,
                slow_requests: e.slow_requests,
            })
            .collect()
    }

    fn notify_state_change(&self, key: &str, from: CircuitState, to: CircuitState) {
        warn!("circuit breaker '{}' key '{key}': {from:?} -> {to:?}", self.config.id);
        for listener in &self.listeners {
            listener.on_state_change(key, from, to);
        }
    }

    fn notify_rejected(&self, key: &str) {
        debug!("circuit breaker '{}' key '{key}': rejected, circuit open", self.config.id);
        for listener in &self.listeners {
            listener.on_call_rejected(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cfg() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            id: "b1".to_string(),
            error_rate_percent: 50.0,
            minimum_requests: 4,
            half_open_max_requests: 2,
            open_timeout_seconds: 30,
            slow_call_threshold_ms: 1000,
            slow_call_rate_percent: 80.0,
            error_status_code: 503,
            error_message: "Service Unavailable - Circuit Breaker Open".to_string(),
            key_strategy: "service".to_string(),
        }
    }

    fn ctx() -> Context {
        Context::new(
            "GET",
            "/api",
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            Some("203.0.113.1:1".to_string()),
            Vec::new(),
        )
    }

    #[test]
    fn closed_admits_until_failure_rate_trips() {
        let breaker = build(&cfg()).unwrap();
        let mut c = ctx();
        assert!(breaker.handle(&mut c));
        breaker.record_failure("default", 10);
        breaker.record_failure("default", 10);
        breaker.record_failure("default", 10);
        breaker.record_success("default", 10);
        // 3/4 failures = 75% >= 50% and total_requests (4) >= minimum_requests
        assert_eq!(breaker.get_state("default"), Some(CircuitState::Open));
        let mut c2 = ctx();
        assert!(!breaker.handle(&mut c2));
        assert_eq!(c2.abort_response().unwrap().status, 503);
    }

    #[test]
    fn open_transitions_to_half_open_after_timeout() {
        let mut config = cfg();
        config.open_timeout_seconds = 1;
        let breaker = build(&config).unwrap();
        breaker.force_open("default");
        let mut c = ctx();
        assert!(!breaker.handle_at(&mut c, Instant::now()));
        let later = Instant::now() + Duration::from_secs(2);
        let mut c2 = ctx();
        assert!(breaker.handle_at(&mut c2, later));
        assert_eq!(breaker.get_state("default"), Some(CircuitState::HalfOpen));
    }

    #[test]
    fn half_open_closes_after_enough_successes() {
        let breaker = build(&cfg()).unwrap();
        breaker.force_open("default");
        // Manually drive to half-open by forcing state via force_close-like flow:
        let later = Instant::now() + Duration::from_secs(60);
        let mut c = ctx();
        assert!(breaker.handle_at(&mut c, later));
        assert_eq!(breaker.get_state("default"), Some(CircuitState::HalfOpen));

        breaker.record_success("default", 5);
        assert_eq!(breaker.get_state("default"), Some(CircuitState::HalfOpen));
        breaker.record_success("default", 5);
        assert_eq!(breaker.get_state("default"), Some(CircuitState::Closed));
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let breaker = build(&cfg()).unwrap();
        breaker.force_open("default");
        let later = Instant::now() + Duration::from_secs(60);
        let mut c = ctx();
        assert!(breaker.handle_at(&mut c, later));
        breaker.record_failure("default", 5);
        assert_eq!(breaker.get_state("default"), Some(CircuitState::Open));
    }

    #[test]
    fn listener_is_notified_on_state_change_and_rejection() {
        struct Counting {
            transitions: AtomicUsize,
            rejections: AtomicUsize,
        }
        impl Listener for Counting {
            fn on_state_change(&self, _key: &str, _from: CircuitState, _to: CircuitState) {
                self.transitions.fetch_add(1, Ordering::SeqCst);
            }
            fn on_call_rejected(&self, _key: &str) {
                self.rejections.fetch_add(1, Ordering::SeqCst);
            }
        }
        let counters = Arc::new(Counting {
            transitions: AtomicUsize::new(0),
            rejections: AtomicUsize::new(0),
        });

        struct Forwarding(Arc<Counting>);
        impl Listener for Forwarding {
            fn on_state_change(&self, key: &str, from: CircuitState, to: CircuitState) {
                self.0.on_state_change(key, from, to);
            }
            fn on_call_rejected(&self, key: &str) {
                self.0.on_call_rejected(key);
            }
        }

        let breaker = build(&cfg()).unwrap().with_listener(Box::new(Forwarding(counters.clone())));
        breaker.force_open("default");
        let mut c = ctx();
        assert!(!breaker.handle_at(&mut c, Instant::now()));

        assert_eq!(counters.transitions.load(Ordering::SeqCst), 1);
        assert_eq!(counters.rejections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = cfg();
        config.minimum_requests = 0;
        assert!(build(&config).is_err());
    }
}
