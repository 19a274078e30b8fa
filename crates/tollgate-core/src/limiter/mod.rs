//! RateLimiter (component C4): uniform `admit(ctx) -> bool` contract over
//! three algorithms (token-bucket, sliding-window, none).

mod sliding_window;
mod token_bucket;

use crate::context::Context;
use crate::error::ConfigError;
use crate::keying::derive_key;
use serde::{Deserialize, Serialize};
use sliding_window::SlidingWindowLimiter;
use std::time::{Duration, Instant};
use token_bucket::TokenBucketLimiter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub id: String,
    /// `token-bucket | sliding-window | none`.
    pub algorithm: String,
    /// `ip | service | api`, or a custom Context attribute name.
    #[serde(default = "default_key_strategy", rename = "key_strategy")]
    pub key_strategy: String,
    pub rate: f64,
    pub burst: Option<f64>,
    #[serde(rename = "window_size")]
    pub window_size_seconds: Option<u64>,
    #[serde(rename = "error_status_code")]
    pub error_status_code: Option<u16>,
    #[serde(rename = "error_message")]
    pub error_message: Option<String>,
}

fn default_key_strategy() -> String {
    "service".to_string()
}

/// A built rate limiter. Closed enum over a fixed, enumerated algorithm set
/// (see the Dynamic-dispatch design note in DESIGN.md).
pub enum RateLimiter {
    TokenBucket {
        limiter: TokenBucketLimiter,
        key_strategy: String,
        error_status_code: u16,
        error_message: String,
    },
    SlidingWindow {
        limiter: SlidingWindowLimiter,
        key_strategy: String,
        error_status_code: u16,
        error_message: String,
    },
    None,
}

pub fn build(config: &RateLimitConfig) -> Result<RateLimiter, ConfigError> {
    let error_status_code = config.error_status_code.unwrap_or(429);
    let error_message = config
        .error_message
        .clone()
        .unwrap_or_else(|| "Too Many Requests".to_string());
    let key_strategy = config.key_strategy.clone();

    match config.algorithm.as_str() {
        "token-bucket" => {
            if config.rate <= 0.0 {
                return Err(ConfigError::InvalidRateLimit {
                    id: config.id.clone(),
                    message: "rate must be positive".to_string(),
                });
            }
            let burst = config.burst.filter(|b| *b > 0.0).unwrap_or((config.rate / 2.0).max(1.0));
            Ok(RateLimiter::TokenBucket {
                limiter: TokenBucketLimiter::new(config.rate, burst),
                key_strategy,
                error_status_code,
                error_message,
            })
        }
        "sliding-window" => {
            if config.rate <= 0.0 {
                return Err(ConfigError::InvalidRateLimit {
                    id: config.id.clone(),
                    message: "rate must be positive".to_string(),
                });
            }
            let window_size = config.window_size_seconds.filter(|w| *w > 0).unwrap_or(60);
            Ok(RateLimiter::SlidingWindow {
                limiter: SlidingWindowLimiter::new(config.rate as u64, Duration::from_secs(window_size)),
                key_strategy,
                error_status_code,
                error_message,
            })
        }
        "none" => Ok(RateLimiter::None),
        other => Err(ConfigError::InvalidRateLimit {
            id: config.id.clone(),
            message: format!("unknown algorithm '{other}'"),
        }),
    }
}

impl RateLimiter {
    /// Admission check. On rejection the Context is aborted and diagnostic
    /// attributes are recorded regardless of outcome, per §4.4.
    pub fn handle(&self, ctx: &mut Context) -> bool {
        self.handle_at(ctx, Instant::now())
    }

    fn handle_at(&self, ctx: &mut Context, now: Instant) -> bool {
        match self {
            RateLimiter::None => true,
            RateLimiter::TokenBucket { limiter, key_strategy, error_status_code, error_message } => {
                let key = derive_key(key_strategy, ctx);
                let admitted = limiter.admit(&key, now);
                record_outcome(ctx, &key, "token-bucket", admitted, *error_status_code, error_message);
                admitted
            }
            RateLimiter::SlidingWindow { limiter, key_strategy, error_status_code, error_message } => {
                let key = derive_key(key_strategy, ctx);
                let admitted = limiter.admit(&key, now);
                record_outcome(ctx, &key, "sliding-window", admitted, *error_status_code, error_message);
                admitted
            }
        }
    }
}

fn record_outcome(
    ctx: &mut Context,
    key: &str,
    algorithm: &str,
    admitted: bool,
    error_status_code: u16,
    error_message: &str,
) {
    ctx.set_attribute("rate_limited", !admitted);
    ctx.set_attribute("rate_limit_key", key);
    ctx.set_attribute("rate_limit_algorithm", algorithm);
    if !admitted {
        ctx.abort_with_message(error_status_code, error_message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

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
    fn none_algorithm_always_admits() {
        let limiter = build(&RateLimitConfig {
            id: "r1".to_string(),
            algorithm: "none".to_string(),
            key_strategy: "ip".to_string(),
            rate: 1.0,
            burst: None,
            window_size_seconds: None,
            error_status_code: None,
            error_message: None,
        })
        .unwrap();
        let mut c = ctx();
        assert!(limiter.handle(&mut c));
        assert!(!c.is_aborted());
    }

    #[test]
    fn token_bucket_defaults_burst_to_half_rate_floored_at_one() {
        let limiter = build(&RateLimitConfig {
            id: "r1".to_string(),
            algorithm: "token-bucket".to_string(),
            key_strategy: "ip".to_string(),
            rate: 1.0,
            burst: None,
            window_size_seconds: None,
            error_status_code: None,
            error_message: None,
        })
        .unwrap();
        let t0 = Instant::now();
        let mut c1 = ctx();
        assert!(limiter.handle_at(&mut c1, t0));
        let mut c2 = ctx();
        assert!(!limiter.handle_at(&mut c2, t0)); // burst floored to 1, already spent
        assert!(c2.is_aborted());
        assert_eq!(c2.abort_response().unwrap().status, 429);
    }

    #[test]
    fn rejection_sets_diagnostic_attributes() {
        let limiter = build(&RateLimitConfig {
            id: "r1".to_string(),
            algorithm: "token-bucket".to_string(),
            key_strategy: "ip".to_string(),
            rate: 1.0,
            burst: Some(1.0),
            window_size_seconds: None,
            error_status_code: Some(503),
            error_message: Some("slow down".to_string()),
        })
        .unwrap();
        let t0 = Instant::now();
        let mut c = ctx();
        assert!(limiter.handle_at(&mut c, t0));
        let mut c2 = ctx();
        assert!(!limiter.handle_at(&mut c2, t0));
        assert_eq!(c2.attribute("rate_limited").unwrap(), &serde_json::json!(true));
        assert_eq!(c2.attribute("rate_limit_algorithm").unwrap(), "token-bucket");
        assert_eq!(c2.abort_response().unwrap().status, 503);
    }

    #[test]
    fn unknown_algorithm_is_a_config_error() {
        let err = build(&RateLimitConfig {
            id: "r1".to_string(),
            algorithm: "bogus".to_string(),
            key_strategy: "ip".to_string(),
            rate: 1.0,
            burst: None,
            window_size_seconds: None,
            error_status_code: None,
            error_message: None,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRateLimit { .. }));
    }
}
