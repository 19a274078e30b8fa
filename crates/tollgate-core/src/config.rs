//! Top-level gateway configuration: the JSON file a deploy ships, its
//! loader, and its comprehensive validator.
//!
//! Path resolution, canonicalization against the working directory, a size
//! cap, and JSON parsing, followed by a comprehensive validation pass that
//! collects errors/warnings/recommendations rather than failing on the first
//! problem found.

use crate::breaker::{self, CircuitBreakerConfig};
use crate::error::ConfigError;
use crate::limiter::RateLimitConfig;
use crate::route::RouteConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const MAX_CONFIG_BYTES: u64 = 10 * 1024 * 1024;
const CONFIG_PATH_ENV_VAR: &str = "TOLLGATE_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "gateway.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayDefaults {
    #[serde(default, rename = "rate_limit")]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default, rename = "circuit_breaker")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub version: String,
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub defaults: GatewayDefaults,
}

fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(from_env) = std::env::var(CONFIG_PATH_ENV_VAR) {
        return PathBuf::from(from_env);
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Loads and parses the gateway config file. Does not validate semantics —
/// see [`ConfigValidator::validate_comprehensive`] for that.
pub fn load_gateway_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let requested = resolve_path(path);
    let display_path = requested.display().to_string();

    let canonical = requested.canonicalize().map_err(|e| ConfigError::LoadFailed {
        path: display_path.clone(),
        message: e.to_string(),
    })?;

    let cwd = std::env::current_dir().map_err(|e| ConfigError::LoadFailed {
        path: display_path.clone(),
        message: e.to_string(),
    })?;
    let canonical_cwd = cwd.canonicalize().unwrap_or(cwd);

    if !canonical.starts_with(&canonical_cwd) {
        return Err(ConfigError::LoadFailed {
            path: display_path,
            message: "config path escapes the working directory".to_string(),
        });
    }

    let metadata = std::fs::metadata(&canonical).map_err(|e| ConfigError::LoadFailed {
        path: display_path.clone(),
        message: e.to_string(),
    })?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ConfigError::LoadFailed {
            path: display_path,
            message: format!("config file exceeds {MAX_CONFIG_BYTES} bytes"),
        });
    }

    let contents = std::fs::read_to_string(&canonical).map_err(|e| ConfigError::LoadFailed {
        path: display_path.clone(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&contents).map_err(|e| ConfigError::LoadFailed {
        path: display_path,
        message: e.to_string(),
    })
}

/// Result of a comprehensive config validation pass: errors block startup,
/// warnings and recommendations are logged but non-fatal.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_comprehensive(config: &GatewayConfig) -> ValidationResult {
        let mut result = ValidationResult::default();
        let mut seen_ids = HashSet::new();
        let mut priority_owners: std::collections::HashMap<i32, Vec<String>> = std::collections::HashMap::new();

        for route in &config.routes {
            if route.id.is_empty() {
                result.errors.push("route has an empty id".to_string());
            } else if !seen_ids.insert(route.id.clone()) {
                result.errors.push(format!("duplicate route id '{}'", route.id));
            }
            if route.service_id.is_empty() {
                result.errors.push(format!("route '{}' has an empty service_id", route.id));
            }

            if let Err(e) = crate::route::build(route, config.defaults.rate_limit.as_ref()) {
                result.errors.push(e.to_string());
            }

            if route.enabled {
                priority_owners.entry(route.priority).or_default().push(route.id.clone());
            }

            if let Some(group) = &route.assertion_group {
                if group.assertions.is_empty() {
                    result.warnings.push(format!(
                        "route '{}' has an assertion group with no assertions (always matches)",
                        route.id
                    ));
                }
            } else if route.path == "/" || route.path.ends_with("**") || route.path.trim_end_matches('/').is_empty() {
                result.recommendations.push(format!(
                    "route '{}' is a catch-all with no assertion group; consider adding assertions",
                    route.id
                ));
            }

            if let Some(rl) = route.limiter_config.as_ref() {
                validate_rate_limit(&route.id, rl, &mut result);
            }
        }

        for (priority, owners) in priority_owners {
            if owners.len() > 1 {
                result.warnings.push(format!(
                    "priority {priority} is shared by routes {owners:?}; resolution falls back to insertion order"
                ));
            }
        }

        if let Some(rl) = &config.defaults.rate_limit {
            validate_rate_limit("defaults.rate_limit", rl, &mut result);
        }
        if let Some(cb) = &config.defaults.circuit_breaker {
            if let Err(e) = breaker::validate(cb) {
                result.errors.push(e.to_string());
            }
            if cb.error_rate_percent < 10.0 {
                result.warnings.push("defaults.circuit_breaker.error_rate_percent below 10 is overly aggressive".to_string());
            }
        }

        result
    }
}

fn validate_rate_limit(owner: &str, rl: &RateLimitConfig, result: &mut ValidationResult) {
    if rl.rate <= 0.0 {
        result.errors.push(format!("rate limit '{owner}' has a non-positive rate"));
    }
    if let Some(window) = rl.window_size_seconds {
        if window == 0 {
            result.errors.push(format!("rate limit '{owner}' has a zero window_size"));
        }
    }
    if let Some(burst) = rl.burst {
        if burst < 1.0 {
            result.warnings.push(format!("rate limit '{owner}' burst below 1 will be floored to 1"));
        }
    }
    if rl.key_strategy == "ip" {
        result.recommendations.push(format!(
            "rate limit '{owner}' keys by ip; confirm forwarded-header trust is configured if served behind a load balancer"
        ));
    }
}
