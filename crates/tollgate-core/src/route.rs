//! Route (component C6): a pre-built, immutable rule mapping matching
//! requests to a service identity and a handler chain.
//!
//! The circuit breaker is deliberately absent from this module — per the
//! breaker-wiring design note, admission against the breaker happens in the
//! binary crate's forwarder immediately before the upstream call, not as a
//! Route.Handle stage, since the breaker is keyed per-service and shared
//! across every route rather than owned by one.

use crate::context::Context;
use crate::error::ConfigError;
use crate::group::{self, AssertionGroup, AssertionGroupConfig};
use crate::handlers::{
    self, AuthConfig, CorsConfig, CorsHandler, FilterConfig, Handler, JwtAuthHandler, SecurityConfig,
    SecurityHeadersHandler,
};
use crate::limiter::{self, RateLimitConfig, RateLimiter};
use crate::path::PathPattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "service_id")]
    pub service_id: String,
    pub path: String,
    /// `exact | prefix | regex | param`; defaults to `prefix`.
    #[serde(default, rename = "path_type")]
    pub path_type: Option<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, rename = "assertion_group")]
    pub assertion_group: Option<AssertionGroupConfig>,
    #[serde(default, rename = "filter_configs")]
    pub filter_configs: Vec<FilterConfig>,
    #[serde(default, rename = "cors_config")]
    pub cors_config: Option<CorsConfig>,
    #[serde(default, rename = "limiter_config")]
    pub limiter_config: Option<RateLimitConfig>,
    #[serde(default, rename = "auth_config")]
    pub auth_config: Option<AuthConfig>,
    #[serde(default, rename = "security_config")]
    pub security_config: Option<SecurityConfig>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_true() -> bool {
    true
}

pub struct Route {
    pub id: String,
    pub service_id: String,
    pub priority: i32,
    pub enabled: bool,
    path_matcher: PathPattern,
    methods: HashSet<String>,
    any_method: bool,
    assertion_group: Option<AssertionGroup>,
    security: SecurityHeadersHandler,
    cors: CorsHandler,
    auth: Option<JwtAuthHandler>,
    limiter: RateLimiter,
    filters: Vec<Box<dyn Handler>>,
}

pub fn build(config: &RouteConfig, default_rate_limit: Option<&RateLimitConfig>) -> Result<Route, ConfigError> {
    if config.id.is_empty() {
        return Err(ConfigError::InvalidRoute {
            id: config.id.clone(),
            message: "id must not be empty".to_string(),
        });
    }
    if config.service_id.is_empty() {
        return Err(ConfigError::InvalidRoute {
            id: config.id.clone(),
            message: "service_id must not be empty".to_string(),
        });
    }

    let path_matcher = match config.path_type.as_deref() {
        Some("exact") => PathPattern::exact(&config.path),
        Some("regex") => PathPattern::regex(&config.path)?,
        Some("param") => PathPattern::param(&config.path)?,
        Some("prefix") | None => PathPattern::prefix(&config.path)?,
        Some(other) => {
            return Err(ConfigError::InvalidRoute {
                id: config.id.clone(),
                message: format!("unknown path_type '{other}'"),
            })
        }
    };

    let any_method = config.methods.is_empty() || config.methods.iter().any(|m| m == "*");
    let methods = config.methods.iter().map(|m| m.to_uppercase()).collect();

    let assertion_group = config.assertion_group.as_ref().map(group::build).transpose()?;

    let security = SecurityHeadersHandler::new(config.security_config.clone().unwrap_or_default());
    let cors = CorsHandler::new(config.cors_config.clone().unwrap_or_default());
    let auth = config.auth_config.clone().map(JwtAuthHandler::new);

    let limiter_config = config.limiter_config.as_ref().or(default_rate_limit);
    let rate_limiter = match limiter_config {
        Some(lc) => limiter::build(lc)?,
        None => RateLimiter::None,
    };

    let filters = handlers::build_filters(&config.filter_configs)?;

    Ok(Route {
        id: config.id.clone(),
        service_id: config.service_id.clone(),
        priority: config.priority,
        enabled: config.enabled,
        path_matcher,
        methods,
        any_method,
        assertion_group,
        security,
        cors,
        auth,
        limiter: rate_limiter,
        filters,
    })
}

impl Route {
    /// Tests whether this route matches `ctx`. A matching `param` path
    /// writes its captured bindings into `ctx`.
    pub fn matches(&self, ctx: &mut Context) -> bool {
        if !self.enabled {
            return false;
        }

        let (path_matched, bindings) = self.path_matcher.matches(&ctx.path);
        if !path_matched {
            return false;
        }

        if !self.any_method && !self.methods.contains(&ctx.method.to_uppercase()) {
            return false;
        }

        if let Some(bindings) = bindings {
            if !bindings.is_empty() {
                ctx.set_path_params(bindings);
            }
        }

        match &self.assertion_group {
            Some(group) => match group.evaluate(ctx) {
                Ok(result) => result,
                Err(err) => {
                    ctx.push_error(err);
                    false
                }
            },
            None => true,
        }
    }

    /// Runs this route's handler chain: Security → CORS → Auth → Limiter →
    /// Filters, in that fixed order. Returns `false` on the first abort.
    pub fn handle(&self, ctx: &mut Context) -> bool {
        ctx.set_attribute("route_id", self.id.clone());
        ctx.set_attribute("service_id", self.service_id.clone());
        ctx.set_attribute("matched_path", ctx.path.clone());

        if !self.security.handle(ctx) {
            return false;
        }
        if !self.cors.handle(ctx) {
            return false;
        }
        if let Some(auth) = &self.auth {
            if !auth.handle(ctx) {
                return false;
            }
        }
        if !self.limiter.handle(ctx) {
            return false;
        }
        for filter in &self.filters {
            if !filter.handle(ctx) {
                return false;
            }
        }
        true
    }
}
