//! CORS handler: a per-route, origin-aware handler supporting wildcard or
//! explicit origin lists and a credentials mode.

use super::Handler;
use crate::context::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "default_headers")]
    pub allowed_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
}

fn default_true() -> bool {
    true
}
fn default_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string(), "PUT".to_string(), "DELETE".to_string(), "OPTIONS".to_string()]
}
fn default_headers() -> Vec<String> {
    vec!["Content-Type".to_string(), "Authorization".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: default_origins(),
            allowed_methods: default_methods(),
            allowed_headers: default_headers(),
            allow_credentials: false,
        }
    }
}

pub struct CorsHandler {
    config: CorsConfig,
}

impl CorsHandler {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.config.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }
}

impl Handler for CorsHandler {
    fn handle(&self, ctx: &mut Context) -> bool {
        if !self.config.enabled {
            return true;
        }

        let origin = ctx.header("origin").to_string();
        if !origin.is_empty() && self.origin_allowed(&origin) {
            let allow_origin = if self.config.allowed_origins.iter().any(|o| o == "*") && !self.config.allow_credentials {
                "*".to_string()
            } else {
                origin
            };
            ctx.add_response_header("Access-Control-Allow-Origin", allow_origin);
            ctx.add_response_header("Access-Control-Allow-Methods", self.config.allowed_methods.join(", "));
            ctx.add_response_header("Access-Control-Allow-Headers", self.config.allowed_headers.join(", "));
            if self.config.allow_credentials {
                ctx.add_response_header("Access-Control-Allow-Credentials", "true");
            }
        }

        // A preflight request never reaches the upstream: answer it here.
        if ctx.method.eq_ignore_ascii_case("OPTIONS") {
            ctx.abort_with_body(204, serde_json::Value::Null);
            return false;
        }

        true
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn name(&self) -> &str {
        "cors"
    }
}
