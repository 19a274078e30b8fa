//! Security-headers handler: stamps a fixed set of hardening headers onto
//! every response. Scoped per route and expressed through the Context's
//! response-header queue instead of an actix middleware, since Route
//! handlers don't see the response directly.

use super::Handler;
use crate::context::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra headers layered on top of the defaults below; later entries
    /// with the same name win.
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
}

fn default_true() -> bool {
    true
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_headers: Vec::new(),
        }
    }
}

const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "1; mode=block"),
    ("Strict-Transport-Security", "max-age=31536000; includeSubDomains"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
    ("Content-Security-Policy", "default-src 'self'"),
    ("Permissions-Policy", "geolocation=(), microphone=(), camera=()"),
];

pub struct SecurityHeadersHandler {
    config: SecurityConfig,
}

impl SecurityHeadersHandler {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }
}

impl Handler for SecurityHeadersHandler {
    fn handle(&self, ctx: &mut Context) -> bool {
        if self.config.enabled {
            for (name, value) in DEFAULT_HEADERS {
                ctx.add_response_header(*name, *value);
            }
            for (name, value) in &self.config.extra_headers {
                ctx.add_response_header(name.clone(), value.clone());
            }
        }
        true
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn name(&self) -> &str {
        "security"
    }
}
