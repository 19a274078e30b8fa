//! Handler chain (consumed by [`crate::route::Route`]): Security → CORS →
//! Auth → Limiter → Filters.
//!
//! Limiter and breaker are already closed enums (see [`crate::limiter`] and
//! [`crate::breaker`]) and run from `Route::handle` directly; this module
//! covers the four handler kinds the Dynamic-dispatch design note calls out
//! as staying behind a `Box<dyn Handler>` — security and CORS headers,
//! JWT auth, and the open-ended filter chain.

pub mod auth;
pub mod cors;
pub mod filters;
pub mod security;

use crate::context::Context;
use crate::error::ConfigError;

/// Uniform contract every handler in the chain implements.
pub trait Handler: Send + Sync {
    /// Runs the handler. `false` means "stop the chain here."
    fn handle(&self, ctx: &mut Context) -> bool;
    fn is_enabled(&self) -> bool;
    fn name(&self) -> &str;
}

pub use auth::{AuthConfig, JwtAuthHandler};
pub use cors::{CorsConfig, CorsHandler};
pub use filters::{FilterConfig, FilterHandler};
pub use security::{SecurityConfig, SecurityHeadersHandler};

/// Builds the filter chain from ordered `FilterConfig`s (the "Filters"
/// stage of Route.Handle, in config order).
pub fn build_filters(configs: &[FilterConfig]) -> Result<Vec<Box<dyn Handler>>, ConfigError> {
    configs.iter().map(|c| filters::build(c).map(|h| Box::new(h) as Box<dyn Handler>)).collect()
}
