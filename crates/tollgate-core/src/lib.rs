//! Request-processing core of the tollgate API gateway.
//!
//! Transport-agnostic by design: nothing in this crate touches a socket,
//! an HTTP framework, or `tokio`. A [`Context`](context::Context) is built
//! from whatever the caller already parsed, handed to a [`Router`], and
//! the result tells the caller what to do next — forward to the upstream,
//! or respond with whatever [`Context::abort_response`](context::Context::abort_response)
//! holds. The `tollgate-gateway` binary crate is the one concrete caller.
//!
//! Dependency order mirrors the pipeline a request actually goes through:
//! comparator → assertion → group → {limiter, breaker} → route → router,
//! with `context` threaded through all of it.

pub mod assertion;
pub mod breaker;
pub mod comparator;
pub mod config;
pub mod context;
pub mod error;
pub mod group;
pub mod handlers;
pub mod keying;
pub mod limiter;
pub mod path;
pub mod route;
pub mod router;

pub use config::{ConfigValidator, GatewayConfig, GatewayDefaults, ValidationResult};
pub use context::Context;
pub use error::{ConfigError, EvaluationError};
pub use route::{Route, RouteConfig};
pub use router::{Outcome, Router};
