//! Error taxonomy for the gateway core.
//!
//! The core crate never touches a socket or a web framework, so these error
//! types stay transport-agnostic: construction-time failures (`ConfigError`)
//! are surfaced to whoever builds a `Route`/`Router`, while request-time
//! failures (`EvaluationError`) are folded into a `Context`'s error list.
//! Mapping either to an HTTP response is the binary crate's job.

use thiserror::Error;

/// Failure while turning declarative configuration into runtime objects.
///
/// Construction errors never occur at request time; they bubble straight to
/// the config loader/validator so a bad deploy is rejected before it takes
/// traffic.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("assertion '{id}': unknown type '{ty}'")]
    UnknownAssertionType { id: String, ty: String },

    #[error("assertion '{id}': unknown operator '{operator}'")]
    UnknownOperator { id: String, operator: String },

    #[error("assertion '{id}': regex compilation failed: {source}")]
    InvalidRegex { id: String, source: String },

    #[error("assertion '{id}': missing required field '{field}'")]
    MissingField { id: String, field: String },

    #[error("route '{id}': {message}")]
    InvalidRoute { id: String, message: String },

    #[error("rate limit config '{id}': {message}")]
    InvalidRateLimit { id: String, message: String },

    #[error("circuit breaker config '{id}': {message}")]
    InvalidCircuitBreaker { id: String, message: String },

    #[error("path pattern '{pattern}' is invalid: {message}")]
    InvalidPath { pattern: String, message: String },

    #[error("failed to load config from '{path}': {message}")]
    LoadFailed { path: String, message: String },
}

/// Failure while evaluating an assertion or handler against a live request.
///
/// Unlike [`ConfigError`], this happens mid-request. It's treated as a
/// normal (if unhappy) outcome: it gets appended to the [`crate::context::Context`]
/// error list and the request aborts with a 500 unless something downstream
/// recovers.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum EvaluationError {
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("request was cancelled")]
    Cancelled,
}
