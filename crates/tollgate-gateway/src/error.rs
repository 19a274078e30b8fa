//! HTTP-facing error taxonomy for the gateway binary.
//!
//! The core crate's errors (`ConfigError`, `EvaluationError`) never reach a
//! client; this is what a failed forwarder call maps to instead, giving each
//! failure mode a status code and a `{"error", "type"}` JSON body.

use actix_web::{http::StatusCode, HttpResponse};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route matches {path}")]
    RouteNotFound { path: String },

    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("upstream call to {url} failed: {message}")]
    Upstream { message: String, url: String },

    #[error("upstream call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("circuit breaker open for {key}")]
    CircuitOpen { key: String },

    #[error("rate limit exceeded for {key}")]
    RateLimited { key: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(rename = "type")]
    kind: &'a str,
}

impl GatewayError {
    fn kind(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound { .. } => "route_not_found",
            GatewayError::MethodNotAllowed { .. } => "method_not_allowed",
            GatewayError::Config { .. } => "config",
            GatewayError::Upstream { .. } => "upstream",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::CircuitOpen { .. } => "circuit_open",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::Internal { .. } => "internal",
        }
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Config { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::error::ResponseError;

    #[test]
    fn timeout_maps_to_504() {
        let err = GatewayError::Timeout { seconds: 5 };
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn circuit_open_maps_to_503() {
        let err = GatewayError::CircuitOpen { key: "svc".to_string() };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err = GatewayError::RateLimited { key: "svc".to_string() };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn error_body_carries_type_tag() {
        let err = GatewayError::Config { message: "bad".to_string() };
        assert_eq!(err.kind(), "config");
    }
}
