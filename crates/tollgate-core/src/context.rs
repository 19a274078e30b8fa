//! The per-request `Context` (component C8) that flows through routing and
//! every handler in the chain.
//!
//! Deliberately transport-agnostic: the core crate never sees an
//! `actix_web::HttpRequest` directly, only the already-resolved pieces
//! (method, path, query, headers, cookies, remote address, buffered body)
//! that the binary crate's forwarder extracts up front, with the body
//! already fully read instead of a streaming reader.

use crate::error::EvaluationError;
use serde_json::Value;
use std::collections::HashMap;

/// Response the gateway should send when a handler aborts the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct AbortResponse {
    pub status: u16,
    pub body: Value,
}

/// Per-request state shared across routing and the handler chain.
///
/// The attribute bag is a plain `HashMap<String, Value>` rather than
/// `Box<dyn Any>` — every named attribute (`route_id`,
/// `rate_limit_key`, `path_params`, ...) is JSON-shaped data the forwarder
/// eventually needs to log or expose anyway, so `serde_json::Value` avoids a
/// downcast dance for no benefit. Single-threaded within one request: one
/// worker owns one `Context` end to end, so no locking is needed here.
pub struct Context {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, Vec<String>>,
    pub headers: HashMap<String, Vec<String>>,
    pub cookies: HashMap<String, String>,
    pub remote_addr: Option<String>,
    pub body: Vec<u8>,

    attributes: HashMap<String, Value>,
    errors: Vec<EvaluationError>,
    abort: Option<AbortResponse>,
    response_headers: Vec<(String, String)>,
}

impl Context {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        query: HashMap<String, Vec<String>>,
        headers: HashMap<String, Vec<String>>,
        cookies: HashMap<String, String>,
        remote_addr: Option<String>,
        body: Vec<u8>,
    ) -> Self {
        // Header lookups are case-insensitive over the wire; normalize keys
        // to lowercase once here instead of at every assertion evaluation.
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        Self {
            method: method.into(),
            path: path.into(),
            query,
            headers,
            cookies,
            remote_addr,
            body,
            attributes: HashMap::new(),
            errors: Vec::new(),
            abort: None,
            response_headers: Vec::new(),
        }
    }

    /// First value of the named header, or `""` if absent; query lookups
    /// follow the same first-value-or-empty rule.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn header_exists(&self, name: &str) -> bool {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).and_then(|v| v.first()).map(|s| s.as_str())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }

    pub fn body_as_str(&self) -> Result<&str, EvaluationError> {
        std::str::from_utf8(&self.body).map_err(|e| EvaluationError::BodyRead(e.to_string()))
    }

    /// Effective client IP: `X-Forwarded-For`'s first hop, then
    /// `X-Real-IP`, then the host part of the transport-level remote
    /// address.
    pub fn client_ip(&self) -> String {
        if let Some(forwarded) = self.headers.get("x-forwarded-for").and_then(|v| v.first()) {
            if let Some(first) = forwarded.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        if !self.header("x-real-ip").is_empty() {
            return self.header("x-real-ip").to_string();
        }
        self.remote_addr
            .as_deref()
            .map(host_part)
            .unwrap_or_default()
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_path_params(&mut self, params: HashMap<String, String>) {
        let value: Value = params
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect::<serde_json::Map<_, _>>()
            .into();
        self.set_attribute("path_params", value);
    }

    pub fn push_error(&mut self, error: EvaluationError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[EvaluationError] {
        &self.errors
    }

    /// Aborts the request with a JSON `{"error": message}` body, matching
    /// the rejection contract every limiter/breaker handler uses.
    pub fn abort_with_message(&mut self, status: u16, message: &str) {
        self.abort = Some(AbortResponse {
            status,
            body: serde_json::json!({ "error": message }),
        });
    }

    pub fn abort_with_body(&mut self, status: u16, body: Value) {
        self.abort = Some(AbortResponse { status, body });
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    pub fn abort_response(&self) -> Option<&AbortResponse> {
        self.abort.as_ref()
    }

    /// Queues a header the forwarder should stamp onto the eventual
    /// response — how the Security and CORS handlers apply their headers
    /// without the core crate needing to know about `HttpResponse`.
    pub fn add_response_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response_headers.push((name.into(), value.into()));
    }

    pub fn response_headers(&self) -> &[(String, String)] {
        &self.response_headers
    }
}

fn host_part(remote_addr: &str) -> String {
    remote_addr
        .rsplit_once(':')
        .map(|(host, _port)| host.to_string())
        .unwrap_or_else(|| remote_addr.to_string())
}
