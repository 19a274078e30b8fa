//! Forwards an admitted request to its resolved upstream and feeds the
//! outcome back into the circuit breaker.
//!
//! A pooled `reqwest::Client`, a per-call timeout, and hop-by-hop header
//! filtering. Every admitted request produces exactly one
//! `record_success`/`record_failure` call so the breaker's rolling counters
//! stay accurate.

use crate::error::GatewayError;
use crate::upstream::UpstreamRegistry;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, warn};
use reqwest::{
    header::{HeaderMap as ReqwestHeaderMap, HeaderName, HeaderValue},
    Client, Method as ReqwestMethod,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tollgate_core::breaker::CircuitBreaker;
use tollgate_core::context::AbortResponse;
use tollgate_core::{Context, Outcome, Router};

/// Headers that must not cross from one hop to the next verbatim.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

#[derive(Clone)]
pub struct Forwarder {
    client: Client,
    router: Arc<Router>,
    breaker: Option<Arc<CircuitBreaker>>,
    upstreams: Arc<UpstreamRegistry>,
    timeout_seconds: u64,
}

impl Forwarder {
    pub fn new(
        router: Arc<Router>,
        breaker: Option<Arc<CircuitBreaker>>,
        upstreams: Arc<UpstreamRegistry>,
        timeout_seconds: u64,
    ) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("failed to build upstream http client");
        Forwarder {
            client,
            router,
            breaker,
            upstreams,
            timeout_seconds,
        }
    }

    pub async fn handle(&self, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, GatewayError> {
        let mut ctx = build_context(&req, body);

        match self.router.dispatch(&mut ctx) {
            Outcome::NotFound | Outcome::Rejected => Ok(abort_response(&ctx)),
            Outcome::Admitted => self.forward(ctx).await,
        }
    }

    async fn forward(&self, mut ctx: Context) -> Result<HttpResponse, GatewayError> {
        let service_id = ctx
            .attribute("service_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let breaker_key = match &self.breaker {
            Some(breaker) => {
                if !breaker.handle(&mut ctx) {
                    return Ok(abort_response(&ctx));
                }
                ctx.attribute("circuit_breaker_key")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            }
            None => None,
        };

        let base_url = self.upstreams.resolve(&service_id).ok_or_else(|| GatewayError::Config {
            message: format!("no upstream registered for service '{service_id}'"),
        })?;
        let url = format!("{base_url}{}", ctx.path);

        let method = ReqwestMethod::from_bytes(ctx.method.as_bytes()).map_err(|_| GatewayError::Internal {
            message: format!("unsupported method '{}'", ctx.method),
        })?;

        let mut headers = ReqwestHeaderMap::new();
        for (name, values) in &ctx.headers {
            if HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            for value in values {
                if let Ok(header_value) = HeaderValue::from_str(value) {
                    headers.append(header_name.clone(), header_value);
                }
            }
        }

        let request = self.client.request(method, &url).headers(headers).body(ctx.body.clone());

        let started = Instant::now();
        let outcome = timeout(Duration::from_secs(self.timeout_seconds), request.send()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(response)) => {
                if let (Some(breaker), Some(key)) = (&self.breaker, &breaker_key) {
                    breaker.record_success(key, elapsed_ms);
                }
                Ok(build_response(response, &ctx).await)
            }
            Ok(Err(e)) => {
                warn!("upstream call to {url} failed: {e}");
                if let (Some(breaker), Some(key)) = (&self.breaker, &breaker_key) {
                    breaker.record_failure(key, elapsed_ms);
                }
                Err(GatewayError::Upstream { message: e.to_string(), url })
            }
            Err(_) => {
                debug!("upstream call to {url} timed out after {}s", self.timeout_seconds);
                if let (Some(breaker), Some(key)) = (&self.breaker, &breaker_key) {
                    breaker.record_failure(key, elapsed_ms);
                }
                Err(GatewayError::Timeout { seconds: self.timeout_seconds })
            }
        }
    }
}

fn build_context(req: &HttpRequest, body: web::Bytes) -> Context {
    let mut headers: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            headers.entry(name.as_str().to_string()).or_default().push(v.to_string());
        }
    }

    let mut cookies: HashMap<String, String> = HashMap::new();
    if let Ok(jar) = req.cookies() {
        for cookie in jar.iter() {
            cookies.insert(cookie.name().to_string(), cookie.value().to_string());
        }
    }

    let remote_addr = req.peer_addr().map(|addr| addr.to_string());

    Context::new(
        req.method().as_str(),
        req.path(),
        parse_query(req.query_string()),
        headers,
        cookies,
        remote_addr,
        body.to_vec(),
    )
}

fn parse_query(qs: &str) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for pair in qs.split('&').filter(|p| !p.is_empty()) {
        let mut parts = pair.splitn(2, '=');
        let key = percent_decode(parts.next().unwrap_or(""));
        let value = percent_decode(parts.next().unwrap_or(""));
        map.entry(key).or_default().push(value);
    }
    map
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

async fn build_response(upstream: reqwest::Response, ctx: &Context) -> HttpResponse {
    let status = actix_web::http::StatusCode::from_u16(upstream.status().as_u16())
        .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);
    for (name, value) in upstream.headers() {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        if let Ok(v) = value.to_str() {
            builder.insert_header((name.as_str(), v));
        }
    }
    for (name, value) in ctx.response_headers() {
        builder.insert_header((name.as_str(), value.as_str()));
    }
    let body = upstream.bytes().await.unwrap_or_default();
    builder.body(body)
}

fn abort_response(ctx: &Context) -> HttpResponse {
    let abort = ctx.abort_response().cloned().unwrap_or(AbortResponse {
        status: 500,
        body: serde_json::json!({ "error": "internal error" }),
    });
    let status =
        actix_web::http::StatusCode::from_u16(abort.status).unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);
    for (name, value) in ctx.response_headers() {
        builder.insert_header((name.as_str(), value.as_str()));
    }
    builder.json(abort.body)
}
