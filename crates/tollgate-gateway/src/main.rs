//! tollgate gateway server entry point.
//!
//! Loads and validates the gateway config, builds a `Router` from it, and
//! wires it into an `actix-web` server behind a logging/compression/security
//! middleware stack, plus graceful shutdown on Ctrl-C.

mod error;
mod forwarder;
mod logging;
mod security;
mod upstream;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use error::GatewayError;
use forwarder::Forwarder;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::signal;
use tollgate_core::config::load_gateway_config;
use tollgate_core::{route, ConfigValidator, Router};
use upstream::UpstreamRegistry;

const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_PORT: u16 = 8080;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    logging::configure_logger();

    let config = load_gateway_config(None).expect("failed to load gateway config");
    info!("Starting tollgate gateway v{}", config.version);

    let validation = ConfigValidator::validate_comprehensive(&config);
    if !validation.is_valid() {
        error!("Configuration validation failed:");
        for e in &validation.errors {
            error!("  - {e}");
        }
        std::process::exit(1);
    }
    info!(
        "Configuration validated successfully with {} warnings, {} recommendations",
        validation.warnings.len(),
        validation.recommendations.len()
    );
    for w in &validation.warnings {
        warn!("  - {w}");
    }

    let routes = config
        .routes
        .iter()
        .map(|rc| route::build(rc, config.defaults.rate_limit.as_ref()).expect("route failed to build after passing validation"))
        .collect();
    let router = Arc::new(Router::new(routes));

    let breaker = config.defaults.circuit_breaker.as_ref().map(|cb| {
        Arc::new(
            tollgate_core::breaker::build(cb).expect("circuit breaker failed to build after passing validation"),
        )
    });

    let upstreams = Arc::new(UpstreamRegistry::from_routes(&config.routes));

    let timeout_seconds = std::env::var("TOLLGATE_UPSTREAM_TIMEOUT_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECONDS);

    let forwarder = Forwarder::new(router, breaker, upstreams, timeout_seconds);

    let host = std::env::var("TOLLGATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("TOLLGATE_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    info!("Starting server on {host}:{port}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(forwarder.clone()))
            .wrap(actix_web::middleware::Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
            ))
            .wrap(actix_web::middleware::Compress::default())
            .wrap(security::global_security_headers())
            .default_service(web::route().to(dispatch))
    })
    .bind((host.as_str(), port))?
    .run();

    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("Server stopped gracefully"),
                Err(e) => error!("Server error: {e}"),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server...");
        }
    }

    Ok(())
}

async fn dispatch(req: HttpRequest, body: web::Bytes, forwarder: web::Data<Forwarder>) -> Result<HttpResponse, GatewayError> {
    forwarder.handle(req, body).await
}
