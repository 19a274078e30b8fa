//! Process-wide hardening headers.
//!
//! The core crate's `SecurityHeadersHandler` stamps the same headers but
//! only on responses that make it through a matched route's chain; this
//! `DefaultHeaders` wrap catches everything else too, including the plain
//! 404 the router emits when no route matches at all.

use actix_web::middleware::DefaultHeaders;

pub fn global_security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Strict-Transport-Security", "max-age=31536000; includeSubDomains"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
        .add(("Content-Security-Policy", "default-src 'self'"))
        .add(("Permissions-Policy", "geolocation=(), microphone=(), camera=()"))
}
