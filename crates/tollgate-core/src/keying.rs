//! Per-request key derivation shared by [`crate::limiter`] and
//! [`crate::breaker`] — both select a bucket/circuit by the same small set
//! of strategies.

use crate::context::Context;

/// Derives the bucketing key for a given `strategy` name.
///
/// - `ip`: effective client IP (same resolution rule as the `ip` assertion).
/// - `service`: the `service_id` Context attribute, defaulting to
///   `"default"` when unset.
/// - `api`: the request path.
/// - anything else: treated as a literal Context attribute name to read,
///   falling back to `"default"` when absent — lets `keyStrategy` name a
///   custom attribute (e.g. `"user_id"`) without a code change.
pub fn derive_key(strategy: &str, ctx: &Context) -> String {
    match strategy {
        "ip" => ctx.client_ip(),
        "service" => ctx
            .attribute("service_id")
            .and_then(|v| v.as_str())
            .unwrap_or("default")
            .to_string(),
        "api" => ctx.path.clone(),
        other => ctx
            .attribute(other)
            .and_then(|v| v.as_str())
            .unwrap_or("default")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ctx() -> Context {
        Context::new(
            "GET",
            "/api/users",
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            Some("203.0.113.1:80".to_string()),
            Vec::new(),
        )
    }

    #[test]
    fn service_key_falls_back_to_default() {
        assert_eq!(derive_key("service", &ctx()), "default");
    }

    #[test]
    fn api_key_uses_path() {
        assert_eq!(derive_key("api", &ctx()), "/api/users");
    }

    #[test]
    fn ip_key_uses_client_ip() {
        assert_eq!(derive_key("ip", &ctx()), "203.0.113.1");
    }

    #[test]
    fn custom_strategy_reads_named_attribute() {
        let mut c = ctx();
        c.set_attribute("user_id", "u-42");
        assert_eq!(derive_key("user_id", &c), "u-42");
    }
}
