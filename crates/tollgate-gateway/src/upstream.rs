//! Maps a route's `service_id` to the upstream base URL the forwarder calls.
//!
//! The core crate keeps `RouteConfig` transport-agnostic (service identity
//! only, no host/port); this registry recovers the concrete address by
//! reading it back out of each route's free-form `metadata` field instead.

use std::collections::HashMap;
use tollgate_core::RouteConfig;

pub struct UpstreamRegistry {
    by_service: HashMap<String, String>,
}

impl UpstreamRegistry {
    pub fn from_routes(routes: &[RouteConfig]) -> Self {
        let mut by_service = HashMap::new();
        for route in routes {
            if let Some(url) = route.metadata.get("upstream_url").and_then(|v| v.as_str()) {
                by_service.insert(route.service_id.clone(), url.trim_end_matches('/').to_string());
            }
        }
        UpstreamRegistry { by_service }
    }

    pub fn resolve(&self, service_id: &str) -> Option<&str> {
        self.by_service.get(service_id).map(|s| s.as_str())
    }
}
