//! End-to-end tests driving `Router`/`Route` through the public API only,
//! without reaching into private fields.

use std::collections::HashMap;
use tollgate_core::{route, Context, Router};

fn route_config(id: &str, path: &str, path_type: &str, priority: i32) -> tollgate_core::RouteConfig {
    tollgate_core::RouteConfig {
        id: id.to_string(),
        name: id.to_string(),
        service_id: format!("{id}-service"),
        path: path.to_string(),
        path_type: Some(path_type.to_string()),
        methods: vec!["GET".to_string()],
        priority,
        enabled: true,
        assertion_group: None,
        filter_configs: vec![],
        cors_config: None,
        limiter_config: None,
        auth_config: None,
        security_config: None,
        metadata: serde_json::Value::Null,
    }
}

fn ctx(path: &str) -> Context {
    Context::new("GET", path, HashMap::new(), HashMap::new(), HashMap::new(), None, Vec::new())
}

#[test]
fn more_specific_route_wins_when_priorities_overlap() {
    let users = route::build(&route_config("users", "/api/users/:id", "param", 5), None).unwrap();
    let catch_all = route::build(&route_config("catch-all", "/api", "prefix", 50), None).unwrap();
    let router = Router::new(vec![catch_all, users]);

    let mut c = ctx("/api/users/42");
    assert_eq!(router.dispatch(&mut c), tollgate_core::Outcome::Admitted);
    assert_eq!(c.attribute("route_id").unwrap(), "users");
    assert_eq!(c.attribute("path_params").unwrap().get("id").unwrap(), "42");
}

#[test]
fn unmatched_request_gets_a_404_with_security_headers_absent() {
    let catch_all = route::build(&route_config("catch-all", "/api", "prefix", 1), None).unwrap();
    let router = Router::new(vec![catch_all]);

    let mut c = ctx("/totally/unrelated");
    assert_eq!(router.dispatch(&mut c), tollgate_core::Outcome::NotFound);
    assert_eq!(c.abort_response().unwrap().status, 404);
    // No route matched, so the route's own handler chain (and its
    // security-header stamping) never ran.
    assert!(c.response_headers().is_empty());
}

#[test]
fn matched_route_stamps_default_security_headers() {
    let catch_all = route::build(&route_config("catch-all", "/api", "prefix", 1), None).unwrap();
    let router = Router::new(vec![catch_all]);

    let mut c = ctx("/api/anything");
    assert_eq!(router.dispatch(&mut c), tollgate_core::Outcome::Admitted);
    assert!(c
        .response_headers()
        .iter()
        .any(|(k, v)| k == "X-Content-Type-Options" && v == "nosniff"));
}

#[test]
fn disabled_route_is_invisible_to_dispatch() {
    let mut config = route_config("users", "/api/users", "prefix", 1);
    config.enabled = false;
    let route = route::build(&config, None).unwrap();
    let router = Router::new(vec![route]);

    let mut c = ctx("/api/users");
    assert_eq!(router.dispatch(&mut c), tollgate_core::Outcome::NotFound);
}
