//! End-to-end routing tests driven by YAML config files.

use proptest::prelude::*;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use switchyard::config::Config;
use switchyard::pattern::CompiledPattern;
use switchyard::{InboundRequest, Router, RouterError, RoutingRule, RuleStore};
use tempfile::NamedTempFile;

const GATEWAY: &str = r#"
logging:
  level: warn
services:
  - id: ecommerce
    upstream: ["http://orders:8080"]
    versioning:
      enabled: true
      strategy: header
    versions:
      - version: v1
        endpoints: ["http://orders-v1:8080"]
        isDefault: true
      - version: v2
        endpoints: ["http://orders-v2:8080"]
      - version: v3
        endpoints: ["http://orders-v3:8080"]
        isActive: false
  - id: users
    upstream: ["http://users:8080"]
    pathRewriteRules:
      - pattern: ^/API/V1
        flags: i
        replacement: /internal
  - id: catalog
    upstream: ["http://catalog:8080"]
    versioning:
      enabled: true
      strategy: path
    versions:
      - version: v1
        endpoints: ["http://catalog-v1:8080"]
      - version: v2
        endpoints: ["http://catalog-v2:8080"]
rules:
  - id: orders
    pattern: /api/v1/orders/*
    methods: [GET, POST]
    serviceId: ecommerce
    priority: 100
  - id: vip-orders
    pattern: /api/v1/orders/*
    methods: [GET]
    serviceId: ecommerce
    priority: 150
    conditions:
      - type: user
        field: tier
        operator: equals
        value: vip
      - type: body
        field: order.total
        operator: exists
    transformations:
      - type: path
        action: replace
        field: /orders
        value: /vip-orders
  - id: profile
    pattern: /api/v1/users/:userId/profile
    serviceId: users
    priority: 200
    transformations:
      - type: path
        action: rewrite
        pattern: /profile$
        replacement: /profile-v2
  - id: catalog
    pattern: /api/*/products/:sku
    serviceId: catalog
  - id: maintenance
    pattern: /api/*
    serviceId: ecommerce
    priority: 1000
    metadata:
      enabled: false
      description: maintenance window
"#;

fn load(yaml: &str) -> Router {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    let config = Config::from_file(file.path()).unwrap();
    Router::from_config(config).unwrap()
}

#[test]
fn orders_route_to_default_version() {
    let router = load(GATEWAY);

    let route = router
        .resolve_route(&InboundRequest::new("GET", "/api/v1/orders/123"))
        .unwrap();

    assert_eq!(route.rule.id, "orders");
    assert_eq!(route.service.id, "ecommerce");
    assert!(route.path_params.is_empty());
    assert_eq!(route.transformed_path, "/api/v1/orders/123");
    assert!(route.service.metadata.used_default);
    assert_eq!(route.service.upstream, vec!["http://orders-v1:8080"]);
}

#[test]
fn explicit_version_header() {
    let router = load(GATEWAY);

    let v2 = InboundRequest::new("POST", "/api/v1/orders").with_header("X-Api-Version", "v2");
    let route = router.resolve_route(&v2).unwrap();
    assert_eq!(route.service.metadata.resolved_version.as_deref(), Some("v2"));
    assert!(!route.service.metadata.used_default);

    // Inactive versions fall back to the default
    let v3 = InboundRequest::new("GET", "/api/v1/orders/1").with_header("x-api-version", "v3");
    let route = router.resolve_route(&v3).unwrap();
    assert_eq!(route.service.metadata.resolved_version.as_deref(), Some("v1"));
}

#[test]
fn conditions_select_higher_priority_rule() {
    let router = load(GATEWAY);

    let vip = InboundRequest::new("GET", "/api/v1/orders/9")
        .with_user(json!({"tier": "vip"}))
        .with_body(json!({"order": {"total": 12.5}}));
    let route = router.resolve_route(&vip).unwrap();
    assert_eq!(route.rule.id, "vip-orders");
    assert_eq!(route.transformed_path, "/api/v1/vip-orders/9");

    // Missing body field: falls back to the plain rule
    let no_body = InboundRequest::new("GET", "/api/v1/orders/9").with_user(json!({"tier": "vip"}));
    assert_eq!(router.resolve_route(&no_body).unwrap().rule.id, "orders");

    // vip rule is GET only
    let post = InboundRequest::new("POST", "/api/v1/orders/9")
        .with_user(json!({"tier": "vip"}))
        .with_body(json!({"order": {"total": 1}}));
    assert_eq!(router.resolve_route(&post).unwrap().rule.id, "orders");
}

#[test]
fn profile_rewrite_then_service_rewrite() {
    let router = load(GATEWAY);

    let route = router
        .resolve_route(&InboundRequest::new("GET", "/api/v1/users/77/profile"))
        .unwrap();

    assert_eq!(route.path_params.get("userId").map(String::as_str), Some("77"));
    assert_eq!(route.transformed_path, "/internal/users/77/profile-v2");
}

#[test]
fn path_version_strategy() {
    let router = load(GATEWAY);

    let route = router
        .resolve_route(&InboundRequest::new("GET", "/api/v2/products/sku%2042"))
        .unwrap();

    assert_eq!(route.rule.id, "catalog");
    assert_eq!(route.path_params.get("sku").map(String::as_str), Some("sku 42"));
    assert_eq!(route.service.version.as_deref(), Some("v2"));
    assert_eq!(route.service.upstream, vec!["http://catalog-v2:8080"]);

    // No default version registered: the base config is used
    let route = router
        .resolve_route(&InboundRequest::new("GET", "/api/v9/products/1"))
        .unwrap();
    assert!(route.service.version.is_none());
    assert_eq!(route.service.upstream, vec!["http://catalog:8080"]);
}

#[test]
fn disabled_rule_never_matches_until_enabled() {
    let router = load(GATEWAY);
    let request = InboundRequest::new("GET", "/api/v1/orders/1");

    assert_ne!(router.resolve_route(&request).unwrap().rule.id, "maintenance");

    router.toggle_routing_rule("maintenance", true).unwrap();
    assert_eq!(router.resolve_route(&request).unwrap().rule.id, "maintenance");
}

#[test]
fn unmatched_request_is_none() {
    let router = load(GATEWAY);
    assert!(router
        .resolve_route(&InboundRequest::new("GET", "/health"))
        .is_none());

    let trace = router.explain_route(&InboundRequest::new("GET", "/health"));
    assert!(trace.route.is_none());
    assert_eq!(trace.evaluated.len(), router.get_all_routing_rules().len());
}

#[test]
fn hot_reload_is_atomic_for_readers() {
    let router = Arc::new(load(GATEWAY));
    let request = InboundRequest::new("GET", "/api/v1/orders/1");

    let reloads = {
        let router = Arc::clone(&router);
        std::thread::spawn(move || {
            for round in 0..100 {
                let priority = if round % 2 == 0 { 500 } else { 50 };
                let rules = vec![
                    RoutingRule::new("orders", "/api/v1/orders/*", "ecommerce").with_priority(100),
                    RoutingRule::new("vip-orders", "/api/v1/orders/*", "ecommerce")
                        .with_priority(priority)
                        .with_methods(&["DELETE"]),
                    RoutingRule::new("maintenance", "/api/*", "ecommerce")
                        .with_priority(1000)
                        .disabled(),
                ];
                router.update_service_routing_rules("ecommerce", rules).unwrap();
            }
        })
    };

    for _ in 0..500 {
        let route = router.resolve_route(&request).unwrap();
        assert_eq!(route.service.id, "ecommerce");
    }
    reloads.join().unwrap();

    assert_eq!(router.get_service_routing_rules("ecommerce").len(), 3);
}

#[test]
fn invalid_batch_leaves_rules_untouched() {
    let router = load(GATEWAY);
    let before = router.get_service_routing_rules("ecommerce");

    let err = router
        .update_service_routing_rules(
            "ecommerce",
            vec![
                RoutingRule::new("ok", "/ok", "ecommerce"),
                RoutingRule::new("broken", "/a/:x/b/:x", "ecommerce"),
            ],
        )
        .unwrap_err();

    assert!(matches!(err, RouterError::InvalidPattern { ref rule_id, .. } if rule_id == "broken"));
    let after = router.get_service_routing_rules("ecommerce");
    assert_eq!(before.len(), after.len());
    assert!(router.get_routing_rule("ok").is_none());
}

#[test]
fn form_encoded_query_and_numbered_groups() {
    let router = load(
        r#"
services:
  - id: search
    upstream: ["http://search:8080"]
rules:
  - id: search
    pattern: /api/:version/search
    serviceId: search
    conditions:
      - type: query
        field: q
        operator: equals
        value: learn rust
    transformations:
      - type: path
        action: rewrite
        pattern: ^/api/(v\d+)/search
        replacement: /$1_search
"#,
    );

    let route = router
        .resolve_route(&InboundRequest::new("GET", "/api/v2/search?q=learn+rust"))
        .unwrap();
    assert_eq!(route.transformed_path, "/v2_search");

    assert!(router
        .resolve_route(&InboundRequest::new("GET", "/api/v2/search?q=learn"))
        .is_none());
}

#[test]
fn config_errors_carry_context() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"rules:\n  - {id: r, pattern: '', serviceId: s}\n")
        .unwrap();

    let err = Config::from_file(file.path()).unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("Invalid config file"));
    assert!(chain.contains("Invalid pattern '' in rule 'r'"));
}

#[test]
fn read_file_defers_validation() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"rules:\n  - {id: r, pattern: /a, serviceId: s}\n  - {id: r, pattern: /b, serviceId: s}\n")
        .unwrap();

    let config = Config::read_file(file.path()).unwrap();
    assert_eq!(config.rules.len(), 2);
    assert!(config.validate().is_err());

    let err = Config::from_file(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("Duplicate routing rule id 'r'"));
}

proptest! {
    #[test]
    fn param_segments_round_trip(id in "[A-Za-z0-9_.~-]{1,24}", item in "[a-z0-9]{1,8}") {
        let pattern = CompiledPattern::compile("/users/:id/items/:item").unwrap();
        let params = pattern.matches(&format!("/users/{id}/items/{item}")).unwrap();
        prop_assert_eq!(params.get("id"), Some(&id));
        prop_assert_eq!(params.get("item"), Some(&item));
    }

    #[test]
    fn rules_are_listed_by_priority_then_insertion(priorities in prop::collection::vec(-5i64..5, 1..20)) {
        let store = RuleStore::new();
        for (i, priority) in priorities.iter().enumerate() {
            store
                .add(RoutingRule::new(format!("r{i}"), "/x", "svc").with_priority(*priority))
                .unwrap();
        }

        let listed = store.list_all();
        for pair in listed.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.priority >= b.priority);
            if a.priority == b.priority {
                let index = |id: &str| id[1..].parse::<usize>().unwrap();
                prop_assert!(index(&a.id) < index(&b.id));
            }
        }
    }
}
