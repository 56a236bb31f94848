use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use switchyard::config::{ConditionOperator, RequestTransformation, RoutingCondition};
use switchyard::pattern::CompiledPattern;
use switchyard::{
    InMemoryServiceRegistry, InboundRequest, Router, RoutingRule, RuleStore, ServiceConfig,
};

fn build_router(rule_count: usize, parameterized: bool) -> Router {
    let registry = InMemoryServiceRegistry::new();
    registry.register_service(ServiceConfig::new("svc", &["http://svc:8080"]));

    let store = RuleStore::new();
    for i in 0..rule_count {
        let pattern = if parameterized {
            format!("/api/v1/endpoint{i}/:id/items/:item")
        } else {
            format!("/api/v1/endpoint{i}/*")
        };
        // Earlier rules get higher priority so evaluation order is predictable
        let rule = RoutingRule::new(format!("rule-{i}"), pattern, "svc")
            .with_priority((rule_count - i) as i64)
            .with_methods(&["GET", "POST"]);
        store.add(rule).unwrap();
    }

    Router::new(Arc::new(store), Arc::new(registry))
}

fn request_for(index: usize, parameterized: bool) -> InboundRequest {
    if parameterized {
        InboundRequest::new("GET", &format!("/api/v1/endpoint{index}/42/items/7"))
    } else {
        InboundRequest::new("GET", &format!("/api/v1/endpoint{index}/orders"))
    }
}

fn bench_route_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_resolution");

    for rule_count in [10, 50, 100, 500].iter() {
        for parameterized in [false, true] {
            let router = build_router(*rule_count, parameterized);
            let kind = if parameterized { "param" } else { "prefix" };

            // Warm the pattern cache
            router.resolve_route(&request_for(rule_count - 1, parameterized));

            group.throughput(Throughput::Elements(1));

            let first = request_for(0, parameterized);
            group.bench_with_input(
                BenchmarkId::new(format!("{kind}_first"), rule_count),
                rule_count,
                |b, _| b.iter(|| router.resolve_route(black_box(&first))),
            );

            let last = request_for(rule_count - 1, parameterized);
            group.bench_with_input(
                BenchmarkId::new(format!("{kind}_last"), rule_count),
                rule_count,
                |b, _| b.iter(|| router.resolve_route(black_box(&last))),
            );

            let none = InboundRequest::new("GET", "/not/found");
            group.bench_with_input(
                BenchmarkId::new(format!("{kind}_none"), rule_count),
                rule_count,
                |b, _| b.iter(|| router.resolve_route(black_box(&none))),
            );
        }
    }

    group.finish();
}

fn bench_conditions_and_transforms(c: &mut Criterion) {
    let registry = InMemoryServiceRegistry::new();
    registry.register_service(ServiceConfig::new("users", &["http://users:8080"]));
    let router = Router::new(Arc::new(RuleStore::new()), Arc::new(registry));
    router
        .add_routing_rule(
            RoutingRule::new("profile", "/api/v1/users/:userId/profile", "users")
                .with_condition(RoutingCondition::header(
                    "x-client",
                    ConditionOperator::Regex,
                    "^mobile-",
                ))
                .with_transformation(RequestTransformation::rewrite("/profile$", "/profile-v2")),
        )
        .unwrap();

    let request =
        InboundRequest::new("GET", "/api/v1/users/77/profile").with_header("x-client", "mobile-ios");

    c.bench_function("resolve_with_condition_and_rewrite", |b| {
        b.iter(|| router.resolve_route(black_box(&request)))
    });
}

fn bench_pattern_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_compile");

    for pattern in [
        "/health",
        "/api/v1/orders/*",
        "/api/v1/users/:userId/orders/:orderId/*",
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(pattern), pattern, |b, p| {
            b.iter(|| CompiledPattern::compile(black_box(p)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_route_resolution,
    bench_conditions_and_transforms,
    bench_pattern_compile
);
criterion_main!(benches);
