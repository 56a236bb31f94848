//! Switchyard: rule-based request routing for API gateways.
//!
//! A [`Router`] matches an inbound request against prioritized
//! [`RoutingRule`]s (path pattern, methods, conditions), resolves the target
//! service and its API version through a [`ServiceRegistry`], and produces
//! the rewritten upstream path.
//!
//! ```
//! use std::sync::Arc;
//! use switchyard::{
//!     InMemoryServiceRegistry, InboundRequest, RoutingRule, Router, RuleStore, ServiceConfig,
//! };
//!
//! let registry = InMemoryServiceRegistry::new();
//! registry.register_service(ServiceConfig::new("users", &["http://users:8080"]));
//!
//! let router = Router::new(Arc::new(RuleStore::new()), Arc::new(registry));
//! router
//!     .add_routing_rule(RoutingRule::new("user", "/api/v1/users/:id", "users"))
//!     .unwrap();
//!
//! let route = router
//!     .resolve_route(&InboundRequest::new("GET", "/api/v1/users/42"))
//!     .unwrap();
//! assert_eq!(route.path_params["id"], "42");
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod pattern;
pub mod predicate;
pub mod registry;
pub mod request;
pub mod router;
pub mod store;
pub mod transform;
pub mod version;

pub use config::{
    Config, PathRewriteRule, RequestTransformation, RoutingCondition, RoutingRule, ServiceConfig,
    VersionConfig,
};
pub use error::RouterError;
pub use pattern::{CompiledPattern, PathParams, PatternCompiler};
pub use registry::{InMemoryServiceRegistry, ServiceRegistry};
pub use request::{HttpRequestView, InboundRequest, RequestView};
pub use router::{RouteMatch, RouteTrace, Router};
pub use store::{RouterStats, RuleStore};
