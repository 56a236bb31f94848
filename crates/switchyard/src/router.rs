//! Request routing.
//!
//! [`Router::resolve_route`] walks the current rule snapshot in evaluation
//! order (priority descending, insertion order on ties) and returns the first
//! rule that survives every check:
//!
//! 1. rule enabled
//! 2. method allowed
//! 3. path matches the compiled pattern (parameters extracted)
//! 4. all conditions hold
//! 5. service known to the registry
//!
//! The matched service is then version-resolved and the path goes through
//! the rule's transformations and the service's rewrite rules.
//!
//! Matching is a linear scan with no I/O and never fails; a miss is `None`.

use crate::config::{Config, RoutingRule, ServiceConfig};
use crate::error::RouterError;
use crate::pattern::PathParams;
use crate::predicate::ConditionEvaluator;
use crate::registry::{InMemoryServiceRegistry, ServiceRegistry};
use crate::request::RequestView;
use crate::store::{RouterStats, RuleStore};
use crate::transform::TransformationPipeline;
use crate::version::VersionResolver;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of routing one request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMatch {
    /// Service config after version resolution
    pub service: Arc<ServiceConfig>,
    pub rule: Arc<RoutingRule>,
    pub path_params: PathParams,
    pub transformed_path: String,
}

/// Why a rule did not produce a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    MethodMismatch,
    PathMismatch,
    /// Index of the first condition that did not hold
    ConditionFailed { index: usize },
    ServiceNotFound,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "disabled"),
            SkipReason::MethodMismatch => write!(f, "method not allowed"),
            SkipReason::PathMismatch => write!(f, "path does not match"),
            SkipReason::ConditionFailed { index } => write!(f, "condition {} failed", index),
            SkipReason::ServiceNotFound => write!(f, "service not found"),
        }
    }
}

/// One rule as seen by [`Router::explain_route`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluation {
    pub rule_id: String,
    pub service_id: String,
    pub priority: i64,
    /// `None` for the rule that matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

/// Step-by-step record of routing one request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTrace {
    pub method: String,
    pub path: String,
    /// Rules in evaluation order, up to and including the match
    pub evaluated: Vec<RuleEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteMatch>,
}

/// Rule-based request router.
pub struct Router {
    store: Arc<RuleStore>,
    registry: Arc<dyn ServiceRegistry>,
    conditions: ConditionEvaluator,
    versions: VersionResolver,
    pipeline: TransformationPipeline,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn new(store: Arc<RuleStore>, registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            store,
            registry,
            conditions: ConditionEvaluator::new(),
            versions: VersionResolver::new(),
            pipeline: TransformationPipeline::new(),
        }
    }

    /// Build an in-memory registry and a rule store from a loaded config.
    pub fn from_config(config: Config) -> Result<Self, RouterError> {
        let registry = InMemoryServiceRegistry::from_definitions(config.services);
        let store = RuleStore::new();
        for rule in config.rules {
            store.add(rule)?;
        }
        Ok(Self::new(Arc::new(store), Arc::new(registry)))
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<dyn ServiceRegistry> {
        &self.registry
    }

    /// Find the route for a request.
    pub fn resolve_route<R: RequestView + ?Sized>(&self, request: &R) -> Option<RouteMatch> {
        let snapshot = self.store.snapshot();
        for rule in snapshot.rules() {
            match self.evaluate_rule(request, rule) {
                Ok(route) => {
                    debug!(
                        "Request {} {} matched rule '{}' -> '{}'",
                        request.method(),
                        request.path(),
                        rule.id,
                        route.transformed_path
                    );
                    return Some(route);
                }
                Err(reason) => debug!("Rule '{}' skipped: {}", rule.id, reason),
            }
        }

        debug!(
            "No routing rule matched {} {}",
            request.method(),
            request.path()
        );
        None
    }

    /// Route a request and record the outcome of every rule considered.
    pub fn explain_route<R: RequestView + ?Sized>(&self, request: &R) -> RouteTrace {
        let snapshot = self.store.snapshot();
        let mut trace = RouteTrace {
            method: request.method().to_string(),
            path: request.path().to_string(),
            evaluated: Vec::new(),
            route: None,
        };

        for rule in snapshot.rules() {
            let outcome = self.evaluate_rule(request, rule);
            trace.evaluated.push(RuleEvaluation {
                rule_id: rule.id.clone(),
                service_id: rule.service_id.clone(),
                priority: rule.priority,
                skipped: outcome.as_ref().err().copied(),
            });
            if let Ok(route) = outcome {
                trace.route = Some(route);
                break;
            }
        }

        trace
    }

    fn evaluate_rule<R: RequestView + ?Sized>(
        &self,
        request: &R,
        rule: &Arc<RoutingRule>,
    ) -> Result<RouteMatch, SkipReason> {
        if !rule.is_enabled() {
            return Err(SkipReason::Disabled);
        }
        if !rule.allows_method(request.method()) {
            return Err(SkipReason::MethodMismatch);
        }

        let pattern = match self.store.compiler().compile(&rule.pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(
                    "Rule '{}' has an uncompilable pattern '{}': {}",
                    rule.id, rule.pattern, e
                );
                return Err(SkipReason::PathMismatch);
            }
        };
        let path_params = pattern
            .matches(request.path())
            .ok_or(SkipReason::PathMismatch)?;

        if let Some(index) = self.conditions.first_failing(request, &rule.conditions) {
            return Err(SkipReason::ConditionFailed { index });
        }

        let Some(service) = self.registry.get_service(&rule.service_id) else {
            warn!(
                "Rule '{}' matched but service '{}' is not registered",
                rule.id, rule.service_id
            );
            return Err(SkipReason::ServiceNotFound);
        };
        let service = self.versions.resolve(request, &service, self.registry.as_ref());

        let path = self
            .pipeline
            .apply(request.path(), &rule.transformations, &path_params);
        let transformed_path = self
            .pipeline
            .apply_path_rewrites(&path, &service.path_rewrite_rules);

        Ok(RouteMatch {
            service,
            rule: Arc::clone(rule),
            path_params,
            transformed_path,
        })
    }

    // ===== Administrative API =====

    pub fn add_routing_rule(&self, rule: RoutingRule) -> Result<Arc<RoutingRule>, RouterError> {
        self.store.add(rule)
    }

    pub fn remove_routing_rule(&self, rule_id: &str) -> Result<Arc<RoutingRule>, RouterError> {
        self.store.remove(rule_id)
    }

    pub fn get_routing_rule(&self, rule_id: &str) -> Option<Arc<RoutingRule>> {
        self.store.get(rule_id)
    }

    pub fn toggle_routing_rule(
        &self,
        rule_id: &str,
        enabled: bool,
    ) -> Result<Arc<RoutingRule>, RouterError> {
        self.store.toggle(rule_id, enabled)
    }

    pub fn get_all_routing_rules(&self) -> Vec<Arc<RoutingRule>> {
        self.store.list_all()
    }

    pub fn get_service_routing_rules(&self, service_id: &str) -> Vec<Arc<RoutingRule>> {
        self.store.list_for_service(service_id)
    }

    /// Atomically replace every rule of one service.
    pub fn update_service_routing_rules(
        &self,
        service_id: &str,
        rules: Vec<RoutingRule>,
    ) -> Result<(), RouterError> {
        self.store.hot_reload(service_id, rules)
    }

    /// Drop every compiled pattern and cached regex.
    pub fn clear_pattern_cache(&self) {
        self.store.compiler().clear();
        self.conditions.clear_cache();
        self.pipeline.clear_cache();
        debug!("Cleared routing pattern caches");
    }

    pub fn get_stats(&self) -> RouterStats {
        self.store.stats()
    }
}
