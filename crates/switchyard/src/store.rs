//! Routing rule storage.
//!
//! Rules live in an immutable [`RuleSnapshot`] published through an
//! [`ArcSwap`]. Request handling loads the current snapshot without locking
//! and always sees a complete rule set. Administrative operations serialize
//! on a mutex, build the next snapshot from a copy and swap it in, so a hot
//! reload of a whole service is observed all at once or not at all.
//!
//! Evaluation order is priority descending. Rules with equal priority keep
//! insertion order; replacing a rule by id keeps its original position.

use crate::config::RoutingRule;
use crate::error::RouterError;
use crate::pattern::{CompiledPattern, PatternCompiler};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// A stored rule and its insertion sequence number.
#[derive(Debug, Clone)]
pub struct RuleEntry {
    pub seq: u64,
    pub rule: Arc<RoutingRule>,
}

impl RuleEntry {
    fn sort_key(&self) -> (Reverse<i64>, u64) {
        (Reverse(self.rule.priority), self.seq)
    }
}

/// Immutable view of every rule at one point in time.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    by_service: HashMap<String, Vec<RuleEntry>>,
    /// rule id -> owning service id
    index: HashMap<String, String>,
    /// All rules in evaluation order
    ordered: Vec<RuleEntry>,
    next_seq: u64,
}

impl RuleSnapshot {
    /// Rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &Arc<RoutingRule>> {
        self.ordered.iter().map(|entry| &entry.rule)
    }

    pub fn service_rules(&self, service_id: &str) -> impl Iterator<Item = &Arc<RoutingRule>> {
        self.by_service
            .get(service_id)
            .into_iter()
            .flatten()
            .map(|entry| &entry.rule)
    }

    pub fn get(&self, rule_id: &str) -> Option<&Arc<RoutingRule>> {
        let service_id = self.index.get(rule_id)?;
        self.by_service
            .get(service_id)?
            .iter()
            .find(|entry| entry.rule.id == rule_id)
            .map(|entry| &entry.rule)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    fn alloc_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Detach a rule from its bucket and the id index.
    fn take(&mut self, rule_id: &str) -> Option<RuleEntry> {
        let service_id = self.index.remove(rule_id)?;
        let bucket = self.by_service.get_mut(&service_id)?;
        let position = bucket.iter().position(|entry| entry.rule.id == rule_id)?;
        let entry = bucket.remove(position);
        if bucket.is_empty() {
            self.by_service.remove(&service_id);
        }
        Some(entry)
    }

    fn insert(&mut self, entry: RuleEntry) {
        let service_id = entry.rule.service_id.clone();
        self.index.insert(entry.rule.id.clone(), service_id.clone());
        let bucket = self.by_service.entry(service_id).or_default();
        bucket.push(entry);
        bucket.sort_by_key(RuleEntry::sort_key);
    }

    fn reorder(&mut self) {
        let mut ordered: Vec<RuleEntry> = self.by_service.values().flatten().cloned().collect();
        ordered.sort_by_key(RuleEntry::sort_key);
        self.ordered = ordered;
    }
}

/// Rule counts reported by the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStats {
    pub total_rules: usize,
    pub rules_by_service: BTreeMap<String, usize>,
    pub cached_patterns: usize,
}

/// Shared rule store with atomic snapshot updates.
#[derive(Debug, Default)]
pub struct RuleStore {
    snapshot: ArcSwap<RuleSnapshot>,
    write_lock: Mutex<()>,
    compiler: PatternCompiler,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Holding it keeps that rule set alive.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.snapshot.load_full()
    }

    pub fn compiler(&self) -> &PatternCompiler {
        &self.compiler
    }

    /// Add a rule, replacing any rule with the same id.
    ///
    /// The pattern is validated before anything changes. A replaced rule
    /// keeps its position among rules of equal priority and moves to the new
    /// service when its `service_id` changed.
    pub fn add(&self, rule: RoutingRule) -> Result<Arc<RoutingRule>, RouterError> {
        validate_pattern(&rule)?;

        let _guard = self.write_lock.lock();
        let mut next = RuleSnapshot::clone(&self.snapshot.load());

        let rule = Arc::new(rule);
        let seq = match next.take(&rule.id) {
            Some(previous) => {
                self.compiler.invalidate(&previous.rule.pattern);
                debug!(
                    "Replacing routing rule '{}' (service '{}' -> '{}')",
                    rule.id, previous.rule.service_id, rule.service_id
                );
                previous.seq
            }
            None => next.alloc_seq(),
        };

        next.insert(RuleEntry {
            seq,
            rule: Arc::clone(&rule),
        });
        next.reorder();
        self.snapshot.store(Arc::new(next));

        info!(
            "Added routing rule '{}' for service '{}' (priority {})",
            rule.id, rule.service_id, rule.priority
        );
        Ok(rule)
    }

    pub fn remove(&self, rule_id: &str) -> Result<Arc<RoutingRule>, RouterError> {
        let _guard = self.write_lock.lock();
        let mut next = RuleSnapshot::clone(&self.snapshot.load());

        let removed = next
            .take(rule_id)
            .ok_or_else(|| RouterError::RuleNotFound(rule_id.to_string()))?;
        self.compiler.invalidate(&removed.rule.pattern);
        next.reorder();
        self.snapshot.store(Arc::new(next));

        info!("Removed routing rule '{}'", rule_id);
        Ok(removed.rule)
    }

    pub fn get(&self, rule_id: &str) -> Option<Arc<RoutingRule>> {
        self.snapshot.load().get(rule_id).cloned()
    }

    /// Enable or disable a rule in place.
    pub fn toggle(&self, rule_id: &str, enabled: bool) -> Result<Arc<RoutingRule>, RouterError> {
        let _guard = self.write_lock.lock();
        let mut next = RuleSnapshot::clone(&self.snapshot.load());

        let entry = next
            .take(rule_id)
            .ok_or_else(|| RouterError::RuleNotFound(rule_id.to_string()))?;
        let mut rule = RoutingRule::clone(&entry.rule);
        rule.metadata.enabled = enabled;
        let rule = Arc::new(rule);

        next.insert(RuleEntry {
            seq: entry.seq,
            rule: Arc::clone(&rule),
        });
        next.reorder();
        self.snapshot.store(Arc::new(next));

        info!(
            "Routing rule '{}' {}",
            rule_id,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(rule)
    }

    /// Every rule in evaluation order.
    pub fn list_all(&self) -> Vec<Arc<RoutingRule>> {
        self.snapshot.load().rules().cloned().collect()
    }

    /// Rules of one service in evaluation order.
    pub fn list_for_service(&self, service_id: &str) -> Vec<Arc<RoutingRule>> {
        self.snapshot.load().service_rules(service_id).cloned().collect()
    }

    /// Replace every rule of a service in one step.
    ///
    /// The whole batch is validated first: patterns must compile, ids must be
    /// unique within the batch and every rule must belong to `service_id`.
    /// Any failure leaves the store untouched. A batch rule whose id is held
    /// by another service moves here.
    pub fn hot_reload(&self, service_id: &str, rules: Vec<RoutingRule>) -> Result<(), RouterError> {
        let mut seen = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if rule.service_id != service_id {
                return Err(RouterError::ServiceMismatch {
                    rule_id: rule.id.clone(),
                    expected: service_id.to_string(),
                    actual: rule.service_id.clone(),
                });
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(RouterError::DuplicateRule(rule.id.clone()));
            }
            validate_pattern(rule)?;
        }

        let _guard = self.write_lock.lock();
        let mut next = RuleSnapshot::clone(&self.snapshot.load());

        let mut stale_patterns: Vec<String> = Vec::new();
        let previous_ids: Vec<String> = next
            .service_rules(service_id)
            .map(|rule| rule.id.clone())
            .collect();
        for rule_id in previous_ids {
            if let Some(entry) = next.take(&rule_id) {
                stale_patterns.push(entry.rule.pattern.clone());
            }
        }

        let count = rules.len();
        for rule in rules {
            if let Some(moved) = next.take(&rule.id) {
                debug!(
                    "Rule '{}' moves from service '{}' to '{}'",
                    rule.id, moved.rule.service_id, service_id
                );
                stale_patterns.push(moved.rule.pattern.clone());
            }
            let seq = next.alloc_seq();
            next.insert(RuleEntry {
                seq,
                rule: Arc::new(rule),
            });
        }
        next.reorder();
        self.snapshot.store(Arc::new(next));

        for pattern in &stale_patterns {
            self.compiler.invalidate(pattern);
        }

        info!(
            "Hot reloaded {} routing rules for service '{}'",
            count, service_id
        );
        Ok(())
    }

    pub fn stats(&self) -> RouterStats {
        let snapshot = self.snapshot.load();
        RouterStats {
            total_rules: snapshot.len(),
            rules_by_service: snapshot
                .by_service
                .iter()
                .map(|(service_id, rules)| (service_id.clone(), rules.len()))
                .collect(),
            cached_patterns: self.compiler.cached_count(),
        }
    }
}

fn validate_pattern(rule: &RoutingRule) -> Result<(), RouterError> {
    CompiledPattern::compile(&rule.pattern)
        .map(|_| ())
        .map_err(|e| RouterError::invalid_pattern(&rule.id, &rule.pattern, e))
}
