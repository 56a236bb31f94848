//! Condition evaluation.

use super::value::{extract, FieldValue};
use crate::config::{ConditionOperator, ConditionSource, RoutingCondition};
use crate::request::RequestView;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Evaluates rule conditions against a request.
///
/// `contains` needs a string field; a number or boolean literal is matched
/// by its text form.
///
/// `regex` conditions are compiled on first use and cached by pattern; an
/// invalid pattern is cached as a failure so it is only reported once.
#[derive(Debug, Default)]
pub struct ConditionEvaluator {
    regex_cache: RwLock<HashMap<String, Option<Arc<Regex>>>>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when every condition holds. An empty list is vacuously true.
    pub fn evaluate<R: RequestView + ?Sized>(
        &self,
        request: &R,
        conditions: &[RoutingCondition],
    ) -> bool {
        self.first_failing(request, conditions).is_none()
    }

    /// Index of the first condition that does not hold.
    pub fn first_failing<R: RequestView + ?Sized>(
        &self,
        request: &R,
        conditions: &[RoutingCondition],
    ) -> Option<usize> {
        conditions
            .iter()
            .position(|condition| !self.evaluate_condition(request, condition))
    }

    pub fn evaluate_condition<R: RequestView + ?Sized>(
        &self,
        request: &R,
        condition: &RoutingCondition,
    ) -> bool {
        if condition.source == ConditionSource::FeatureFlag {
            trace!(
                "Feature flag '{}' has no flag service; condition is false",
                condition.field
            );
            return false;
        }

        let actual = extract(request, condition.source, &condition.field);
        match condition.operator {
            ConditionOperator::Exists => actual.exists(),
            ConditionOperator::Equals => actual.equals(&condition.value),
            ConditionOperator::Contains => {
                let FieldValue::String(haystack) = actual else {
                    return false;
                };
                match &condition.value {
                    Value::String(needle) => haystack.contains(needle.as_str()),
                    Value::Number(n) => haystack.contains(&n.to_string()),
                    Value::Bool(b) => haystack.contains(&b.to_string()),
                    _ => false,
                }
            }
            ConditionOperator::Regex => {
                let (Some(text), Value::String(pattern)) = (actual.as_str(), &condition.value)
                else {
                    return false;
                };
                self.regex(pattern)
                    .map(|regex| regex.is_match(text))
                    .unwrap_or(false)
            }
        }
    }

    fn regex(&self, pattern: &str) -> Option<Arc<Regex>> {
        if let Some(cached) = self.regex_cache.read().get(pattern) {
            return cached.clone();
        }

        let compiled = match Regex::new(pattern) {
            Ok(regex) => Some(Arc::new(regex)),
            Err(e) => {
                warn!("Invalid regex '{}' in routing condition: {}", pattern, e);
                None
            }
        };
        self.regex_cache
            .write()
            .entry(pattern.to_string())
            .or_insert(compiled)
            .clone()
    }

    pub fn clear_cache(&self) {
        self.regex_cache.write().clear();
    }
}
