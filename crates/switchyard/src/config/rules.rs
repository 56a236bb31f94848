//! Routing rule configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A prioritized policy binding a path/method pattern plus conditions to a
/// backend service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    /// Unique across all services
    pub id: String,
    pub pattern: String,
    /// HTTP methods this rule accepts (empty = any method)
    #[serde(default)]
    pub methods: Vec<String>,
    pub service_id: String,
    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: i64,
    /// All conditions must hold (AND)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RoutingCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<RequestTransformation>,
    #[serde(default)]
    pub metadata: RuleMetadata,
}

impl RoutingRule {
    pub fn new(
        id: impl Into<String>,
        pattern: impl Into<String>,
        service_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            methods: Vec::new(),
            service_id: service_id.into(),
            priority: 0,
            conditions: Vec::new(),
            transformations: Vec::new(),
            metadata: RuleMetadata::default(),
        }
    }

    pub fn with_methods(mut self, methods: &[&str]) -> Self {
        self.methods = methods.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_condition(mut self, condition: RoutingCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_transformation(mut self, transformation: RequestTransformation) -> Self {
        self.transformations.push(transformation);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.metadata.enabled = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.metadata.enabled
    }

    /// Method check (case-insensitive). An empty method list accepts all.
    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RuleMetadata {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form operator annotations
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl Default for RuleMetadata {
    fn default() -> Self {
        Self {
            enabled: true,
            description: None,
            extra: HashMap::new(),
        }
    }
}

/// Where a condition reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionSource {
    Header,
    Query,
    Body,
    User,
    /// Reserved for a feature flag service
    FeatureFlag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Equals,
    Contains,
    Regex,
    Exists,
}

/// A single predicate over the request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoutingCondition {
    #[serde(rename = "type")]
    pub source: ConditionSource,
    pub field: String,
    pub operator: ConditionOperator,
    /// Literal compared against the request value (unused by `exists`)
    #[serde(default)]
    pub value: Value,
}

impl RoutingCondition {
    pub fn new(
        source: ConditionSource,
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            source,
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn header(field: &str, operator: ConditionOperator, value: impl Into<Value>) -> Self {
        Self::new(ConditionSource::Header, field, operator, value)
    }

    pub fn exists(source: ConditionSource, field: &str) -> Self {
        Self::new(source, field, ConditionOperator::Exists, Value::Null)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationKind {
    #[default]
    Path,
    /// Transformation types this router does not apply
    #[serde(other)]
    Unsupported,
}

/// Path edit performed by a transformation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PathAction {
    /// Regex replace of every match
    Rewrite { pattern: String, replacement: String },
    /// Literal substring replace
    Replace { field: String, value: String },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RequestTransformation {
    #[serde(rename = "type", default)]
    pub kind: TransformationKind,
    #[serde(flatten)]
    pub action: PathAction,
}

impl RequestTransformation {
    pub fn rewrite(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            kind: TransformationKind::Path,
            action: PathAction::Rewrite {
                pattern: pattern.into(),
                replacement: replacement.into(),
            },
        }
    }

    pub fn replace(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: TransformationKind::Path,
            action: PathAction::Replace {
                field: field.into(),
                value: value.into(),
            },
        }
    }
}
