//! Error types for rule administration.
//!
//! Request matching never fails: a miss is `None` and malformed rewrites are
//! skipped. Errors only surface from operations that mutate the rule set.

use crate::pattern::PatternError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Invalid pattern '{pattern}' in rule '{rule_id}': {source}")]
    InvalidPattern {
        rule_id: String,
        pattern: String,
        #[source]
        source: PatternError,
    },
    #[error("Routing rule '{0}' not found")]
    RuleNotFound(String),
    #[error("Rule '{rule_id}' belongs to service '{actual}', expected '{expected}'")]
    ServiceMismatch {
        rule_id: String,
        expected: String,
        actual: String,
    },
    #[error("Duplicate rule id '{0}' in batch")]
    DuplicateRule(String),
}

impl RouterError {
    /// Attach the owning rule id to a pattern compile failure.
    pub(crate) fn invalid_pattern(rule_id: &str, pattern: &str, source: PatternError) -> Self {
        RouterError::InvalidPattern {
            rule_id: rule_id.to_string(),
            pattern: pattern.to_string(),
            source,
        }
    }
}
