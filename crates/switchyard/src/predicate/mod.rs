//! Routing conditions.
//!
//! A rule's conditions are ANDed predicates over one request value each:
//!
//! - `header`: case-insensitive request header
//! - `query`: query parameter
//! - `body`: parsed body field (plain key or dotted path)
//! - `user`: field of the authenticated user projection
//! - `feature_flag`: placeholder for a flag service, always false
//!
//! Values are read into a [`FieldValue`] so operators compare typed data
//! instead of untyped JSON.
//!
//! # Module Structure
//!
//! - `value` - `FieldValue` and one extractor per source
//! - `evaluator` - `ConditionEvaluator` and the operator semantics

mod evaluator;
mod value;

pub use evaluator::ConditionEvaluator;
pub use value::{
    extract, extract_body, extract_header, extract_query, extract_user, FieldValue,
};
