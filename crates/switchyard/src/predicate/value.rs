//! Typed request values read by routing conditions.

use crate::config::ConditionSource;
use crate::request::RequestView;
use serde_json::Value;

/// A request value as seen by a condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    String(&'a str),
    Number(f64),
    Bool(bool),
    /// Present but explicitly null
    Null,
    /// Objects and arrays: they exist but never compare equal to a literal
    Composite(&'a Value),
    Absent,
}

impl<'a> FieldValue<'a> {
    pub fn from_json(value: &'a Value) -> Self {
        match value {
            Value::String(s) => FieldValue::String(s),
            Value::Number(n) => n.as_f64().map_or(FieldValue::Null, FieldValue::Number),
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Null => FieldValue::Null,
            Value::Array(_) | Value::Object(_) => FieldValue::Composite(value),
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, FieldValue::Absent | FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            FieldValue::String(s) => Some(*s),
            _ => None,
        }
    }

    /// Strict typed equality with a condition literal: no coercion between
    /// strings, numbers and booleans.
    pub fn equals(&self, expected: &Value) -> bool {
        match (self, expected) {
            (FieldValue::String(actual), Value::String(expected)) => actual == expected,
            (FieldValue::Number(actual), Value::Number(expected)) => {
                expected.as_f64() == Some(*actual)
            }
            (FieldValue::Bool(actual), Value::Bool(expected)) => actual == expected,
            _ => false,
        }
    }
}

pub fn extract_header<'a, R: RequestView + ?Sized>(request: &'a R, name: &str) -> FieldValue<'a> {
    request
        .header(name)
        .map_or(FieldValue::Absent, FieldValue::String)
}

pub fn extract_query<'a, R: RequestView + ?Sized>(request: &'a R, name: &str) -> FieldValue<'a> {
    request
        .query(name)
        .map_or(FieldValue::Absent, FieldValue::String)
}

pub fn extract_body<'a, R: RequestView + ?Sized>(request: &'a R, field: &str) -> FieldValue<'a> {
    request
        .body_field(field)
        .map_or(FieldValue::Absent, FieldValue::from_json)
}

pub fn extract_user<'a, R: RequestView + ?Sized>(request: &'a R, field: &str) -> FieldValue<'a> {
    request
        .user_field(field)
        .map_or(FieldValue::Absent, FieldValue::from_json)
}

/// Read the value a condition refers to. Feature flags have no backing
/// service yet and always read as absent.
pub fn extract<'a, R: RequestView + ?Sized>(
    request: &'a R,
    source: ConditionSource,
    field: &str,
) -> FieldValue<'a> {
    match source {
        ConditionSource::Header => extract_header(request, field),
        ConditionSource::Query => extract_query(request, field),
        ConditionSource::Body => extract_body(request, field),
        ConditionSource::User => extract_user(request, field),
        ConditionSource::FeatureFlag => FieldValue::Absent,
    }
}
