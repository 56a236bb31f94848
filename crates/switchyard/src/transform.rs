//! Path transformation.
//!
//! A matched request path goes through two stages:
//!
//! 1. The rule's transformations in order (`rewrite` is a regex replace of
//!    every match, `replace` a literal replace), followed by `:param`
//!    substitution from the extracted path parameters.
//! 2. The resolved service's path rewrite rules, each built with its flags.
//!
//! A transformation or rewrite rule that fails to compile is logged and
//! skipped; the path carries on from the last good step.

use crate::config::{PathAction, PathRewriteRule, RequestTransformation, TransformationKind};
use crate::pattern::{PathParams, PARAM_TOKEN};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// `$$` or a numbered group reference in a replacement string.
static GROUP_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\$|\d+)").expect("group reference regex is valid"));

/// Applies rule transformations and service path rewrites.
///
/// Compiled regexes are cached by expression (flags included), failures too.
#[derive(Debug, Default)]
pub struct TransformationPipeline {
    regex_cache: RwLock<HashMap<String, Option<Arc<Regex>>>>,
}

impl TransformationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `transformations` over `original_path`, then substitute path
    /// parameters. Substitution runs even when the list is empty.
    pub fn apply(
        &self,
        original_path: &str,
        transformations: &[RequestTransformation],
        params: &PathParams,
    ) -> String {
        let mut path = original_path.to_string();

        for transformation in transformations {
            if transformation.kind != TransformationKind::Path {
                debug!("Skipping unsupported transformation type");
                continue;
            }

            match &transformation.action {
                PathAction::Rewrite {
                    pattern,
                    replacement,
                } => {
                    let Some(regex) = self.regex(pattern) else {
                        warn!("Skipping path rewrite with invalid pattern '{}'", pattern);
                        continue;
                    };
                    let replacement = group_refs(replacement);
                    path = regex.replace_all(&path, &*replacement).into_owned();
                }
                PathAction::Replace { field, value } => {
                    if !field.is_empty() {
                        path = path.replace(field.as_str(), value);
                    }
                }
            }
        }

        substitute_params(&path, params)
    }

    /// Apply service-level rewrite rules in order.
    pub fn apply_path_rewrites(&self, path: &str, rules: &[PathRewriteRule]) -> String {
        let mut current = path.to_string();

        for rule in rules {
            let flags = match RewriteFlags::parse(rule.flags.as_deref().unwrap_or_default()) {
                Ok(flags) => flags,
                Err(flag) => {
                    warn!(
                        "Skipping path rewrite rule '{}': unsupported flag '{}'",
                        rule.pattern, flag
                    );
                    continue;
                }
            };

            let expression = flags.expression(&rule.pattern);
            let Some(regex) = self.regex(&expression) else {
                warn!(
                    "Skipping path rewrite rule with invalid pattern '{}'",
                    rule.pattern
                );
                continue;
            };

            let replacement = group_refs(&rule.replacement);
            current = if flags.global {
                regex.replace_all(&current, &*replacement)
            } else {
                regex.replace(&current, &*replacement)
            }
            .into_owned();
        }

        current
    }

    fn regex(&self, expression: &str) -> Option<Arc<Regex>> {
        if let Some(cached) = self.regex_cache.read().get(expression) {
            return cached.clone();
        }

        let compiled = match Regex::new(expression) {
            Ok(regex) => Some(Arc::new(regex)),
            Err(e) => {
                debug!("Regex '{}' failed to compile: {}", expression, e);
                None
            }
        };
        self.regex_cache
            .write()
            .entry(expression.to_string())
            .or_insert(compiled)
            .clone()
    }

    pub fn clear_cache(&self) {
        self.regex_cache.write().clear();
    }
}

/// Replace every `:name` token that has an extracted value. Tokens without a
/// value are left as they are.
pub fn substitute_params(path: &str, params: &PathParams) -> String {
    if params.is_empty() || !path.contains(':') {
        return path.to_string();
    }

    PARAM_TOKEN
        .replace_all(path, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Brace numbered references so `$1_x` means group 1 followed by `_x`.
/// `$$` stays a literal dollar and `${name}` is passed through.
fn group_refs(replacement: &str) -> Cow<'_, str> {
    if !replacement.contains('$') {
        return Cow::Borrowed(replacement);
    }
    GROUP_REF.replace_all(replacement, |caps: &Captures| match &caps[1] {
        "$" => "$$".to_string(),
        index => format!("${{{}}}", index),
    })
}

#[derive(Debug, Default, PartialEq)]
struct RewriteFlags {
    /// Inline regex flags (`i`, `m`, `s`, `x`)
    inline: String,
    global: bool,
}

impl RewriteFlags {
    /// Returns the first unsupported flag on failure.
    fn parse(flags: &str) -> Result<Self, char> {
        let mut parsed = RewriteFlags::default();
        for flag in flags.chars() {
            match flag {
                'i' | 'm' | 's' | 'x' => {
                    if !parsed.inline.contains(flag) {
                        parsed.inline.push(flag);
                    }
                }
                'g' => parsed.global = true,
                // Unicode is always on; sticky has no equivalent
                'u' | 'y' => {}
                other => return Err(other),
            }
        }
        Ok(parsed)
    }

    fn expression(&self, pattern: &str) -> String {
        if self.inline.is_empty() {
            pattern.to_string()
        } else {
            format!("(?{}){}", self.inline, pattern)
        }
    }
}
