//! Path pattern compilation and caching.
//!
//! Rule patterns come in three shapes:
//!
//! - `/health`: literal, matched by exact equality
//! - `/api/v1/orders/*`: prefix wildcard, matched with `starts_with`
//! - `/api/v1/users/:id/*`: parameterized, compiled to an anchored regex
//!
//! Compiled patterns are cached by their raw string, so every rule sharing a
//! pattern shares one matcher.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Path parameters extracted from a parameterized pattern, keyed by name.
pub type PathParams = HashMap<String, String>;

/// `:name` parameter tokens inside a pattern.
pub(crate) static PARAM_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":(\w+)").expect("param token regex is valid"));

/// Capture group substituted for every `:name` token.
const PARAM_GROUP: &str = "([^/]+)";

/// Optional trailing-segment group for a pattern ending in `/*`.
const OPTIONAL_SUFFIX: &str = "(?:/.*)?";

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("parameter ':{0}' appears more than once")]
    DuplicateParam(String),
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// Matcher-ready form of a rule pattern.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    Literal(String),
    PrefixWildcard(String),
    Regex {
        regex: Arc<Regex>,
        param_names: Vec<String>,
    },
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CompiledPattern::Literal(a), CompiledPattern::Literal(b)) => a == b,
            (CompiledPattern::PrefixWildcard(a), CompiledPattern::PrefixWildcard(b)) => a == b,
            (
                CompiledPattern::Regex {
                    regex: a,
                    param_names: names_a,
                },
                CompiledPattern::Regex {
                    regex: b,
                    param_names: names_b,
                },
            ) => a.as_str() == b.as_str() && names_a == names_b,
            _ => false,
        }
    }
}

impl CompiledPattern {
    /// Compile a raw pattern string without touching any cache.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        let has_params = PARAM_TOKEN.is_match(pattern);

        if !has_params {
            if let Some(prefix) = pattern.strip_suffix("/*") {
                return Ok(CompiledPattern::PrefixWildcard(prefix.to_string()));
            }
        }

        if !pattern.contains(':') {
            return Ok(CompiledPattern::Literal(pattern.to_string()));
        }

        Self::compile_regex(pattern)
    }

    fn compile_regex(pattern: &str) -> Result<Self, PatternError> {
        let mut expr = String::with_capacity(pattern.len() * 2);
        let mut param_names = Vec::new();
        let mut last = 0;

        expr.push('^');
        for caps in PARAM_TOKEN.captures_iter(pattern) {
            let (Some(token), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str().to_string();
            if param_names.contains(&name) {
                return Err(PatternError::DuplicateParam(name));
            }
            push_literal(&mut expr, &pattern[last..token.start()]);
            expr.push_str(PARAM_GROUP);
            param_names.push(name);
            last = token.end();
        }

        let tail = &pattern[last..];
        match tail.strip_suffix("/*") {
            Some(rest) => {
                push_literal(&mut expr, rest);
                expr.push_str(OPTIONAL_SUFFIX);
            }
            None => {
                push_literal(&mut expr, tail);
                expr.push('$');
            }
        }

        Ok(CompiledPattern::Regex {
            regex: Arc::new(Regex::new(&expr)?),
            param_names,
        })
    }

    /// Match a request path, returning extracted parameters on success.
    ///
    /// Literal and prefix patterns never yield parameters. A captured value
    /// that percent-decodes to invalid UTF-8 makes the whole pattern a miss.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        match self {
            CompiledPattern::Literal(literal) => (path == literal).then(PathParams::new),
            CompiledPattern::PrefixWildcard(prefix) => {
                path.starts_with(prefix.as_str()).then(PathParams::new)
            }
            CompiledPattern::Regex { regex, param_names } => {
                let caps = regex.captures(path)?;
                let mut params = PathParams::with_capacity(param_names.len());
                for (i, name) in param_names.iter().enumerate() {
                    let raw = caps.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
                    match urlencoding::decode(raw) {
                        Ok(value) => {
                            params.insert(name.clone(), value.into_owned());
                        }
                        Err(e) => {
                            debug!("Path parameter '{}' failed to decode: {}", name, e);
                            return None;
                        }
                    }
                }
                Some(params)
            }
        }
    }

    pub fn is_parameterized(&self) -> bool {
        matches!(self, CompiledPattern::Regex { .. })
    }
}

/// Escape a literal pattern segment, turning bare `*` into `.*`.
fn push_literal(expr: &mut String, text: &str) {
    for (i, piece) in text.split('*').enumerate() {
        if i > 0 {
            expr.push_str(".*");
        }
        expr.push_str(&regex::escape(piece));
    }
}

/// Compiles patterns and caches them by their exact string.
#[derive(Debug, Default)]
pub struct PatternCompiler {
    cache: RwLock<HashMap<String, Arc<CompiledPattern>>>,
}

impl PatternCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached matcher for `pattern`, compiling it on first use.
    pub fn compile(&self, pattern: &str) -> Result<Arc<CompiledPattern>, PatternError> {
        if let Some(compiled) = self.cache.read().get(pattern) {
            return Ok(Arc::clone(compiled));
        }

        let compiled = Arc::new(CompiledPattern::compile(pattern)?);
        let mut cache = self.cache.write();
        // Another thread may have compiled the same pattern meanwhile
        let entry = cache
            .entry(pattern.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(entry))
    }

    /// Drop the cached matcher for one pattern.
    pub fn invalidate(&self, pattern: &str) {
        if self.cache.write().remove(pattern).is_some() {
            debug!("Invalidated cached pattern '{}'", pattern);
        }
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }
}
