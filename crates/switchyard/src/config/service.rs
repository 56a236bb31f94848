//! Backend service and version configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default header carrying the requested API version.
pub const DEFAULT_VERSION_HEADER: &str = "x-api-version";

/// Default query parameter carrying the requested API version.
pub const DEFAULT_VERSION_QUERY: &str = "version";

/// Registry description of a backend service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Set on configs derived by version resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Upstream endpoint URLs
    #[serde(default)]
    pub upstream: Vec<String>,
    #[serde(default)]
    pub versioning: VersioningConfig,
    /// Applied to the path after rule transformations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_rewrite_rules: Vec<PathRewriteRule>,
    #[serde(default)]
    pub metadata: ServiceMetadata,
}

impl ServiceConfig {
    pub fn new(id: impl Into<String>, upstream: &[&str]) -> Self {
        Self {
            id: id.into(),
            upstream: upstream.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_versioning(mut self, versioning: VersioningConfig) -> Self {
        self.versioning = versioning;
        self
    }

    pub fn with_path_rewrite(mut self, rule: PathRewriteRule) -> Self {
        self.path_rewrite_rules.push(rule);
        self
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VersioningConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub strategy: VersionStrategy,
    /// Header or query parameter name (strategy dependent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl VersioningConfig {
    pub fn new(strategy: VersionStrategy) -> Self {
        Self {
            enabled: true,
            strategy,
            parameter: None,
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }
}

/// Where the requested version is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    /// Header (default `x-api-version`)
    #[default]
    Header,
    /// `/api/vN/...` path prefix
    Path,
    /// Query parameter (default `version`)
    Query,
}

/// Service-level regex rewrite applied after rule transformations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PathRewriteRule {
    pub pattern: String,
    /// Regex flags: i, m, s, x, g (u and y are accepted and ignored)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    pub replacement: String,
}

impl PathRewriteRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            flags: None,
            replacement: replacement.into(),
        }
    }

    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = Some(flags.into());
        self
    }
}

/// Service annotations; the version fields are filled in on derived configs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_version: Option<String>,
    #[serde(default)]
    pub is_versioned: bool,
    #[serde(default)]
    pub used_default: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// One registered version of a service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionConfig {
    pub version: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

fn default_active() -> bool {
    true
}

impl VersionConfig {
    pub fn new(version: impl Into<String>, endpoints: &[&str]) -> Self {
        Self {
            version: version.into(),
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
            is_active: true,
            is_default: false,
            metadata: HashMap::new(),
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_config_yaml() {
        let yaml = r#"
id: ecommerce
upstream: ["http://orders:8080"]
versioning:
  enabled: true
  strategy: query
  parameter: api
pathRewriteRules:
  - pattern: ^/api/v\d+
    flags: i
    replacement: ""
metadata:
  team: checkout
"#;
        let service: ServiceConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(service.versioning.strategy, VersionStrategy::Query);
        assert_eq!(service.versioning.parameter.as_deref(), Some("api"));
        assert_eq!(service.path_rewrite_rules[0].flags.as_deref(), Some("i"));
        assert!(service.metadata.resolved_version.is_none());
        assert!(!service.metadata.used_default);
        assert!(service.metadata.extra.contains_key("team"));
    }

    #[test]
    fn test_versioning_defaults_to_disabled_header() {
        let service: ServiceConfig = serde_yaml::from_str("id: plain").unwrap();
        assert!(!service.versioning.enabled);
        assert_eq!(service.versioning.strategy, VersionStrategy::Header);
        assert!(service.upstream.is_empty());
    }

    #[test]
    fn test_version_config_defaults_active() {
        let version: VersionConfig =
            serde_json::from_str(r#"{"version": "v2", "endpoints": ["http://v2:80"]}"#).unwrap();
        assert!(version.is_active);
        assert!(!version.is_default);
    }
}
