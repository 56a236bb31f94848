//! Configuration types for Switchyard.
//!
//! A config file describes the services known to the in-memory registry and
//! the routing rules loaded at startup:
//!
//! ```yaml
//! logging:
//!   level: info
//! services:
//!   - id: ecommerce
//!     upstream: ["http://orders:8080"]
//! rules:
//!   - id: orders
//!     pattern: /api/v1/orders/*
//!     methods: [GET, POST]
//!     serviceId: ecommerce
//!     priority: 100
//! ```

mod logging;
mod rules;
mod service;

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pattern::CompiledPattern;

pub use logging::{LogFormat, LoggingConfig};
pub use rules::{
    ConditionOperator, ConditionSource, PathAction, RequestTransformation, RoutingCondition,
    RoutingRule, RuleMetadata, TransformationKind,
};
pub use service::{
    PathRewriteRule, ServiceConfig, ServiceMetadata, VersionConfig, VersionStrategy,
    VersioningConfig, DEFAULT_VERSION_HEADER, DEFAULT_VERSION_QUERY,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

/// A service plus the versions registered for it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceDefinition {
    #[serde(flatten)]
    pub service: ServiceConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<VersionConfig>,
}

impl Config {
    /// Read and validate a config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let config = Self::read_file(path)?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Read a config file without validating it, so logging can be set up
    /// from it before validation warnings are emitted.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let mut service_ids = HashSet::new();
        for definition in &self.services {
            let id = &definition.service.id;
            if !service_ids.insert(id.as_str()) {
                anyhow::bail!("Duplicate service id '{}'", id);
            }
            Self::validate_versions(definition)?;
        }

        let mut rule_ids = HashSet::new();
        for rule in &self.rules {
            if !rule_ids.insert(rule.id.as_str()) {
                anyhow::bail!("Duplicate routing rule id '{}'", rule.id);
            }

            CompiledPattern::compile(&rule.pattern).with_context(|| {
                format!("Invalid pattern '{}' in rule '{}'", rule.pattern, rule.id)
            })?;

            // The registry may be fed from elsewhere; unknown services only
            // turn into routing misses.
            if !service_ids.contains(rule.service_id.as_str()) {
                warn!(
                    "Rule '{}' references service '{}' which is not defined in this config",
                    rule.id, rule.service_id
                );
            }
        }

        Ok(())
    }

    fn validate_versions(definition: &ServiceDefinition) -> Result<(), anyhow::Error> {
        let service_id = &definition.service.id;
        let mut names = HashSet::new();
        let mut defaults = 0;

        for version in &definition.versions {
            if !names.insert(version.version.as_str()) {
                anyhow::bail!(
                    "Service '{}' declares version '{}' more than once",
                    service_id,
                    version.version
                );
            }
            if version.is_default {
                defaults += 1;
            }
        }

        if defaults > 1 {
            anyhow::bail!(
                "Service '{}' declares {} default versions; at most one is allowed",
                service_id,
                defaults
            );
        }

        Ok(())
    }
}
