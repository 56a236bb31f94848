//! Service registry.
//!
//! The router only reads services through [`ServiceRegistry`]. Hosts with a
//! real discovery system implement the trait themselves; the in-memory
//! registry backs config files, the CLI and tests.

use crate::config::{ServiceConfig, ServiceDefinition, VersionConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Read-only view of the services known to the gateway.
pub trait ServiceRegistry: Send + Sync {
    fn get_service(&self, service_id: &str) -> Option<Arc<ServiceConfig>>;

    fn get_service_version(&self, service_id: &str, version: &str) -> Option<VersionConfig>;

    fn get_default_service_version(&self, service_id: &str) -> Option<VersionConfig>;
}

#[derive(Debug)]
struct RegisteredService {
    config: Arc<ServiceConfig>,
    versions: Vec<VersionConfig>,
}

/// In-memory implementation of [`ServiceRegistry`].
#[derive(Debug, Default)]
pub struct InMemoryServiceRegistry {
    services: RwLock<HashMap<String, RegisteredService>>,
}

impl InMemoryServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = ServiceDefinition>) -> Self {
        let registry = Self::new();
        for definition in definitions {
            let service_id = definition.service.id.clone();
            registry.register_service(definition.service);
            for version in definition.versions {
                registry.register_version(&service_id, version);
            }
        }
        registry
    }

    /// Register or replace a service. Versions already registered for the
    /// id are kept.
    pub fn register_service(&self, service: ServiceConfig) {
        let mut services = self.services.write();
        let config = Arc::new(service);
        debug!("Registering service '{}'", config.id);
        match services.get_mut(&config.id) {
            Some(existing) => existing.config = config,
            None => {
                services.insert(
                    config.id.clone(),
                    RegisteredService {
                        config,
                        versions: Vec::new(),
                    },
                );
            }
        }
    }

    /// Register or replace one version of a known service. Registering a
    /// default version clears the flag on the others.
    ///
    /// Returns `false` when the service is unknown.
    pub fn register_version(&self, service_id: &str, version: VersionConfig) -> bool {
        let mut services = self.services.write();
        let Some(service) = services.get_mut(service_id) else {
            return false;
        };

        if version.is_default {
            for existing in &mut service.versions {
                existing.is_default = false;
            }
        }

        match service
            .versions
            .iter_mut()
            .find(|v| v.version == version.version)
        {
            Some(existing) => *existing = version,
            None => service.versions.push(version),
        }
        true
    }

    pub fn remove_service(&self, service_id: &str) -> bool {
        self.services.write().remove(service_id).is_some()
    }

    pub fn service_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.services.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl ServiceRegistry for InMemoryServiceRegistry {
    fn get_service(&self, service_id: &str) -> Option<Arc<ServiceConfig>> {
        self.services
            .read()
            .get(service_id)
            .map(|s| Arc::clone(&s.config))
    }

    fn get_service_version(&self, service_id: &str, version: &str) -> Option<VersionConfig> {
        self.services
            .read()
            .get(service_id)?
            .versions
            .iter()
            .find(|v| v.version == version)
            .cloned()
    }

    fn get_default_service_version(&self, service_id: &str) -> Option<VersionConfig> {
        self.services
            .read()
            .get(service_id)?
            .versions
            .iter()
            .find(|v| v.is_default)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = InMemoryServiceRegistry::new();
        registry.register_service(ServiceConfig::new("orders", &["http://orders:80"]));

        let service = registry.get_service("orders").unwrap();
        assert_eq!(service.upstream, vec!["http://orders:80"]);
        assert!(registry.get_service("missing").is_none());
        assert_eq!(registry.service_ids(), vec!["orders"]);
    }

    #[test]
    fn test_versions() {
        let registry = InMemoryServiceRegistry::new();
        assert!(!registry.register_version("orders", VersionConfig::new("v1", &[])));

        registry.register_service(ServiceConfig::new("orders", &[]));
        assert!(registry.register_version("orders", VersionConfig::new("v1", &["http://v1"]).as_default()));
        assert!(registry.register_version("orders", VersionConfig::new("v2", &["http://v2"])));

        assert_eq!(
            registry.get_service_version("orders", "v2").unwrap().endpoints,
            vec!["http://v2"]
        );
        assert!(registry.get_service_version("orders", "v3").is_none());
        assert_eq!(
            registry.get_default_service_version("orders").unwrap().version,
            "v1"
        );

        // A new default replaces the previous one
        registry.register_version("orders", VersionConfig::new("v2", &["http://v2"]).as_default());
        assert_eq!(
            registry.get_default_service_version("orders").unwrap().version,
            "v2"
        );
    }

    #[test]
    fn test_reregistering_service_keeps_versions() {
        let registry = InMemoryServiceRegistry::new();
        registry.register_service(ServiceConfig::new("orders", &["http://a"]));
        registry.register_version("orders", VersionConfig::new("v1", &[]).as_default());

        registry.register_service(ServiceConfig::new("orders", &["http://b"]));

        assert_eq!(registry.get_service("orders").unwrap().upstream, vec!["http://b"]);
        assert!(registry.get_default_service_version("orders").is_some());

        assert!(registry.remove_service("orders"));
        assert!(registry.get_service("orders").is_none());
    }

    #[test]
    fn test_from_definitions() {
        let definitions = vec![ServiceDefinition {
            service: ServiceConfig::new("users", &[]),
            versions: vec![VersionConfig::new("v1", &[]).as_default()],
        }];
        let registry = InMemoryServiceRegistry::from_definitions(definitions);

        assert!(registry.get_service("users").is_some());
        assert!(registry.get_service_version("users", "v1").is_some());
    }
}
