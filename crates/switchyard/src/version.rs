//! API version resolution.
//!
//! Picks the service version a request asks for (or the default one) and
//! returns a derived [`ServiceConfig`] pointing at that version's endpoints.
//! The registry's config is never modified.

use crate::config::{
    ServiceConfig, VersionConfig, VersionStrategy, VersioningConfig, DEFAULT_VERSION_HEADER,
    DEFAULT_VERSION_QUERY,
};
use crate::registry::ServiceRegistry;
use crate::request::RequestView;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// `/api/vN` prefix read by the path strategy.
static PATH_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/(v\d+)(/|$)").expect("path version regex is valid"));

#[derive(Debug, Default, Clone, Copy)]
pub struct VersionResolver;

impl VersionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Version named by the request, per the service's strategy.
    pub fn requested_version<'a, R: RequestView + ?Sized>(
        &self,
        request: &'a R,
        versioning: &VersioningConfig,
    ) -> Option<&'a str> {
        let requested = match versioning.strategy {
            VersionStrategy::Header => request.header(
                versioning
                    .parameter
                    .as_deref()
                    .unwrap_or(DEFAULT_VERSION_HEADER),
            ),
            VersionStrategy::Query => request.query(
                versioning
                    .parameter
                    .as_deref()
                    .unwrap_or(DEFAULT_VERSION_QUERY),
            ),
            VersionStrategy::Path => PATH_VERSION
                .captures(request.path())
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str()),
        };
        requested.filter(|v| !v.is_empty())
    }

    /// Resolve the service config to route to.
    ///
    /// Returns `service` itself when versioning is off or no active version
    /// applies; otherwise a new config for the requested (or default) version.
    pub fn resolve<R: RequestView + ?Sized>(
        &self,
        request: &R,
        service: &Arc<ServiceConfig>,
        registry: &dyn ServiceRegistry,
    ) -> Arc<ServiceConfig> {
        if !service.versioning.enabled {
            return Arc::clone(service);
        }

        if let Some(requested) = self.requested_version(request, &service.versioning) {
            match registry.get_service_version(&service.id, requested) {
                Some(version) if version.is_active => {
                    debug!("Service '{}' resolved to version '{}'", service.id, requested);
                    return Arc::new(derive_config(service, &version, false));
                }
                Some(_) => debug!(
                    "Requested version '{}' of service '{}' is inactive",
                    requested, service.id
                ),
                None => debug!(
                    "Requested version '{}' of service '{}' is not registered",
                    requested, service.id
                ),
            }
        }

        match registry.get_default_service_version(&service.id) {
            Some(version) if version.is_active => {
                debug!(
                    "Service '{}' using default version '{}'",
                    service.id, version.version
                );
                Arc::new(derive_config(service, &version, true))
            }
            _ => Arc::clone(service),
        }
    }
}

fn derive_config(base: &ServiceConfig, version: &VersionConfig, used_default: bool) -> ServiceConfig {
    let mut derived = base.clone();
    derived.version = Some(version.version.clone());
    derived.upstream = version.endpoints.clone();
    derived.metadata.resolved_version = Some(version.version.clone());
    derived.metadata.is_versioned = true;
    derived.metadata.used_default = used_default;
    derived
}
