//! Fixed service-name to base-URL table.

use dashmap::DashMap;
use microcall_core::TransportFailure;
use tracing::trace;

use crate::transport::ServiceResolver;

#[derive(Debug, Default)]
pub struct StaticResolver {
    services: DashMap<String, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, service: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.register(service, base_url);
        self
    }

    /// Registers or replaces the base URL for `service`.
    pub fn register(&self, service: impl Into<String>, base_url: impl Into<String>) {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        self.services.insert(service.into(), base_url);
    }

    pub fn deregister(&self, service: &str) -> Option<String> {
        self.services.remove(service).map(|(_, url)| url)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceResolver for StaticResolver {
    fn resolve(&self, service: &str, path: &str) -> Result<String, TransportFailure> {
        let base = self.services.get(service).ok_or_else(|| {
            TransportFailure::connection(format!("Service '{}' is not registered", service))
        })?;

        let url = if path.starts_with('/') {
            format!("{}{}", base.value(), path)
        } else {
            format!("{}/{}", base.value(), path)
        };
        trace!(service, %url, "Resolved service address");
        Ok(url)
    }
}
