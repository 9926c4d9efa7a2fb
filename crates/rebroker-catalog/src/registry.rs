//! Remote environment lookup.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::model::RemoteEnvironment;

/// Read access to the known remote environments.
pub trait RemoteEnvironmentFinder: Send + Sync {
    /// The remote environment that owns the service, if any.
    fn find_one_by_service_id(&self, service_id: &str) -> CatalogResult<Option<RemoteEnvironment>>;

    /// All remote environments, ordered by name.
    fn find_all(&self) -> CatalogResult<Vec<RemoteEnvironment>>;
}

/// In-process set of remote environments, keyed by name.
#[derive(Debug, Default)]
pub struct RemoteEnvironmentRegistry {
    envs: RwLock<HashMap<String, RemoteEnvironment>>,
}

impl RemoteEnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environments(envs: impl IntoIterator<Item = RemoteEnvironment>) -> Self {
        let registry = Self::new();
        if let Ok(mut map) = registry.envs.write() {
            for re in envs {
                map.insert(re.name.clone(), re);
            }
        }
        registry
    }

    /// Insert or replace a remote environment.
    pub fn upsert(&self, re: RemoteEnvironment) -> CatalogResult<()> {
        debug!(remote_environment = %re.name, services = re.services.len(), "registering remote environment");
        let mut map = self.envs.write().map_err(poisoned)?;
        map.insert(re.name.clone(), re);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> CatalogResult<Option<RemoteEnvironment>> {
        let mut map = self.envs.write().map_err(poisoned)?;
        Ok(map.remove(name))
    }

    pub fn get(&self, name: &str) -> CatalogResult<Option<RemoteEnvironment>> {
        let map = self.envs.read().map_err(poisoned)?;
        Ok(map.get(name).cloned())
    }
}

impl RemoteEnvironmentFinder for RemoteEnvironmentRegistry {
    fn find_one_by_service_id(&self, service_id: &str) -> CatalogResult<Option<RemoteEnvironment>> {
        let map = self.envs.read().map_err(poisoned)?;
        Ok(map
            .values()
            .find(|re| re.service(service_id).is_some())
            .cloned())
    }

    fn find_all(&self) -> CatalogResult<Vec<RemoteEnvironment>> {
        let map = self.envs.read().map_err(poisoned)?;
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> CatalogError {
    CatalogError::Registry("remote environment registry lock poisoned".to_string())
}
