//! EnvironmentMappings: which remote environment is enabled in which namespace.

use std::collections::HashSet;
use std::sync::RwLock;

use tracing::info;

use crate::error::{AccessError, AccessResult};

/// Read access to EnvironmentMappings.
pub trait EnvironmentMappingLister: Send + Sync {
    /// True when `environment` is enabled in `namespace`.
    fn exists(&self, environment: &str, namespace: &str) -> AccessResult<bool>;
}

/// In-memory set of `(environment, namespace)` enablements.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    mappings: RwLock<HashSet<(String, String)>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self, environment: &str, namespace: &str) -> AccessResult<()> {
        let mut mappings = self.mappings.write().map_err(poisoned)?;
        if mappings.insert((environment.to_string(), namespace.to_string())) {
            info!(%environment, %namespace, "remote environment enabled in namespace");
        }
        Ok(())
    }

    pub fn disable(&self, environment: &str, namespace: &str) -> AccessResult<bool> {
        let mut mappings = self.mappings.write().map_err(poisoned)?;
        Ok(mappings.remove(&(environment.to_string(), namespace.to_string())))
    }
}

impl EnvironmentMappingLister for MappingRegistry {
    fn exists(&self, environment: &str, namespace: &str) -> AccessResult<bool> {
        let mappings = self.mappings.read().map_err(poisoned)?;
        Ok(mappings.contains(&(environment.to_string(), namespace.to_string())))
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> AccessError {
    AccessError::Mapping("mapping registry lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_and_disable() {
        let registry = MappingRegistry::new();
        assert!(!registry.exists("ec-prod", "production").unwrap());

        registry.enable("ec-prod", "production").unwrap();
        assert!(registry.exists("ec-prod", "production").unwrap());
        assert!(!registry.exists("ec-prod", "stage").unwrap());

        assert!(registry.disable("ec-prod", "production").unwrap());
        assert!(!registry.disable("ec-prod", "production").unwrap());
        assert!(!registry.exists("ec-prod", "production").unwrap());
    }
}
