//! OSB catalog assembly.

use std::sync::Arc;

use tracing::debug;

use crate::converter::Converter;
use crate::error::{CatalogError, CatalogResult};
use crate::osb::CatalogResponse;
use crate::registry::RemoteEnvironmentFinder;

/// Builds the OSB catalog from every known remote environment.
#[derive(Clone)]
pub struct CatalogService {
    finder: Arc<dyn RemoteEnvironmentFinder>,
    converter: Converter,
}

impl CatalogService {
    pub fn new(finder: Arc<dyn RemoteEnvironmentFinder>) -> Self {
        Self {
            finder,
            converter: Converter::new(),
        }
    }

    /// One catalog entry per service of every remote environment.
    ///
    /// Fails on the first remote environment that cannot be converted.
    pub fn get_catalog(&self) -> CatalogResult<CatalogResponse> {
        let envs = self.finder.find_all()?;
        let mut services = Vec::new();
        for re in &envs {
            let converted = self
                .converter
                .convert_all(re)
                .map_err(|e| CatalogError::Conversion {
                    name: re.name.clone(),
                    source: Box::new(e),
                })?;
            services.extend(converted);
        }
        debug!(
            remote_environments = envs.len(),
            services = services.len(),
            "catalog assembled"
        );
        Ok(CatalogResponse { services })
    }
}
