//! Catalog error types.

use thiserror::Error;

/// Errors raised while looking up remote environments or building the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot create binding labels: accessLabel field is required to build bindingLabels")]
    MissingAccessLabel { service_id: String },

    #[error("while converting remote environment {name:?}: {source}")]
    Conversion {
        name: String,
        #[source]
        source: Box<CatalogError>,
    },

    #[error("registry error: {0}")]
    Registry(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
