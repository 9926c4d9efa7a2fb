//! Access decision errors.

use thiserror::Error;

pub type AccessResult<T> = Result<T, AccessError>;

/// Failure to reach a decision, as opposed to a negative decision.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("while finding remote environment: {0}")]
    Finder(#[from] rebroker_catalog::CatalogError),

    #[error("while listing environment mappings: {0}")]
    Mapping(String),

    #[error("while checking instances in namespace: {0}")]
    Instances(#[from] rebroker_state::StateError),

    /// Failure reported by an external access service.
    #[error("{0}")]
    Backend(String),
}
