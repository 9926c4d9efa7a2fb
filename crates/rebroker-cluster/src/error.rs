//! Cluster client errors.

use thiserror::Error;

pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: &'static str, name: String },

    #[error("{resource} \"{name}\" already exists")]
    AlreadyExists { resource: &'static str, name: String },

    /// Any other failure reported by the cluster API.
    #[error("{0}")]
    Backend(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists { .. })
    }
}
