//! Broker error types.

use thiserror::Error;

use rebroker_state::StateError;

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Request-level failures, each mapping to one OSB error response.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The platform did not allow an asynchronous answer.
    #[error("asynchronous operation mode required")]
    AsyncRequired,

    #[error("{0}")]
    BadRequest(String),

    /// Same instance id, different parameters.
    #[error("{0}")]
    Conflict(String),

    /// Another operation on the instance is still in flight.
    #[error("{0}")]
    Concurrency(String),

    /// The instance does not exist (any more).
    #[error("{0}")]
    Gone(String),

    #[error("{0}")]
    Internal(String),
}

impl BrokerError {
    /// HTTP status of the OSB error response.
    pub fn status_code(&self) -> u16 {
        match self {
            BrokerError::AsyncRequired => 422,
            BrokerError::BadRequest(_) => 400,
            BrokerError::Conflict(_) => 409,
            BrokerError::Concurrency(_) => 422,
            BrokerError::Gone(_) => 410,
            BrokerError::Internal(_) => 500,
        }
    }

    /// OSB error code, where the protocol defines one.
    pub fn osb_code(&self) -> Option<&'static str> {
        match self {
            BrokerError::AsyncRequired => Some("AsyncRequired"),
            BrokerError::Concurrency(_) => Some("ConcurrencyError"),
            _ => None,
        }
    }
}

/// Failure of a derived instance state view.
#[derive(Debug, Error)]
pub enum StateViewError {
    /// The instance has no operation history at all.
    #[error("instance {0} not found")]
    NotFound(String),

    #[error("while getting operations from storage: {0}")]
    Storage(#[source] StateError),
}

impl StateViewError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateViewError::NotFound(_))
    }
}
