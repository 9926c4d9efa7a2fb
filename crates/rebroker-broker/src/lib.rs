//! rebroker-broker: the OSB provisioning engine.
//!
//! Provision and deprovision requests are answered in two phases. A short
//! synchronous phase validates the request, checks the instance's operation
//! history for idempotent retries and records a pending operation; the caller
//! gets an operation key right away. The real work (access decision,
//! EventActivation management) then runs on its own tokio task and writes the
//! terminal state back to the stores, where the last-operation endpoint finds
//! it.
//!
//! # Components
//!
//! - **`state`**: provisioned / in-progress views derived from the operation history
//! - **`provision`**: [`Provisioner`], the provision state machine
//! - **`deprovision`**: [`Deprovisioner`], the teardown state machine
//! - **`last_operation`**: operation status for OSB polling
//! - **`locks`**: per-instance lease serializing the check-then-insert sequence
//! - **`events`**: completion notifications published by background jobs
//! - **`broker`**: [`Broker`], everything wired together over shared [`Collaborators`]

pub mod broker;
pub mod config;
pub mod deprovision;
pub mod error;
pub mod events;
pub mod last_operation;
pub mod locks;
pub mod osb;
pub mod params;
pub mod provision;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use broker::{Broker, Collaborators, OperationIdProvider, uuid_operation_ids};
pub use config::BrokerConfig;
pub use deprovision::Deprovisioner;
pub use error::{BrokerError, BrokerResult, StateViewError};
pub use events::{OperationEvent, OperationEvents};
pub use last_operation::LastOperationService;
pub use locks::InstanceLocks;
pub use osb::*;
pub use params::params_hash;
pub use provision::Provisioner;
pub use state::{InstanceStateGetter, InstanceStateService};
