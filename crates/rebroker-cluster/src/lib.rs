//! rebroker-cluster: the orchestrator resources the broker touches.
//!
//! The broker reads service instances (created by the platform's service
//! catalog when a user asks for a service) and manages one EventActivation
//! per provisioned events service. Both are reached through narrow async
//! client traits so a real cluster client and the in-memory
//! [`InMemoryCluster`] are interchangeable.

pub mod client;
pub mod error;
pub mod memory;
pub mod types;

pub use client::{EventActivationClient, ServiceInstanceGetter};
pub use error::{ClusterError, ClusterResult};
pub use memory::InMemoryCluster;
pub use types::{EventActivation, OwnerReference, ServiceInstance};
