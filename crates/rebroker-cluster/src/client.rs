//! Async client contracts.

use async_trait::async_trait;

use crate::error::ClusterResult;
use crate::types::{EventActivation, ServiceInstance};

/// Looks up platform service instances.
#[async_trait]
pub trait ServiceInstanceGetter: Send + Sync {
    /// The service instance in `namespace` whose external id is `external_id`.
    ///
    /// Fails with `NotFound` when no such instance exists.
    async fn get_by_namespace_and_external_id(
        &self,
        namespace: &str,
        external_id: &str,
    ) -> ClusterResult<ServiceInstance>;
}

/// EventActivation CRUD, namespaced by the resource itself.
#[async_trait]
pub trait EventActivationClient: Send + Sync {
    /// Create; fails with `AlreadyExists` on a name clash in the namespace.
    async fn create(&self, activation: EventActivation) -> ClusterResult<EventActivation>;

    async fn get(&self, namespace: &str, name: &str) -> ClusterResult<EventActivation>;

    /// Replace an existing activation.
    async fn update(&self, activation: EventActivation) -> ClusterResult<EventActivation>;

    async fn delete(&self, namespace: &str, name: &str) -> ClusterResult<()>;
}
