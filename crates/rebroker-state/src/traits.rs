//! Role traits the provisioning engine depends on.
//!
//! Implementations must be safe to call concurrently from many tasks; callers
//! take no external locks around them.

use crate::error::StateResult;
use crate::types::*;

/// Persistence of service instances.
pub trait InstanceStore: Send + Sync {
    /// Insert a new instance. Fails with `AlreadyExists` if the id is taken.
    fn insert(&self, instance: &Instance) -> StateResult<()>;

    /// Get an instance by id. Fails with `NotFound` if absent.
    fn get(&self, id: &str) -> StateResult<Instance>;

    /// Remove an instance by id. Fails with `NotFound` if absent.
    fn remove(&self, id: &str) -> StateResult<()>;

    /// First instance matching the predicate, if any.
    fn find_one(&self, predicate: &dyn Fn(&Instance) -> bool) -> StateResult<Option<Instance>>;

    /// All instances matching the predicate.
    fn find_all(&self, predicate: &dyn Fn(&Instance) -> bool) -> StateResult<Vec<Instance>>;

    /// Overwrite the state of an existing instance.
    fn update_state(&self, id: &str, state: InstanceState) -> StateResult<()>;
}

/// Persistence of instance operations.
pub trait OperationStore: Send + Sync {
    /// Insert a new operation. Fails with `AlreadyExists` on a duplicate operation id.
    fn insert(&self, op: &InstanceOperation) -> StateResult<()>;

    /// Get a single operation of an instance.
    fn get(&self, instance_id: &str, operation_id: &str) -> StateResult<InstanceOperation>;

    /// All operations of an instance in insertion order.
    ///
    /// Fails with `NotFound` if the instance has no operations at all.
    fn get_all(&self, instance_id: &str) -> StateResult<Vec<InstanceOperation>>;

    /// Overwrite the state of an operation, keeping its description.
    fn update_state(
        &self,
        instance_id: &str,
        operation_id: &str,
        state: OperationState,
    ) -> StateResult<()>;

    /// Overwrite both state and description of an operation.
    fn update_state_desc(
        &self,
        instance_id: &str,
        operation_id: &str,
        state: OperationState,
        description: Option<&str>,
    ) -> StateResult<()>;

    /// Remove a single operation.
    fn remove(&self, instance_id: &str, operation_id: &str) -> StateResult<()>;
}
