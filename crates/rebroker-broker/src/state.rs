//! Instance state derived from its operation history.

use std::sync::Arc;

use rebroker_state::{InstanceOperation, OperationId, OperationKind, OperationState, OperationStore};

use crate::error::StateViewError;

/// Read-only views answering the engine's idempotency questions.
pub trait InstanceStateGetter: Send + Sync {
    /// The latest succeeded operation is a create.
    ///
    /// An instance without history is not provisioned.
    fn is_provisioned(&self, instance_id: &str) -> Result<bool, StateViewError>;

    /// The pending create operation, if one is in flight.
    fn is_provisioning_in_progress(
        &self,
        instance_id: &str,
    ) -> Result<Option<OperationId>, StateViewError>;

    /// The latest succeeded operation is a remove.
    ///
    /// Fails with `NotFound` for an instance without history.
    fn is_deprovisioned(&self, instance_id: &str) -> Result<bool, StateViewError>;

    /// The pending remove operation, if one is in flight.
    fn is_deprovisioning_in_progress(
        &self,
        instance_id: &str,
    ) -> Result<Option<OperationId>, StateViewError>;
}

/// [`InstanceStateGetter`] over an [`OperationStore`].
#[derive(Clone)]
pub struct InstanceStateService {
    operations: Arc<dyn OperationStore>,
}

impl InstanceStateService {
    pub fn new(operations: Arc<dyn OperationStore>) -> Self {
        Self { operations }
    }

    fn history(&self, instance_id: &str) -> Result<Vec<InstanceOperation>, StateViewError> {
        self.operations.get_all(instance_id).map_err(|e| {
            if e.is_not_found() {
                StateViewError::NotFound(instance_id.to_string())
            } else {
                StateViewError::Storage(e)
            }
        })
    }

    /// History, with a missing one read as empty.
    fn history_or_empty(
        &self,
        instance_id: &str,
    ) -> Result<Vec<InstanceOperation>, StateViewError> {
        match self.history(instance_id) {
            Err(StateViewError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    /// Kind of the most recent succeeded operation. Failed and pending
    /// operations never change what the instance is.
    fn settled_kind(ops: &[InstanceOperation]) -> Option<OperationKind> {
        ops.iter()
            .filter(|op| op.state == OperationState::Succeeded)
            .max_by_key(|op| op.seq)
            .map(|op| op.kind)
    }

    fn first_pending(
        &self,
        instance_id: &str,
        kind: OperationKind,
    ) -> Result<Option<OperationId>, StateViewError> {
        Ok(self
            .history_or_empty(instance_id)?
            .into_iter()
            .find(|op| op.kind == kind && op.state == OperationState::Pending)
            .map(|op| op.operation_id))
    }
}

impl InstanceStateGetter for InstanceStateService {
    fn is_provisioned(&self, instance_id: &str) -> Result<bool, StateViewError> {
        let history = self.history_or_empty(instance_id)?;
        Ok(Self::settled_kind(&history) == Some(OperationKind::Create))
    }

    fn is_provisioning_in_progress(
        &self,
        instance_id: &str,
    ) -> Result<Option<OperationId>, StateViewError> {
        self.first_pending(instance_id, OperationKind::Create)
    }

    fn is_deprovisioned(&self, instance_id: &str) -> Result<bool, StateViewError> {
        let history = self.history(instance_id)?;
        Ok(Self::settled_kind(&history) == Some(OperationKind::Remove))
    }

    fn is_deprovisioning_in_progress(
        &self,
        instance_id: &str,
    ) -> Result<Option<OperationId>, StateViewError> {
        self.first_pending(instance_id, OperationKind::Remove)
    }
}
