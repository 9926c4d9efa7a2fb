//! Operation status for OSB last-operation polling.

use std::sync::Arc;

use rebroker_state::{InstanceOperation, OperationState, OperationStore};

use crate::error::{BrokerError, BrokerResult};
use crate::osb::{LastOperationRequest, LastOperationResponse, LastOperationState};

#[derive(Clone)]
pub struct LastOperationService {
    operations: Arc<dyn OperationStore>,
}

impl LastOperationService {
    pub fn new(operations: Arc<dyn OperationStore>) -> Self {
        Self { operations }
    }

    /// State of the requested operation, or of the latest one without a key.
    pub fn last_operation(&self, req: &LastOperationRequest) -> BrokerResult<LastOperationResponse> {
        let op = match &req.operation {
            Some(operation_id) => self.operations.get(&req.instance_id, operation_id),
            None => self
                .operations
                .get_all(&req.instance_id)
                .and_then(|ops| latest(&req.instance_id, ops)),
        }
        .map_err(|e| {
            if e.is_not_found() {
                BrokerError::Gone(e.to_string())
            } else {
                BrokerError::Internal(format!("while getting instance operation from storage: {e}"))
            }
        })?;

        let state = match op.state {
            OperationState::Pending => LastOperationState::InProgress,
            OperationState::Succeeded => LastOperationState::Succeeded,
            OperationState::Failed => LastOperationState::Failed,
        };
        Ok(LastOperationResponse {
            state,
            description: op.description,
        })
    }
}

fn latest(
    instance_id: &str,
    ops: Vec<InstanceOperation>,
) -> rebroker_state::StateResult<InstanceOperation> {
    ops.into_iter()
        .last()
        .ok_or_else(|| rebroker_state::StateError::NotFound(format!("operations of {instance_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebroker_state::{OperationKind, StateStore};

    fn service() -> (StateStore, LastOperationService) {
        let store = StateStore::open_in_memory().unwrap();
        let svc = LastOperationService::new(Arc::new(store.clone()));
        (store, svc)
    }

    fn request(operation: Option<&str>) -> LastOperationRequest {
        LastOperationRequest {
            instance_id: "inst-1".to_string(),
            operation: operation.map(str::to_string),
        }
    }

    #[test]
    fn maps_operation_states() {
        let (store, svc) = service();
        let op = InstanceOperation::pending("inst-1", "op-1", OperationKind::Create, "");
        OperationStore::insert(&store, &op).unwrap();

        let resp = svc.last_operation(&request(Some("op-1"))).unwrap();
        assert_eq!(resp.state, LastOperationState::InProgress);
        assert_eq!(resp.description, None);

        store
            .update_state_desc("inst-1", "op-1", OperationState::Failed, Some("boom"))
            .unwrap();
        let resp = svc.last_operation(&request(Some("op-1"))).unwrap();
        assert_eq!(resp.state, LastOperationState::Failed);
        assert_eq!(resp.description.as_deref(), Some("boom"));
    }

    #[test]
    fn without_key_reports_latest() {
        let (store, svc) = service();
        let mut create = InstanceOperation::pending("inst-1", "op-b", OperationKind::Create, "");
        create.state = OperationState::Succeeded;
        OperationStore::insert(&store, &create).unwrap();
        let remove = InstanceOperation::pending("inst-1", "op-a", OperationKind::Remove, "");
        OperationStore::insert(&store, &remove).unwrap();

        let resp = svc.last_operation(&request(None)).unwrap();
        assert_eq!(resp.state, LastOperationState::InProgress);
    }

    #[test]
    fn unknown_operation_is_gone() {
        let (_store, svc) = service();
        assert!(matches!(
            svc.last_operation(&request(Some("missing"))).unwrap_err(),
            BrokerError::Gone(_)
        ));
        assert!(matches!(
            svc.last_operation(&request(None)).unwrap_err(),
            BrokerError::Gone(_)
        ));
    }

    #[test]
    fn in_progress_serializes_with_a_space() {
        let json = serde_json::to_value(LastOperationResponse {
            state: LastOperationState::InProgress,
            description: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"state": "in progress"}));
    }
}
