//! Deprovisioning state machine.
//!
//! Mirrors provisioning: a synchronous phase under the instance lease records
//! a pending `Remove` operation and marks the instance `PendingDeletion`; a
//! background job removes the EventActivation and the instance record.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use rebroker_cluster::ClusterError;
use rebroker_state::{
    Instance, InstanceId, InstanceOperation, InstanceState, Namespace, OperationId, OperationKind,
    OperationState, ServiceId, StateError,
};

use crate::broker::Collaborators;
use crate::error::{BrokerError, BrokerResult};
use crate::events::OperationEvent;
use crate::osb::{DeprovisionRequest, DeprovisionResponse, OsbContext};

pub const DEPROVISION_SUCCEEDED: &str = "deprovision succeeded";

/// Answers OSB deprovision requests.
#[derive(Clone)]
pub struct Deprovisioner {
    c: Collaborators,
}

impl Deprovisioner {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { c: collaborators }
    }

    /// Accept a deprovision request.
    ///
    /// Fails with [`BrokerError::Gone`] for an instance the broker has never
    /// seen. Must be called within a tokio runtime.
    pub fn deprovision(
        &self,
        ctx: &OsbContext,
        req: DeprovisionRequest,
    ) -> BrokerResult<DeprovisionResponse> {
        if !req.accepts_incomplete {
            return Err(BrokerError::AsyncRequired);
        }
        debug!(
            instance_id = %req.instance_id,
            service_id = %req.service_id,
            api_version = %ctx.api_version,
            "deprovision requested"
        );

        let (resp, job) = self
            .c
            .locks
            .with_lock(&req.instance_id, || self.accept(&req))?;

        if let Some(job) = job {
            tokio::spawn(job.run());
        }
        Ok(resp)
    }

    fn accept(
        &self,
        req: &DeprovisionRequest,
    ) -> BrokerResult<(DeprovisionResponse, Option<DeprovisionJob>)> {
        let iid = req.instance_id.as_str();

        let deprovisioned = match self.c.instance_state.is_deprovisioned(iid) {
            Ok(deprovisioned) => deprovisioned,
            Err(e) if e.is_not_found() => {
                return Err(BrokerError::Gone(format!("instance {iid} not found")));
            }
            Err(e) => {
                return Err(BrokerError::Internal(format!(
                    "while checking if instance is already deprovisioned: {e}"
                )));
            }
        };

        // At most one operation per instance may be in flight.
        let provisioning = self
            .c
            .instance_state
            .is_provisioning_in_progress(iid)
            .map_err(|e| {
                BrokerError::Internal(format!(
                    "while checking if instance is being provisioned: {e}"
                ))
            })?;
        if let Some(operation_id) = provisioning {
            warn!(instance_id = %iid, operation_id = %operation_id, "deprovision rejected, provisioning in progress");
            return Err(BrokerError::Concurrency(format!(
                "instance {iid} is being provisioned by operation {operation_id}"
            )));
        }

        if deprovisioned {
            info!(instance_id = %iid, "instance already deprovisioned");
            return Ok((
                DeprovisionResponse {
                    is_async: false,
                    operation: None,
                },
                None,
            ));
        }

        let in_progress = self
            .c
            .instance_state
            .is_deprovisioning_in_progress(iid)
            .map_err(|e| {
                BrokerError::Internal(format!(
                    "while checking if instance is being deprovisioned: {e}"
                ))
            })?;
        if let Some(operation_id) = in_progress {
            info!(instance_id = %iid, operation_id = %operation_id, "deprovisioning already in progress");
            return Ok((
                DeprovisionResponse {
                    is_async: true,
                    operation: Some(operation_id),
                },
                None,
            ));
        }

        let instance = match self.c.instances.get(iid) {
            Ok(instance) => instance,
            Err(e) if e.is_not_found() => {
                return Err(BrokerError::Gone(format!("instance {iid} not found")));
            }
            Err(e) => {
                return Err(BrokerError::Internal(format!(
                    "while getting instance {iid} from storage: {e}"
                )));
            }
        };

        let operation_id = (self.c.operation_ids)().map_err(|e| {
            BrokerError::Internal(format!("while generating ID for operation: {e}"))
        })?;
        let op = InstanceOperation::pending(
            iid,
            &operation_id,
            OperationKind::Remove,
            &instance.params_hash,
        );
        self.c.operations.insert(&op).map_err(|e| {
            BrokerError::Internal(format!(
                "while inserting instance operation to storage: {e}"
            ))
        })?;
        self.c
            .instances
            .update_state(iid, InstanceState::PendingDeletion)
            .map_err(|e| {
                BrokerError::Internal(format!("while marking instance for deletion: {e}"))
            })?;

        info!(instance_id = %iid, operation_id = %operation_id, "deprovisioning accepted");

        let job = DeprovisionJob {
            instance_id: instance.id,
            operation_id: operation_id.clone(),
            service_id: instance.service_id,
            namespace: instance.namespace,
            c: self.c.clone(),
        };
        Ok((
            DeprovisionResponse {
                is_async: true,
                operation: Some(operation_id),
            },
            Some(job),
        ))
    }
}

#[derive(Debug, Error)]
enum TeardownError {
    #[error("deprovisioning failed while removing EventActivation on error: {0}")]
    EventActivation(String),

    #[error("Failed to remove instance from storage")]
    RemoveInstance(#[source] StateError),
}

impl From<ClusterError> for TeardownError {
    fn from(e: ClusterError) -> Self {
        TeardownError::EventActivation(e.to_string())
    }
}

/// Background half of a deprovision.
pub(crate) struct DeprovisionJob {
    instance_id: InstanceId,
    operation_id: OperationId,
    service_id: ServiceId,
    namespace: Namespace,
    c: Collaborators,
}

impl DeprovisionJob {
    pub(crate) async fn run(self) {
        let state = match self.execute().await {
            Ok(()) => {
                self.record(OperationState::Succeeded, DEPROVISION_SUCCEEDED);
                info!(instance_id = %self.instance_id, operation_id = %self.operation_id, "deprovision succeeded");
                OperationState::Succeeded
            }
            Err(e) => {
                if let TeardownError::RemoveInstance(source) = &e {
                    error!(instance_id = %self.instance_id, error = %source, "cannot remove instance from storage");
                } else if let Err(ue) = self
                    .c
                    .instances
                    .update_state(&self.instance_id, InstanceState::Failed)
                {
                    error!(instance_id = %self.instance_id, error = %ue, "cannot update state of the stored instance");
                }
                let description = e.to_string();
                self.record(OperationState::Failed, &description);
                warn!(instance_id = %self.instance_id, operation_id = %self.operation_id, %description, "deprovision failed");
                OperationState::Failed
            }
        };

        self.c.events.publish(OperationEvent {
            instance_id: self.instance_id.clone(),
            operation_id: self.operation_id.clone(),
            kind: OperationKind::Remove,
            state,
        });
    }

    async fn execute(&self) -> Result<(), TeardownError> {
        if !self.activation_still_used()? {
            match self
                .c
                .event_activations
                .delete(&self.namespace, &self.service_id)
                .await
            {
                Ok(()) => {
                    info!(name = %self.service_id, namespace = %self.namespace, "EventActivation removed")
                }
                Err(e) if e.is_not_found() => {
                    debug!(name = %self.service_id, namespace = %self.namespace, "EventActivation already gone")
                }
                Err(e) => return Err(e.into()),
            }
        }

        match self.c.instances.remove(&self.instance_id) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(TeardownError::RemoveInstance(e)),
        }
    }

    /// Another live instance of the service in the namespace shares the activation.
    fn activation_still_used(&self) -> Result<bool, TeardownError> {
        let other = self
            .c
            .instances
            .find_one(&|i: &Instance| {
                i.id != self.instance_id
                    && i.service_id == self.service_id
                    && i.namespace == self.namespace
                    && matches!(i.state, InstanceState::Pending | InstanceState::Succeeded)
            })
            .map_err(|e| TeardownError::EventActivation(e.to_string()))?;
        Ok(other.is_some())
    }

    fn record(&self, state: OperationState, description: &str) {
        if let Err(e) = self.c.operations.update_state_desc(
            &self.instance_id,
            &self.operation_id,
            state,
            Some(description),
        ) {
            error!(instance_id = %self.instance_id, operation_id = %self.operation_id, error = %e, "cannot update operation state");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::*;
    use rebroker_cluster::{EventActivation, EventActivationClient};
    use rebroker_state::{InstanceStore, OperationStore};

    /// Provision [`INSTANCE_ID`] to completion.
    async fn provisioned(fx: &Fixture) {
        fx.register_service_instance().await;
        let mut events = fx.c.events.subscribe();
        fx.provisioner()
            .provision(&OsbContext::default(), provision_request())
            .unwrap();
        assert_eq!(next_event(&mut events).await.state, OperationState::Succeeded);
    }

    #[tokio::test]
    async fn removes_event_activation_and_instance() {
        let fx = Fixture::new();
        provisioned(&fx).await;
        let mut events = fx.c.events.subscribe();

        let resp = fx
            .deprovisioner()
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap();
        assert!(resp.is_async);
        let op_id = resp.operation.unwrap();

        let event = next_event(&mut events).await;
        assert_eq!(event.kind, OperationKind::Remove);
        assert_eq!(event.state, OperationState::Succeeded);

        let op = OperationStore::get(&fx.store, INSTANCE_ID, &op_id).unwrap();
        assert_eq!(op.description.as_deref(), Some("deprovision succeeded"));
        assert!(InstanceStore::get(&fx.store, INSTANCE_ID).unwrap_err().is_not_found());
        assert!(fx.cluster.list_event_activations(NAMESPACE).await.is_empty());
    }

    #[tokio::test]
    async fn repeated_deprovision_is_idempotent() {
        let fx = Fixture::new();
        provisioned(&fx).await;
        let mut events = fx.c.events.subscribe();
        let deprovisioner = fx.deprovisioner();

        deprovisioner
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap();
        next_event(&mut events).await;

        let resp = deprovisioner
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap();
        assert_eq!(
            resp,
            DeprovisionResponse {
                is_async: false,
                operation: None
            }
        );
        assert_no_event(&mut events).await;
    }

    #[tokio::test]
    async fn in_flight_deprovision_returns_existing_operation() {
        let fx = Fixture::new();
        InstanceStore::insert(&fx.store, &instance(INSTANCE_ID, InstanceState::PendingDeletion))
            .unwrap();
        let op = InstanceOperation::pending(INSTANCE_ID, "op-remove", OperationKind::Remove, "");
        OperationStore::insert(&fx.store, &op).unwrap();

        let resp = fx
            .deprovisioner()
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap();
        assert!(resp.is_async);
        assert_eq!(resp.operation.as_deref(), Some("op-remove"));
        assert_eq!(OperationStore::get_all(&fx.store, INSTANCE_ID).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deprovision_during_provisioning_is_rejected() {
        let fx = Fixture::new();
        fx.register_service_instance().await;
        fx.checker.delay(Duration::from_secs(3600));
        let mut events = fx.c.events.subscribe();

        let create_op = fx
            .provisioner()
            .provision(&OsbContext::default(), provision_request())
            .unwrap()
            .operation
            .unwrap();

        let err = fx
            .deprovisioner()
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap_err();
        assert!(matches!(err, BrokerError::Concurrency(_)));
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.osb_code(), Some("ConcurrencyError"));

        let ops = OperationStore::get_all(&fx.store, INSTANCE_ID).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_id, create_op);
        assert_eq!(ops[0].kind, OperationKind::Create);
        assert_eq!(
            InstanceStore::get(&fx.store, INSTANCE_ID).unwrap().state,
            InstanceState::Pending
        );
        assert_no_event(&mut events).await;
    }

    #[tokio::test]
    async fn instance_id_can_be_reused_after_deprovision() {
        let fx = Fixture::new();
        provisioned(&fx).await;
        let mut events = fx.c.events.subscribe();
        let provisioner = fx.provisioner();
        let deprovisioner = fx.deprovisioner();

        deprovisioner
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap();
        assert_eq!(next_event(&mut events).await.state, OperationState::Succeeded);

        let resp = provisioner
            .provision(&OsbContext::default(), provision_request())
            .unwrap();
        assert!(resp.is_async);
        let event = next_event(&mut events).await;
        assert_eq!(event.kind, OperationKind::Create);
        assert_eq!(event.state, OperationState::Succeeded);
        assert_eq!(fx.cluster.list_event_activations(NAMESPACE).await.len(), 1);

        // Retrying the second provision is answered from the history.
        let retry = provisioner
            .provision(&OsbContext::default(), provision_request())
            .unwrap();
        assert!(!retry.is_async);
        assert_no_event(&mut events).await;
        assert_eq!(OperationStore::get_all(&fx.store, INSTANCE_ID).unwrap().len(), 3);

        let resp = deprovisioner
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap();
        assert!(resp.is_async);
        let event = next_event(&mut events).await;
        assert_eq!(event.kind, OperationKind::Remove);
        assert_eq!(event.state, OperationState::Succeeded);
        assert!(InstanceStore::get(&fx.store, INSTANCE_ID).unwrap_err().is_not_found());
        assert!(fx.cluster.list_event_activations(NAMESPACE).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_instance_is_gone() {
        let fx = Fixture::new();
        let err = fx
            .deprovisioner()
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap_err();
        assert_eq!(err.status_code(), 410);
    }

    #[tokio::test]
    async fn history_without_instance_is_gone() {
        let fx = Fixture::new();
        let mut op = InstanceOperation::pending(INSTANCE_ID, "op-1", OperationKind::Create, "");
        op.state = OperationState::Failed;
        OperationStore::insert(&fx.store, &op).unwrap();

        let err = fx
            .deprovisioner()
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap_err();
        assert!(matches!(err, BrokerError::Gone(_)));
    }

    #[tokio::test]
    async fn state_view_errors_abort() {
        let fx = Fixture::new();
        let mut c = fx.c.clone();
        c.instance_state = std::sync::Arc::new(FailingStateGetter);

        let err = Deprovisioner::new(c)
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("checking if instance is already deprovisioned"));
    }

    #[tokio::test]
    async fn event_activation_failure_fails_operation() {
        let fx = Fixture::new();
        provisioned(&fx).await;
        fx.cluster.fail_deletes_with("forbidden").await;
        let mut events = fx.c.events.subscribe();

        let op_id = fx
            .deprovisioner()
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap()
            .operation
            .unwrap();
        assert_eq!(next_event(&mut events).await.state, OperationState::Failed);

        let op = OperationStore::get(&fx.store, INSTANCE_ID, &op_id).unwrap();
        assert_eq!(
            op.description.as_deref(),
            Some("deprovisioning failed while removing EventActivation on error: forbidden")
        );
        assert_eq!(
            InstanceStore::get(&fx.store, INSTANCE_ID).unwrap().state,
            InstanceState::Failed
        );
    }

    #[tokio::test]
    async fn missing_event_activation_is_tolerated() {
        let fx = Fixture::new();
        provisioned(&fx).await;
        fx.cluster.delete(NAMESPACE, SERVICE_ID).await.unwrap();
        let mut events = fx.c.events.subscribe();

        fx.deprovisioner()
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap();
        assert_eq!(next_event(&mut events).await.state, OperationState::Succeeded);
    }

    #[tokio::test]
    async fn shared_event_activation_is_kept() {
        let fx = Fixture::new();
        provisioned(&fx).await;
        InstanceStore::insert(&fx.store, &instance("inst-2", InstanceState::Succeeded)).unwrap();
        let mut events = fx.c.events.subscribe();

        fx.deprovisioner()
            .deprovision(&OsbContext::default(), deprovision_request())
            .unwrap();
        assert_eq!(next_event(&mut events).await.state, OperationState::Succeeded);

        let remaining: Vec<EventActivation> = fx.cluster.list_event_activations(NAMESPACE).await;
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn requires_async() {
        let fx = Fixture::new();
        let mut req = deprovision_request();
        req.accepts_incomplete = false;
        let err = fx
            .deprovisioner()
            .deprovision(&OsbContext::default(), req)
            .unwrap_err();
        assert!(matches!(err, BrokerError::AsyncRequired));
    }
}
