//! Provisioning state machine.
//!
//! ```text
//! NotProvisioned ──provision──▶ Pending ──job──▶ Succeeded
//!                                         └────▶ Failed
//! ```
//!
//! `Pending` is entered synchronously under the instance lease; the terminal
//! states are written by a background job running on its own task.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use rebroker_cluster::{ClusterError, EventActivation, OwnerReference, ServiceInstance};
use rebroker_state::{
    Instance, InstanceId, InstanceOperation, InstanceState, Namespace, OperationId, OperationKind,
    OperationState, ServiceId,
};

use crate::broker::Collaborators;
use crate::error::{BrokerError, BrokerResult};
use crate::events::OperationEvent;
use crate::osb::{OsbContext, ProvisionRequest, ProvisionResponse};
use crate::params::params_hash;

pub const PROVISIONING_SUCCEEDED: &str = "provisioning succeeded";

/// Answers OSB provision requests.
#[derive(Clone)]
pub struct Provisioner {
    c: Collaborators,
}

impl Provisioner {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { c: collaborators }
    }

    /// Accept a provision request.
    ///
    /// Returns `is_async: false` for an instance that is already provisioned
    /// with the same parameters, the in-flight operation for a retried
    /// request, and otherwise a new operation whose work continues in the
    /// background. Must be called within a tokio runtime.
    pub fn provision(
        &self,
        ctx: &OsbContext,
        req: ProvisionRequest,
    ) -> BrokerResult<ProvisionResponse> {
        if !req.accepts_incomplete {
            return Err(BrokerError::AsyncRequired);
        }
        let namespace = namespace_from_context(&req)?;
        let hash = params_hash(&req.parameters);

        debug!(
            instance_id = %req.instance_id,
            service_id = %req.service_id,
            %namespace,
            api_version = %ctx.api_version,
            originating_identity = ctx.originating_identity.as_deref().unwrap_or(""),
            "provision requested"
        );

        let (resp, job) = self.c.locks.with_lock(&req.instance_id, || {
            self.accept(&req, namespace, hash)
        })?;

        if let Some(job) = job {
            tokio::spawn(job.run());
        }
        Ok(resp)
    }

    fn accept(
        &self,
        req: &ProvisionRequest,
        namespace: Namespace,
        hash: String,
    ) -> BrokerResult<(ProvisionResponse, Option<ProvisionJob>)> {
        let iid = req.instance_id.as_str();

        let provisioned = self.c.instance_state.is_provisioned(iid).map_err(|e| {
            BrokerError::Internal(format!(
                "while checking if instance is already provisioned: {e}"
            ))
        })?;
        if provisioned {
            self.compare_params(req, &hash)?;
            info!(instance_id = %iid, "instance already provisioned");
            return Ok((
                ProvisionResponse {
                    is_async: false,
                    operation: None,
                },
                None,
            ));
        }

        let in_progress = self
            .c
            .instance_state
            .is_provisioning_in_progress(iid)
            .map_err(|e| {
                BrokerError::Internal(format!(
                    "while checking if instance is being provisioned: {e}"
                ))
            })?;
        if let Some(operation_id) = in_progress {
            self.compare_params(req, &hash)?;
            info!(instance_id = %iid, operation_id = %operation_id, "provisioning already in progress");
            return Ok((
                ProvisionResponse {
                    is_async: true,
                    operation: Some(operation_id),
                },
                None,
            ));
        }

        let operation_id = (self.c.operation_ids)().map_err(|e| {
            BrokerError::Internal(format!("while generating ID for operation: {e}"))
        })?;

        let op = InstanceOperation::pending(iid, &operation_id, OperationKind::Create, &hash);
        self.c.operations.insert(&op).map_err(|e| {
            BrokerError::Internal(format!(
                "while inserting instance operation to storage: {e}"
            ))
        })?;

        // A failure from here on leaves the pending operation behind.
        let instance = Instance {
            id: iid.to_string(),
            service_id: req.service_id.clone(),
            service_plan_id: req.plan_id.clone(),
            namespace: namespace.clone(),
            state: InstanceState::Pending,
            params_hash: hash,
        };
        self.c.instances.insert(&instance).map_err(|e| {
            BrokerError::Internal(format!("while inserting instance to storage: {e}"))
        })?;

        let re = self
            .c
            .finder
            .find_one_by_service_id(&req.service_id)
            .map_err(|e| {
                BrokerError::Internal(format!(
                    "while getting remote environment with service id: {}: {e}",
                    req.service_id
                ))
            })?
            .ok_or_else(|| {
                BrokerError::BadRequest(format!(
                    "remote environment with service id: {} not found",
                    req.service_id
                ))
            })?;
        let display_name = re
            .service(&req.service_id)
            .map(|svc| svc.display_name.clone())
            .unwrap_or_default();

        info!(instance_id = %iid, operation_id = %operation_id, remote_environment = %re.name, "provisioning accepted");

        let job = ProvisionJob {
            instance_id: iid.to_string(),
            operation_id: operation_id.clone(),
            service_id: req.service_id.clone(),
            namespace,
            environment_name: re.name,
            display_name,
            max_wait: self.c.config.max_wait,
            c: self.c.clone(),
        };
        Ok((
            ProvisionResponse {
                is_async: true,
                operation: Some(operation_id),
            },
            Some(job),
        ))
    }

    /// Conflict when a stored instance was provisioned with other parameters.
    fn compare_params(&self, req: &ProvisionRequest, hash: &str) -> BrokerResult<()> {
        let stored = match self.c.instances.get(&req.instance_id) {
            Ok(instance) => instance,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => {
                return Err(BrokerError::Internal(format!(
                    "while getting instance {} from storage: {e}",
                    req.instance_id
                )));
            }
        };
        if stored.params_hash != hash {
            return Err(BrokerError::Conflict(format!(
                "while comparing provisioning parameters: provisioning parameters hash differs - new {hash}, old {}, for instance {}",
                stored.params_hash, req.instance_id
            )));
        }
        Ok(())
    }
}

fn namespace_from_context(req: &ProvisionRequest) -> BrokerResult<Namespace> {
    match req.context.get("namespace").and_then(|v| v.as_str()) {
        Some(ns) if !ns.is_empty() => Ok(ns.to_string()),
        _ => Err(BrokerError::BadRequest(
            "while getting namespace from context: namespace not found".to_string(),
        )),
    }
}

#[derive(Debug, Error)]
enum ActivationError {
    #[error("while getting service instance with external id: \"{instance_id}\" in namespace: \"{namespace}\": {source}")]
    ServiceInstance {
        instance_id: String,
        namespace: String,
        source: ClusterError,
    },

    #[error("while creating EventActivation with name: \"{name}\" in namespace: \"{namespace}\": {source}")]
    Create {
        name: String,
        namespace: String,
        source: ClusterError,
    },

    #[error("while ensuring update on EventActivation: while getting EventActivation with name: \"{name}\" from namespace: \"{namespace}\": {source}")]
    Get {
        name: String,
        namespace: String,
        source: ClusterError,
    },

    #[error("while ensuring update on EventActivation: while updating EventActivation with name: \"{name}\" in namespace: \"{namespace}\": {source}")]
    Update {
        name: String,
        namespace: String,
        source: ClusterError,
    },
}

/// Background half of a provision; owns everything it needs.
pub(crate) struct ProvisionJob {
    instance_id: InstanceId,
    operation_id: OperationId,
    service_id: ServiceId,
    namespace: Namespace,
    environment_name: String,
    display_name: String,
    max_wait: Duration,
    c: Collaborators,
}

impl ProvisionJob {
    pub(crate) async fn run(self) {
        let (state, description) = match self.execute().await {
            Ok(()) => (OperationState::Succeeded, PROVISIONING_SUCCEEDED.to_string()),
            Err(description) => (OperationState::Failed, description),
        };
        self.finish(state, &description);
    }

    /// Ok, or the failure description to record.
    async fn execute(&self) -> Result<(), String> {
        let decision = self
            .c
            .access
            .can_provision(
                &self.instance_id,
                &self.service_id,
                &self.namespace,
                self.max_wait,
            )
            .await
            .map_err(|e| format!("provisioning failed on error: {e}"))?;
        debug!(
            instance_id = %self.instance_id,
            allowed = decision.allowed,
            reason = %decision.reason,
            "access decision"
        );
        if !decision.allowed {
            return Err(format!(
                "Forbidden provisioning instance [{}] for remote environment [id: {}] in namespace: [{}]. Reason: [{}]",
                self.instance_id, self.service_id, self.namespace, decision.reason
            ));
        }

        self.ensure_event_activation().await.map_err(|e| {
            format!("provisioning failed while creating EventActivation on error: {e}")
        })
    }

    async fn ensure_event_activation(&self) -> Result<(), ActivationError> {
        let si = self
            .c
            .service_instances
            .get_by_namespace_and_external_id(&self.namespace, &self.instance_id)
            .await
            .map_err(|source| ActivationError::ServiceInstance {
                instance_id: self.instance_id.clone(),
                namespace: self.namespace.clone(),
                source,
            })?;

        let activation = EventActivation {
            name: self.service_id.clone(),
            namespace: self.namespace.clone(),
            display_name: self.display_name.clone(),
            source_id: self.environment_name.clone(),
            owner_references: vec![OwnerReference::for_service_instance(&si)],
        };
        match self.c.event_activations.create(activation).await {
            Ok(_) => {
                info!(name = %self.service_id, namespace = %self.namespace, "EventActivation created");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                self.adopt_event_activation(&si).await?;
                info!(name = %self.service_id, namespace = %self.namespace, "EventActivation updated");
                Ok(())
            }
            Err(source) => Err(ActivationError::Create {
                name: self.service_id.clone(),
                namespace: self.namespace.clone(),
                source,
            }),
        }
    }

    /// Point an existing activation at this service instance.
    async fn adopt_event_activation(&self, si: &ServiceInstance) -> Result<(), ActivationError> {
        let mut activation = self
            .c
            .event_activations
            .get(&self.namespace, &self.service_id)
            .await
            .map_err(|source| ActivationError::Get {
                name: self.service_id.clone(),
                namespace: self.namespace.clone(),
                source,
            })?;
        activation.owner_references = vec![OwnerReference::for_service_instance(si)];
        self.c
            .event_activations
            .update(activation)
            .await
            .map_err(|source| ActivationError::Update {
                name: self.service_id.clone(),
                namespace: self.namespace.clone(),
                source,
            })?;
        Ok(())
    }

    fn finish(&self, state: OperationState, description: &str) {
        let instance_state = match state {
            OperationState::Succeeded => InstanceState::Succeeded,
            _ => InstanceState::Failed,
        };
        if let Err(e) = self.c.instances.update_state(&self.instance_id, instance_state) {
            error!(instance_id = %self.instance_id, error = %e, "cannot update state of the stored instance");
        }
        if let Err(e) = self.c.operations.update_state_desc(
            &self.instance_id,
            &self.operation_id,
            state,
            Some(description),
        ) {
            error!(instance_id = %self.instance_id, operation_id = %self.operation_id, error = %e, "cannot update operation state");
        }

        match state {
            OperationState::Succeeded => {
                info!(instance_id = %self.instance_id, operation_id = %self.operation_id, "provisioning succeeded")
            }
            _ => {
                warn!(instance_id = %self.instance_id, operation_id = %self.operation_id, %description, "provisioning failed")
            }
        }

        self.c.events.publish(OperationEvent {
            instance_id: self.instance_id.clone(),
            operation_id: self.operation_id.clone(),
            kind: OperationKind::Create,
            state,
        });
    }
}
