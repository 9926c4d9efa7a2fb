//! Domain types for the broker state store.
//!
//! An [`Instance`] is one provisioned occurrence of a catalog service in a
//! namespace; an [`InstanceOperation`] tracks a single asynchronous provision
//! or deprovision attempt against it. Both are serializable to/from JSON for
//! storage in redb tables.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a service instance, chosen by the OSB platform.
pub type InstanceId = String;

/// Globally unique identifier of an operation, handed out by the broker.
pub type OperationId = String;

/// Identifier of a catalog service (remote environment service).
pub type ServiceId = String;

/// Identifier of a catalog service plan.
pub type ServicePlanId = String;

/// Kubernetes-style namespace name.
pub type Namespace = String;

// ── Instance ──────────────────────────────────────────────────────

/// A provisioned service instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    pub id: InstanceId,
    pub service_id: ServiceId,
    pub service_plan_id: ServicePlanId,
    pub namespace: Namespace,
    pub state: InstanceState,
    /// Hex digest of the provisioning parameters, used to detect conflicting retries.
    pub params_hash: String,
}

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Succeeded,
    Failed,
    PendingDeletion,
}

// ── Operation ─────────────────────────────────────────────────────

/// Record of one asynchronous operation on an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceOperation {
    pub instance_id: InstanceId,
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub state: OperationState,
    pub description: Option<String>,
    pub params_hash: String,
    /// Insertion sequence assigned by the store; ignored on insert.
    #[serde(default)]
    pub seq: u64,
}

/// What an operation does to its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Remove,
}

/// Progress of an operation. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Pending,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationState::Pending)
    }
}

impl InstanceOperation {
    /// A fresh, pending operation.
    pub fn pending(
        instance_id: &str,
        operation_id: &str,
        kind: OperationKind,
        params_hash: &str,
    ) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            operation_id: operation_id.to_string(),
            kind,
            state: OperationState::Pending,
            description: None,
            params_hash: params_hash.to_string(),
            seq: 0,
        }
    }
}
