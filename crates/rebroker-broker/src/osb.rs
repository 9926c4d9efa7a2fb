//! OSB request and response shapes seen by the engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rebroker_state::{InstanceId, OperationId, ServiceId, ServicePlanId};

/// Platform headers accompanying every OSB call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsbContext {
    /// `X-Broker-API-Version`.
    pub api_version: String,
    /// `X-Broker-API-Originating-Identity`, when the platform sends it.
    pub originating_identity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionRequest {
    pub instance_id: InstanceId,
    pub service_id: ServiceId,
    pub plan_id: ServicePlanId,
    pub parameters: Map<String, Value>,
    /// Platform context; carries the target `namespace`.
    pub context: Map<String, Value>,
    pub accepts_incomplete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionResponse {
    /// Whether the work continues in the background (HTTP 202).
    #[serde(skip)]
    pub is_async: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprovisionRequest {
    pub instance_id: InstanceId,
    pub service_id: ServiceId,
    pub plan_id: ServicePlanId,
    pub accepts_incomplete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprovisionResponse {
    #[serde(skip)]
    pub is_async: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastOperationRequest {
    pub instance_id: InstanceId,
    /// Operation key returned by provision or deprovision; latest when absent.
    pub operation: Option<OperationId>,
}

/// OSB last-operation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastOperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperationResponse {
    pub state: LastOperationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
