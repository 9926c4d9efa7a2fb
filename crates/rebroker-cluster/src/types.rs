//! Cluster resource shapes, reduced to the fields the broker reads or writes.

use serde::{Deserialize, Serialize};

/// A platform service instance; `external_id` is the OSB instance id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInstance {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub external_id: String,
}

/// Points a dependent resource at the object that owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl OwnerReference {
    pub fn for_service_instance(si: &ServiceInstance) -> Self {
        Self {
            api_version: "servicecatalog.k8s.io/v1beta1".to_string(),
            kind: "ServiceInstance".to_string(),
            name: si.name.clone(),
            uid: si.uid.clone(),
        }
    }
}

/// Enables event delivery from a remote environment into a namespace.
///
/// Named after the service id it activates; one per service and namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventActivation {
    pub name: String,
    pub namespace: String,
    pub display_name: String,
    /// Name of the remote environment emitting the events.
    pub source_id: String,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}
