//! Remote environment model.
//!
//! A remote environment is an external system connected to the cluster; each
//! of its services becomes one entry in the OSB catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An external system whose capabilities are exposed as catalog services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteEnvironment {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Label applied to namespaces the environment is enabled in.
    #[serde(default)]
    pub access_label: String,
    pub source: Source,
    #[serde(default)]
    pub services: Vec<Service>,
}

/// Where a remote environment comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Source {
    pub environment: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub namespace: String,
}

/// One capability of a remote environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub provider_display_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub api_entry: Option<ApiEntry>,
    pub event_entry: Option<EventEntry>,
}

/// API access to the remote system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiEntry {
    pub gateway_url: String,
    #[serde(default)]
    pub access_label: String,
    #[serde(default)]
    pub target_url: String,
}

/// Marks a service as an event source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventEntry {
    #[serde(default)]
    pub description: String,
}

impl Service {
    /// Bindable services expose an API; events-only services are not bindable.
    pub fn is_bindable(&self) -> bool {
        self.api_entry.is_some()
    }

    pub fn provides_events(&self) -> bool {
        self.event_entry.is_some()
    }
}

impl RemoteEnvironment {
    /// The service with the given id, if this environment owns it.
    pub fn service(&self, service_id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == service_id)
    }
}
