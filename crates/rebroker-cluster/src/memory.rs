//! In-process cluster used by the standalone daemon and by tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::{EventActivationClient, ServiceInstanceGetter};
use crate::error::{ClusterError, ClusterResult};
use crate::types::{EventActivation, ServiceInstance};

/// (namespace, name)
type ObjectKey = (String, String);

#[derive(Default)]
struct Inner {
    service_instances: BTreeMap<ObjectKey, ServiceInstance>,
    event_activations: BTreeMap<ObjectKey, EventActivation>,
    create_failure: Option<String>,
    delete_failure: Option<String>,
}

/// Cluster stand-in holding service instances and EventActivations in memory.
///
/// Cloning shares the underlying objects.
#[derive(Clone, Default)]
pub struct InMemoryCluster {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a platform service instance for `external_id` (an OSB instance id).
    pub async fn register_service_instance(
        &self,
        namespace: &str,
        name: &str,
        external_id: &str,
    ) -> ServiceInstance {
        let si = ServiceInstance {
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: uuid::Uuid::new_v4().to_string(),
            external_id: external_id.to_string(),
        };
        let mut inner = self.inner.write().await;
        inner
            .service_instances
            .insert((namespace.to_string(), name.to_string()), si.clone());
        debug!(%namespace, %name, %external_id, "service instance registered");
        si
    }

    /// EventActivations of a namespace, ordered by name.
    pub async fn list_event_activations(&self, namespace: &str) -> Vec<EventActivation> {
        let inner = self.inner.read().await;
        inner
            .event_activations
            .values()
            .filter(|ea| ea.namespace == namespace)
            .cloned()
            .collect()
    }

    /// Make every subsequent EventActivation create fail with `msg`.
    pub async fn fail_creates_with(&self, msg: &str) {
        self.inner.write().await.create_failure = Some(msg.to_string());
    }

    /// Make every subsequent EventActivation delete fail with `msg`.
    pub async fn fail_deletes_with(&self, msg: &str) {
        self.inner.write().await.delete_failure = Some(msg.to_string());
    }
}

#[async_trait]
impl ServiceInstanceGetter for InMemoryCluster {
    async fn get_by_namespace_and_external_id(
        &self,
        namespace: &str,
        external_id: &str,
    ) -> ClusterResult<ServiceInstance> {
        let inner = self.inner.read().await;
        inner
            .service_instances
            .values()
            .find(|si| si.namespace == namespace && si.external_id == external_id)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                resource: "serviceinstances",
                name: external_id.to_string(),
            })
    }
}

#[async_trait]
impl EventActivationClient for InMemoryCluster {
    async fn create(&self, activation: EventActivation) -> ClusterResult<EventActivation> {
        let mut inner = self.inner.write().await;
        if let Some(msg) = &inner.create_failure {
            return Err(ClusterError::Backend(msg.clone()));
        }
        let key = (activation.namespace.clone(), activation.name.clone());
        if inner.event_activations.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                resource: "eventactivations",
                name: activation.name,
            });
        }
        inner.event_activations.insert(key, activation.clone());
        debug!(namespace = %activation.namespace, name = %activation.name, "event activation created");
        Ok(activation)
    }

    async fn get(&self, namespace: &str, name: &str) -> ClusterResult<EventActivation> {
        let inner = self.inner.read().await;
        inner
            .event_activations
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                resource: "eventactivations",
                name: name.to_string(),
            })
    }

    async fn update(&self, activation: EventActivation) -> ClusterResult<EventActivation> {
        let mut inner = self.inner.write().await;
        let key = (activation.namespace.clone(), activation.name.clone());
        match inner.event_activations.get_mut(&key) {
            Some(existing) => {
                *existing = activation.clone();
                Ok(activation)
            }
            None => Err(ClusterError::NotFound {
                resource: "eventactivations",
                name: activation.name,
            }),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(msg) = &inner.delete_failure {
            return Err(ClusterError::Backend(msg.clone()));
        }
        inner
            .event_activations
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| debug!(%namespace, %name, "event activation deleted"))
            .ok_or_else(|| ClusterError::NotFound {
                resource: "eventactivations",
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OwnerReference;

    fn activation(ns: &str, name: &str) -> EventActivation {
        EventActivation {
            name: name.to_string(),
            namespace: ns.to_string(),
            display_name: "Orders events".to_string(),
            source_id: "ec-prod".to_string(),
            owner_references: vec![],
        }
    }

    #[tokio::test]
    async fn finds_service_instance_by_external_id() {
        let cluster = InMemoryCluster::new();
        let si = cluster
            .register_service_instance("production", "orders-si", "inst-1")
            .await;

        let found = cluster
            .get_by_namespace_and_external_id("production", "inst-1")
            .await
            .unwrap();
        assert_eq!(found, si);

        let err = cluster
            .get_by_namespace_and_external_id("stage", "inst-1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "serviceinstances \"inst-1\" not found");
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let cluster = InMemoryCluster::new();
        cluster.create(activation("production", "orders")).await.unwrap();

        let err = cluster
            .create(activation("production", "orders"))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());

        // Same name in another namespace is fine.
        cluster.create(activation("stage", "orders")).await.unwrap();
        assert_eq!(cluster.list_event_activations("production").await.len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_owner_references() {
        let cluster = InMemoryCluster::new();
        let si = cluster
            .register_service_instance("production", "orders-si", "inst-1")
            .await;
        cluster.create(activation("production", "orders")).await.unwrap();

        let mut ea = cluster.get("production", "orders").await.unwrap();
        ea.owner_references = vec![OwnerReference::for_service_instance(&si)];
        cluster.update(ea).await.unwrap();

        let stored = cluster.get("production", "orders").await.unwrap();
        assert_eq!(stored.owner_references[0].uid, si.uid);
    }

    #[tokio::test]
    async fn delete_reports_missing() {
        let cluster = InMemoryCluster::new();
        cluster.create(activation("production", "orders")).await.unwrap();

        cluster.delete("production", "orders").await.unwrap();
        assert!(cluster.delete("production", "orders").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn injected_failures_surface_verbatim() {
        let cluster = InMemoryCluster::new();
        cluster.fail_creates_with("etcd unavailable").await;
        cluster.fail_deletes_with("forbidden").await;

        let err = cluster.create(activation("production", "orders")).await.unwrap_err();
        assert_eq!(err.to_string(), "etcd unavailable");
        let err = cluster.delete("production", "orders").await.unwrap_err();
        assert_eq!(err.to_string(), "forbidden");
        assert!(cluster.list_event_activations("production").await.is_empty());
    }
}
