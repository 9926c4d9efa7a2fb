//! Provisioning access decisions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use rebroker_catalog::RemoteEnvironmentFinder;
use rebroker_state::{Instance, InstanceState, InstanceStore};

use crate::error::AccessResult;
use crate::mapping::EnvironmentMappingLister;

/// Default pause between two EnvironmentMapping lookups.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of an access decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanProvisionOutput {
    pub allowed: bool,
    /// Why provisioning was denied; empty when allowed.
    pub reason: String,
}

impl CanProvisionOutput {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Decides whether an instance of a service may be provisioned into a namespace.
#[async_trait]
pub trait ProvisionChecker: Send + Sync {
    /// Decide, waiting at most `max_wait` for eventually consistent inputs.
    async fn can_provision(
        &self,
        instance_id: &str,
        service_id: &str,
        namespace: &str,
        max_wait: Duration,
    ) -> AccessResult<CanProvisionOutput>;
}

/// Allows provisioning once the owning remote environment is enabled in the
/// namespace, and keeps events services to one live instance per namespace.
pub struct NamespaceAccessChecker {
    finder: Arc<dyn RemoteEnvironmentFinder>,
    mappings: Arc<dyn EnvironmentMappingLister>,
    instances: Arc<dyn InstanceStore>,
    poll_interval: Duration,
}

impl NamespaceAccessChecker {
    pub fn new(
        finder: Arc<dyn RemoteEnvironmentFinder>,
        mappings: Arc<dyn EnvironmentMappingLister>,
        instances: Arc<dyn InstanceStore>,
    ) -> Self {
        Self {
            finder,
            mappings,
            instances,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Poll until the mapping exists or `max_wait` has elapsed.
    async fn wait_for_mapping(
        &self,
        environment: &str,
        namespace: &str,
        max_wait: Duration,
    ) -> AccessResult<bool> {
        let deadline = Instant::now() + max_wait;
        loop {
            if self.mappings.exists(environment, namespace)? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            debug!(%environment, %namespace, "environment mapping not present yet, waiting");
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl ProvisionChecker for NamespaceAccessChecker {
    async fn can_provision(
        &self,
        instance_id: &str,
        service_id: &str,
        namespace: &str,
        max_wait: Duration,
    ) -> AccessResult<CanProvisionOutput> {
        let Some(re) = self.finder.find_one_by_service_id(service_id)? else {
            return Ok(CanProvisionOutput::denied(format!(
                "remote environment with service id [{service_id}] not found"
            )));
        };

        if !self.wait_for_mapping(&re.name, namespace, max_wait).await? {
            info!(remote_environment = %re.name, %namespace, "remote environment not enabled in namespace");
            return Ok(CanProvisionOutput::denied(format!(
                "EnvironmentMapping for remote environment [{}] does not exist in the namespace [{namespace}]",
                re.name
            )));
        }

        let provides_events = re
            .service(service_id)
            .is_some_and(|svc| svc.provides_events());
        if provides_events {
            // Pending siblings are ordered by id so that of two first
            // provisions racing each other exactly one is admitted.
            let other = self.instances.find_one(&|i: &Instance| {
                i.id != instance_id
                    && i.service_id == service_id
                    && i.namespace == namespace
                    && match i.state {
                        InstanceState::Failed => false,
                        InstanceState::Pending => i.id.as_str() < instance_id,
                        InstanceState::Succeeded | InstanceState::PendingDeletion => true,
                    }
            })?;
            if let Some(other) = other {
                return Ok(CanProvisionOutput::denied(format!(
                    "instance [{}] of service [{service_id}] already exists in the namespace [{namespace}]",
                    other.id
                )));
            }
        }

        Ok(CanProvisionOutput::allowed())
    }
}
