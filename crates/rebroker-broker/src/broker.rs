//! Engine wiring.

use std::sync::Arc;

use rebroker_access::ProvisionChecker;
use rebroker_catalog::{CatalogService, RemoteEnvironmentFinder};
use rebroker_cluster::{EventActivationClient, ServiceInstanceGetter};
use rebroker_state::{InstanceStore, OperationId, OperationStore};

use crate::config::BrokerConfig;
use crate::deprovision::Deprovisioner;
use crate::events::OperationEvents;
use crate::last_operation::LastOperationService;
use crate::locks::InstanceLocks;
use crate::provision::Provisioner;
use crate::state::{InstanceStateGetter, InstanceStateService};

/// Hands out a fresh operation id per accepted request.
pub type OperationIdProvider = Arc<dyn Fn() -> anyhow::Result<OperationId> + Send + Sync>;

/// Random UUID v4 operation ids.
pub fn uuid_operation_ids() -> OperationIdProvider {
    Arc::new(|| Ok(uuid::Uuid::new_v4().to_string()))
}

/// Everything the provisioner and deprovisioner talk to.
///
/// Cloning is cheap; background jobs own a clone.
#[derive(Clone)]
pub struct Collaborators {
    pub instances: Arc<dyn InstanceStore>,
    pub operations: Arc<dyn OperationStore>,
    pub instance_state: Arc<dyn InstanceStateGetter>,
    pub finder: Arc<dyn RemoteEnvironmentFinder>,
    pub access: Arc<dyn ProvisionChecker>,
    pub service_instances: Arc<dyn ServiceInstanceGetter>,
    pub event_activations: Arc<dyn EventActivationClient>,
    pub operation_ids: OperationIdProvider,
    pub locks: InstanceLocks,
    pub events: OperationEvents,
    pub config: BrokerConfig,
}

impl Collaborators {
    /// Standard wiring: state views over `operations`, UUID operation ids,
    /// fresh leases and event bus.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instances: Arc<dyn InstanceStore>,
        operations: Arc<dyn OperationStore>,
        finder: Arc<dyn RemoteEnvironmentFinder>,
        access: Arc<dyn ProvisionChecker>,
        service_instances: Arc<dyn ServiceInstanceGetter>,
        event_activations: Arc<dyn EventActivationClient>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            instance_state: Arc::new(InstanceStateService::new(operations.clone())),
            instances,
            operations,
            finder,
            access,
            service_instances,
            event_activations,
            operation_ids: uuid_operation_ids(),
            locks: InstanceLocks::new(),
            events: OperationEvents::new(),
            config,
        }
    }
}

/// The OSB surface of the broker.
#[derive(Clone)]
pub struct Broker {
    pub catalog: CatalogService,
    pub provisioner: Provisioner,
    pub deprovisioner: Deprovisioner,
    pub last_operation: LastOperationService,
    events: OperationEvents,
}

impl Broker {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            catalog: CatalogService::new(collaborators.finder.clone()),
            last_operation: LastOperationService::new(collaborators.operations.clone()),
            events: collaborators.events.clone(),
            deprovisioner: Deprovisioner::new(collaborators.clone()),
            provisioner: Provisioner::new(collaborators),
        }
    }

    /// Completion events of every background job started by this broker.
    pub fn events(&self) -> &OperationEvents {
        &self.events
    }
}
