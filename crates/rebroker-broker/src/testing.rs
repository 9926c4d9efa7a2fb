//! Test doubles and fixtures shared by the engine's unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;

use rebroker_access::{AccessResult, CanProvisionOutput, ProvisionChecker};
use rebroker_catalog::{EventEntry, RemoteEnvironment, RemoteEnvironmentRegistry, Service, Source};
use rebroker_cluster::{InMemoryCluster, ServiceInstance};
use rebroker_state::{
    Instance, InstanceOperation, InstanceState, OperationId, OperationState, OperationStore,
    StateError, StateResult, StateStore,
};

use crate::broker::Collaborators;
use crate::config::BrokerConfig;
use crate::deprovision::Deprovisioner;
use crate::error::StateViewError;
use crate::events::OperationEvent;
use crate::osb::{DeprovisionRequest, ProvisionRequest};
use crate::provision::Provisioner;
use crate::state::InstanceStateGetter;

pub const INSTANCE_ID: &str = "inst-1";
pub const SERVICE_ID: &str = "orders-events";
pub const NAMESPACE: &str = "production";
pub const ENVIRONMENT: &str = "ec-prod";

/// Scripted access decisions.
pub struct StubChecker {
    response: Mutex<Option<AccessResult<CanProvisionOutput>>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<(String, Duration)>>,
}

impl StubChecker {
    /// Allows everything until told otherwise.
    pub fn new() -> Self {
        Self {
            response: Mutex::new(None),
            delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer the next decision with `response`; later ones are allowed.
    pub fn respond(&self, response: AccessResult<CanProvisionOutput>) {
        *self.response.lock().unwrap() = Some(response);
    }

    /// Wait this long before answering.
    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// `(instance id, max wait)` of every decision asked for so far.
    pub fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProvisionChecker for StubChecker {
    async fn can_provision(
        &self,
        instance_id: &str,
        _service_id: &str,
        _namespace: &str,
        max_wait: Duration,
    ) -> AccessResult<CanProvisionOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((instance_id.to_string(), max_wait));
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.response.lock().unwrap().take();
        response.unwrap_or_else(|| Ok(CanProvisionOutput::allowed()))
    }
}

/// Every state view fails with a storage error.
pub struct FailingStateGetter;

impl FailingStateGetter {
    fn err() -> StateViewError {
        StateViewError::Storage(StateError::Read("fix-storage-error".to_string()))
    }
}

impl InstanceStateGetter for FailingStateGetter {
    fn is_provisioned(&self, _: &str) -> Result<bool, StateViewError> {
        Err(Self::err())
    }

    fn is_provisioning_in_progress(&self, _: &str) -> Result<Option<OperationId>, StateViewError> {
        Err(Self::err())
    }

    fn is_deprovisioned(&self, _: &str) -> Result<bool, StateViewError> {
        Err(Self::err())
    }

    fn is_deprovisioning_in_progress(
        &self,
        _: &str,
    ) -> Result<Option<OperationId>, StateViewError> {
        Err(Self::err())
    }
}

/// Operation store whose every call fails with a read error.
pub struct FailingOperationStore {
    msg: String,
}

impl FailingOperationStore {
    pub fn new(msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
        }
    }

    fn err(&self) -> StateError {
        StateError::Read(self.msg.clone())
    }
}

impl OperationStore for FailingOperationStore {
    fn insert(&self, _: &InstanceOperation) -> StateResult<()> {
        Err(self.err())
    }

    fn get(&self, _: &str, _: &str) -> StateResult<InstanceOperation> {
        Err(self.err())
    }

    fn get_all(&self, _: &str) -> StateResult<Vec<InstanceOperation>> {
        Err(self.err())
    }

    fn update_state(&self, _: &str, _: &str, _: OperationState) -> StateResult<()> {
        Err(self.err())
    }

    fn update_state_desc(
        &self,
        _: &str,
        _: &str,
        _: OperationState,
        _: Option<&str>,
    ) -> StateResult<()> {
        Err(self.err())
    }

    fn remove(&self, _: &str, _: &str) -> StateResult<()> {
        Err(self.err())
    }
}

/// A remote environment with one events service, [`SERVICE_ID`].
pub fn sample_environment() -> RemoteEnvironment {
    RemoteEnvironment {
        name: ENVIRONMENT.to_string(),
        description: "EC production".to_string(),
        access_label: ENVIRONMENT.to_string(),
        source: Source {
            environment: "prod".to_string(),
            kind: "commerce".to_string(),
            namespace: "com.example".to_string(),
        },
        services: vec![Service {
            id: SERVICE_ID.to_string(),
            display_name: "Orders events".to_string(),
            long_description: String::new(),
            provider_display_name: "Example".to_string(),
            tags: vec![],
            labels: Default::default(),
            api_entry: None,
            event_entry: Some(EventEntry::default()),
        }],
    }
}

pub struct Fixture {
    pub store: StateStore,
    pub cluster: InMemoryCluster,
    pub checker: Arc<StubChecker>,
    pub c: Collaborators,
}

impl Fixture {
    pub fn new() -> Self {
        let store = StateStore::open_in_memory().unwrap();
        let cluster = InMemoryCluster::new();
        let checker = Arc::new(StubChecker::new());
        let c = Collaborators::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(RemoteEnvironmentRegistry::with_environments([sample_environment()])),
            checker.clone(),
            Arc::new(cluster.clone()),
            Arc::new(cluster.clone()),
            BrokerConfig {
                max_wait: Duration::from_secs(5),
            },
        );
        Self {
            store,
            cluster,
            checker,
            c,
        }
    }

    pub fn provisioner(&self) -> Provisioner {
        Provisioner::new(self.c.clone())
    }

    pub fn deprovisioner(&self) -> Deprovisioner {
        Deprovisioner::new(self.c.clone())
    }

    /// The platform-side service instance for [`INSTANCE_ID`].
    pub async fn register_service_instance(&self) -> ServiceInstance {
        self.cluster
            .register_service_instance(NAMESPACE, "orders-events-si", INSTANCE_ID)
            .await
    }
}

pub fn json_map(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn provision_request() -> ProvisionRequest {
    ProvisionRequest {
        instance_id: INSTANCE_ID.to_string(),
        service_id: SERVICE_ID.to_string(),
        plan_id: format!("{SERVICE_ID}-plan"),
        parameters: json_map(json!({"tier": "gold", "size": 3})),
        context: json_map(json!({"platform": "kubernetes", "namespace": NAMESPACE})),
        accepts_incomplete: true,
    }
}

pub fn deprovision_request() -> DeprovisionRequest {
    DeprovisionRequest {
        instance_id: INSTANCE_ID.to_string(),
        service_id: SERVICE_ID.to_string(),
        plan_id: format!("{SERVICE_ID}-plan"),
        accepts_incomplete: true,
    }
}

pub fn instance(id: &str, state: InstanceState) -> Instance {
    Instance {
        id: id.to_string(),
        service_id: SERVICE_ID.to_string(),
        service_plan_id: format!("{SERVICE_ID}-plan"),
        namespace: NAMESPACE.to_string(),
        state,
        params_hash: String::new(),
    }
}

/// Wait for the next completion event, failing the test after a few seconds.
pub async fn next_event(rx: &mut broadcast::Receiver<OperationEvent>) -> OperationEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("async processing not finished")
        .expect("event bus closed")
}

/// Give spawned work a chance to run, then check nothing completed.
pub async fn assert_no_event(rx: &mut broadcast::Receiver<OperationEvent>) {
    let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(got.is_err(), "unexpected completion event: {got:?}");
}
