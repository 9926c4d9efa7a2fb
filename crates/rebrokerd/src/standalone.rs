//! Standalone wiring: every collaborator in one process.

use std::sync::Arc;

use axum::Router;
use tracing::info;

use rebroker_access::{MappingRegistry, NamespaceAccessChecker};
use rebroker_api::ApiState;
use rebroker_broker::{Broker, Collaborators};
use rebroker_catalog::RemoteEnvironmentRegistry;
use rebroker_cluster::InMemoryCluster;
use rebroker_state::StateStore;

use crate::config::BrokerFileConfig;

/// A fully wired broker and the router serving it.
pub struct Assembled {
    pub router: Router,
    pub broker: Broker,
    pub cluster: InMemoryCluster,
    pub registry: Arc<RemoteEnvironmentRegistry>,
    pub mappings: Arc<MappingRegistry>,
}

/// Build the broker over `store` from the file configuration.
pub fn assemble(config: &BrokerFileConfig, store: StateStore) -> anyhow::Result<Assembled> {
    let registry = Arc::new(RemoteEnvironmentRegistry::with_environments(
        config.remote_environments.iter().cloned(),
    ));
    info!(
        remote_environments = config.remote_environments.len(),
        "remote environment registry initialized"
    );

    let mappings = Arc::new(MappingRegistry::new());
    for m in &config.mappings {
        mappings.enable(&m.environment, &m.namespace)?;
    }

    let cluster = InMemoryCluster::new();
    let access = NamespaceAccessChecker::new(registry.clone(), mappings.clone(), Arc::new(store.clone()))
        .with_poll_interval(config.poll_interval());

    let engine = config.engine();
    info!(max_wait = ?engine.max_wait, "provisioning engine initialized");

    let broker = Broker::new(Collaborators::new(
        Arc::new(store.clone()),
        Arc::new(store),
        registry.clone(),
        Arc::new(access),
        Arc::new(cluster.clone()),
        Arc::new(cluster.clone()),
        engine,
    ));

    let router = rebroker_api::build_router(ApiState {
        broker: broker.clone(),
        cluster: cluster.clone(),
        environments: registry.clone(),
        mappings: mappings.clone(),
    });
    Ok(Assembled {
        router,
        broker,
        cluster,
        registry,
        mappings,
    })
}
