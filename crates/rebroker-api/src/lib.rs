//! rebroker-api: Open Service Broker HTTP API.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/statusz` | Liveness check |
//! | GET | `/v2/catalog` | OSB catalog |
//! | PUT | `/v2/service_instances/{instance_id}` | Provision an instance |
//! | DELETE | `/v2/service_instances/{instance_id}` | Deprovision an instance |
//! | GET | `/v2/service_instances/{instance_id}/last_operation` | Poll an operation |
//! | POST | `/cluster/v1/namespaces/{namespace}/serviceinstances` | Register a platform service instance |
//! | GET | `/cluster/v1/namespaces/{namespace}/eventactivations` | List EventActivations |
//! | PUT | `/cluster/v1/namespaces/{namespace}/environmentmappings/{environment}` | Enable a remote environment in a namespace |
//! | DELETE | `/cluster/v1/namespaces/{namespace}/environmentmappings/{environment}` | Disable it again |
//! | GET | `/cluster/v1/remoteenvironments` | List remote environments |
//! | GET | `/cluster/v1/remoteenvironments/{name}` | Get a remote environment |
//! | PUT | `/cluster/v1/remoteenvironments/{name}` | Register or replace a remote environment |
//! | DELETE | `/cluster/v1/remoteenvironments/{name}` | Unregister a remote environment |
//!
//! The `/cluster/v1` routes expose the in-memory cluster of the standalone
//! daemon, standing in for the platform's service catalog, the remote
//! environment resources and EnvironmentMappings.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use rebroker_access::MappingRegistry;
use rebroker_broker::Broker;
use rebroker_catalog::RemoteEnvironmentRegistry;
use rebroker_cluster::InMemoryCluster;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub broker: Broker,
    pub cluster: InMemoryCluster,
    /// The registry the broker's catalog and access checks read from.
    pub environments: Arc<RemoteEnvironmentRegistry>,
    /// The mappings the broker's access checks read from.
    pub mappings: Arc<MappingRegistry>,
}

/// Build the complete router (OSB + cluster stand-in + status).
pub fn build_router(state: ApiState) -> Router {
    let osb_routes = Router::new()
        .route("/catalog", get(handlers::get_catalog))
        .route(
            "/service_instances/{instance_id}",
            put(handlers::provision).delete(handlers::deprovision),
        )
        .route(
            "/service_instances/{instance_id}/last_operation",
            get(handlers::last_operation),
        );

    let cluster_routes = Router::new()
        .route(
            "/namespaces/{namespace}/serviceinstances",
            post(handlers::register_service_instance),
        )
        .route(
            "/namespaces/{namespace}/eventactivations",
            get(handlers::list_event_activations),
        )
        .route(
            "/namespaces/{namespace}/environmentmappings/{environment}",
            put(handlers::enable_mapping).delete(handlers::disable_mapping),
        )
        .route(
            "/remoteenvironments",
            get(handlers::list_remote_environments),
        )
        .route(
            "/remoteenvironments/{name}",
            get(handlers::get_remote_environment)
                .put(handlers::put_remote_environment)
                .delete(handlers::delete_remote_environment),
        );

    Router::new()
        .nest("/v2", osb_routes)
        .nest("/cluster/v1", cluster_routes)
        .route("/statusz", get(handlers::statusz))
        .with_state(state)
}
