//! OSB and cluster stand-in handlers.
//!
//! OSB errors use the protocol's `{"error": ..., "description": ...}` body;
//! successful provision and deprovision answer `200 {}` when nothing was left
//! to do and `202 {"operation": ...}` when work continues in the background.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use rebroker_broker::{
    BrokerError, DeprovisionRequest, LastOperationRequest, OsbContext, ProvisionRequest,
};
use rebroker_catalog::{Converter, RemoteEnvironment, RemoteEnvironmentFinder};

use crate::ApiState;

const API_VERSION_HEADER: &str = "x-broker-api-version";
const ORIGINATING_IDENTITY_HEADER: &str = "x-broker-api-originating-identity";

/// OSB error body.
#[derive(Serialize)]
struct OsbErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    description: String,
}

fn error_response(err: &BrokerError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        warn!(error = %err, "OSB request failed");
    }
    (
        status,
        Json(OsbErrorBody {
            error: err.osb_code(),
            description: err.to_string(),
        }),
    )
        .into_response()
}

fn osb_context(headers: &HeaderMap) -> OsbContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    OsbContext {
        api_version: header(API_VERSION_HEADER).unwrap_or_default(),
        originating_identity: header(ORIGINATING_IDENTITY_HEADER),
    }
}

fn empty_object() -> Json<Value> {
    Json(Value::Object(Map::new()))
}

// ── Status ─────────────────────────────────────────────────────

/// GET /statusz
pub async fn statusz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Catalog ────────────────────────────────────────────────────

/// GET /v2/catalog
pub async fn get_catalog(State(state): State<ApiState>) -> Response {
    match state.broker.catalog.get_catalog() {
        Ok(catalog) => Json(catalog).into_response(),
        Err(e) => error_response(&BrokerError::Internal(e.to_string())),
    }
}

// ── Provision ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AsyncQuery {
    #[serde(default)]
    pub accepts_incomplete: bool,
}

/// Provision request body.
#[derive(Debug, Deserialize)]
pub struct ProvisionBody {
    pub service_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// PUT /v2/service_instances/{instance_id}
pub async fn provision(
    State(state): State<ApiState>,
    Path(instance_id): Path<String>,
    Query(query): Query<AsyncQuery>,
    headers: HeaderMap,
    Json(body): Json<ProvisionBody>,
) -> Response {
    let req = ProvisionRequest {
        instance_id,
        service_id: body.service_id,
        plan_id: body.plan_id,
        parameters: body.parameters,
        context: body.context,
        accepts_incomplete: query.accepts_incomplete,
    };
    match state.broker.provisioner.provision(&osb_context(&headers), req) {
        Ok(resp) if resp.is_async => (StatusCode::ACCEPTED, Json(resp)).into_response(),
        Ok(_) => (StatusCode::OK, empty_object()).into_response(),
        Err(e) => error_response(&e),
    }
}

// ── Deprovision ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeprovisionQuery {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub accepts_incomplete: bool,
}

/// DELETE /v2/service_instances/{instance_id}
pub async fn deprovision(
    State(state): State<ApiState>,
    Path(instance_id): Path<String>,
    Query(query): Query<DeprovisionQuery>,
    headers: HeaderMap,
) -> Response {
    let req = DeprovisionRequest {
        instance_id,
        service_id: query.service_id,
        plan_id: query.plan_id,
        accepts_incomplete: query.accepts_incomplete,
    };
    match state
        .broker
        .deprovisioner
        .deprovision(&osb_context(&headers), req)
    {
        Ok(resp) if resp.is_async => (StatusCode::ACCEPTED, Json(resp)).into_response(),
        Ok(_) => (StatusCode::OK, empty_object()).into_response(),
        Err(e) => error_response(&e),
    }
}

// ── Last operation ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LastOperationQuery {
    pub operation: Option<String>,
}

/// GET /v2/service_instances/{instance_id}/last_operation
pub async fn last_operation(
    State(state): State<ApiState>,
    Path(instance_id): Path<String>,
    Query(query): Query<LastOperationQuery>,
) -> Response {
    let req = LastOperationRequest {
        instance_id,
        operation: query.operation,
    };
    match state.broker.last_operation.last_operation(&req) {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => error_response(&e),
    }
}

// ── Cluster stand-in ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterServiceInstance {
    pub name: String,
    pub external_id: String,
}

/// POST /cluster/v1/namespaces/{namespace}/serviceinstances
pub async fn register_service_instance(
    State(state): State<ApiState>,
    Path(namespace): Path<String>,
    Json(body): Json<RegisterServiceInstance>,
) -> Response {
    let si = state
        .cluster
        .register_service_instance(&namespace, &body.name, &body.external_id)
        .await;
    (StatusCode::CREATED, Json(si)).into_response()
}

/// GET /cluster/v1/namespaces/{namespace}/eventactivations
pub async fn list_event_activations(
    State(state): State<ApiState>,
    Path(namespace): Path<String>,
) -> Response {
    Json(state.cluster.list_event_activations(&namespace).await).into_response()
}

/// Error body of the cluster stand-in routes.
fn resource_error(msg: impl Into<String>, status: StatusCode) -> Response {
    (status, Json(serde_json::json!({ "error": msg.into() }))).into_response()
}

#[derive(Debug, Serialize)]
pub struct EnvironmentMapping {
    pub environment: String,
    pub namespace: String,
}

/// PUT /cluster/v1/namespaces/{namespace}/environmentmappings/{environment}
pub async fn enable_mapping(
    State(state): State<ApiState>,
    Path((namespace, environment)): Path<(String, String)>,
) -> Response {
    match state.mappings.enable(&environment, &namespace) {
        Ok(()) => Json(EnvironmentMapping {
            environment,
            namespace,
        })
        .into_response(),
        Err(e) => resource_error(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// DELETE /cluster/v1/namespaces/{namespace}/environmentmappings/{environment}
pub async fn disable_mapping(
    State(state): State<ApiState>,
    Path((namespace, environment)): Path<(String, String)>,
) -> Response {
    match state.mappings.disable(&environment, &namespace) {
        Ok(true) => {
            info!(%environment, %namespace, "remote environment disabled in namespace");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => resource_error("EnvironmentMapping not found", StatusCode::NOT_FOUND),
        Err(e) => resource_error(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /cluster/v1/remoteenvironments
pub async fn list_remote_environments(State(state): State<ApiState>) -> Response {
    match state.environments.find_all() {
        Ok(envs) => Json(envs).into_response(),
        Err(e) => resource_error(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /cluster/v1/remoteenvironments/{name}
pub async fn get_remote_environment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    match state.environments.get(&name) {
        Ok(Some(re)) => Json(re).into_response(),
        Ok(None) => resource_error("remote environment not found", StatusCode::NOT_FOUND),
        Err(e) => resource_error(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// PUT /cluster/v1/remoteenvironments/{name}
///
/// Rejects environments that would not translate into catalog entries, so
/// one bad registration cannot break the whole catalog.
pub async fn put_remote_environment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(mut re): Json<RemoteEnvironment>,
) -> Response {
    if re.name.is_empty() {
        re.name = name;
    } else if re.name != name {
        return resource_error(
            format!("name {:?} does not match the path name {name:?}", re.name),
            StatusCode::BAD_REQUEST,
        );
    }
    if let Err(e) = Converter::new().convert_all(&re) {
        return resource_error(e.to_string(), StatusCode::BAD_REQUEST);
    }
    match state.environments.upsert(re.clone()) {
        Ok(()) => Json(re).into_response(),
        Err(e) => resource_error(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// DELETE /cluster/v1/remoteenvironments/{name}
pub async fn delete_remote_environment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    match state.environments.remove(&name) {
        Ok(Some(_)) => {
            info!(remote_environment = %name, "remote environment unregistered");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(None) => resource_error("remote environment not found", StatusCode::NOT_FOUND),
        Err(e) => resource_error(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}
