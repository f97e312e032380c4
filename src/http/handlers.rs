//! Configuration REST handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::error::ApiResult;
use crate::http::server::AppState;
use crate::registry::types::{
    ConfigurationVariable, ConfigurationVariableDefinition, ServiceConfiguration, ServiceReplica,
};

/// Body of the batch update routes.
#[derive(Debug, Deserialize)]
pub struct VariablesBody {
    pub variables: Vec<ConfigurationVariable>,
}

/// Body of the single-variable update routes.
#[derive(Debug, Deserialize)]
pub struct ValueBody {
    pub value: Value,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub services: usize,
}

pub async fn healthz(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        services: state.registry.service_count(),
    })
}

pub async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceConfiguration>> {
    Json(state.registry.services())
}

pub async fn list_service_names(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.service_names())
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> ApiResult<Json<ServiceConfiguration>> {
    Ok(Json(state.registry.service(&service)?))
}

pub async fn delete_service(State(state): State<AppState>, Path(service): Path<String>) -> ApiResult<StatusCode> {
    state.registry.delete_service(&service).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_defined_variables(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> ApiResult<Json<Vec<ConfigurationVariableDefinition>>> {
    Ok(Json(state.registry.variable_definitions(&service)?))
}

// --- Global variables ---

pub async fn get_service_variables(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> ApiResult<Json<Vec<ConfigurationVariable>>> {
    Ok(Json(state.registry.service_variables(&service)?))
}

pub async fn put_service_variables(
    State(state): State<AppState>,
    Path(service): Path<String>,
    body: Result<Json<VariablesBody>, JsonRejection>,
) -> ApiResult<Json<Vec<ConfigurationVariable>>> {
    let Json(body) = body?;
    let updated = state
        .registry
        .batch_add_or_update_service_variables(&service, body.variables)
        .await?;
    Ok(Json(updated.global_variables))
}

pub async fn get_service_variable(
    State(state): State<AppState>,
    Path((service, variable)): Path<(String, String)>,
) -> ApiResult<Json<ConfigurationVariable>> {
    Ok(Json(state.registry.service_variable(&service, &variable)?))
}

pub async fn put_service_variable(
    State(state): State<AppState>,
    Path((service, variable)): Path<(String, String)>,
    body: Result<Json<ValueBody>, JsonRejection>,
) -> ApiResult<Json<ConfigurationVariable>> {
    let Json(body) = body?;
    let updated = state
        .registry
        .add_or_update_service_variable(&service, ConfigurationVariable::new(variable, body.value))
        .await?;
    Ok(Json(updated))
}

// --- Replicas ---

pub async fn list_replicas(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> ApiResult<Json<Vec<ServiceReplica>>> {
    Ok(Json(state.registry.replicas(&service)?))
}

pub async fn delete_replica(
    State(state): State<AppState>,
    Path((service, replica)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.registry.delete_replica(&service, &replica).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_replica_variables(
    State(state): State<AppState>,
    Path((service, replica)): Path<(String, String)>,
) -> ApiResult<Json<Vec<ConfigurationVariable>>> {
    Ok(Json(state.registry.replica_variables(&service, &replica)?))
}

pub async fn put_replica_variables(
    State(state): State<AppState>,
    Path((service, replica)): Path<(String, String)>,
    body: Result<Json<VariablesBody>, JsonRejection>,
) -> ApiResult<Json<Vec<ConfigurationVariable>>> {
    let Json(body) = body?;
    let updated = state
        .registry
        .batch_add_or_update_replica_variables(&service, &replica, body.variables)
        .await?;
    let variables = updated
        .replica(&replica)
        .map(|r| r.replica_variables.clone())
        .unwrap_or_default();
    Ok(Json(variables))
}

pub async fn get_replica_variable(
    State(state): State<AppState>,
    Path((service, replica, variable)): Path<(String, String, String)>,
) -> ApiResult<Json<ConfigurationVariable>> {
    Ok(Json(state.registry.replica_variable(&service, &replica, &variable)?))
}

pub async fn put_replica_variable(
    State(state): State<AppState>,
    Path((service, replica, variable)): Path<(String, String, String)>,
    body: Result<Json<ValueBody>, JsonRejection>,
) -> ApiResult<Json<ConfigurationVariable>> {
    let Json(body) = body?;
    let updated = state
        .registry
        .add_or_update_replica_variable(&service, &replica, ConfigurationVariable::new(variable, body.value))
        .await?;
    Ok(Json(updated))
}
