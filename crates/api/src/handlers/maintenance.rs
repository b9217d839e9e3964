use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use rebac_context::NamespaceHeader;
use rebac_engine::{CleanupReport, IntegrityWarning, Stats};
use serde::{Deserialize, Serialize};

use super::{engine_error_response, ErrorResponse};
use crate::AppState;

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
) -> Result<Json<Stats>, (StatusCode, Json<ErrorResponse>)> {
    let stats = state.maintenance.get_stats(namespace.as_str()).await.map_err(engine_error_response)?;
    Ok(Json(stats))
}

pub async fn verify_integrity(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
) -> Result<Json<Vec<IntegrityWarning>>, (StatusCode, Json<ErrorResponse>)> {
    let warnings = state.maintenance.verify_integrity(namespace.as_str()).await.map_err(engine_error_response)?;
    Ok(Json(warnings))
}

#[derive(Debug, Deserialize)]
pub struct EnsurePartitionsRequest {
    #[serde(default = "default_months_ahead")]
    pub months_ahead: u32,
}

fn default_months_ahead() -> u32 {
    rebac_engine::DEFAULT_PARTITIONS_AHEAD
}

#[derive(Debug, Serialize)]
pub struct PartitionsResponse {
    pub partitions: Vec<String>,
}

pub async fn ensure_audit_partitions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnsurePartitionsRequest>,
) -> Result<Json<PartitionsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let partitions = state.audit_sink.ensure_partitions(request.months_ahead).await.map_err(engine_error_response)?;
    Ok(Json(PartitionsResponse { partitions }))
}

#[derive(Debug, Deserialize)]
pub struct DropPartitionsRequest {
    #[serde(default = "default_retention_months")]
    pub older_than_months: u32,
}

fn default_retention_months() -> u32 {
    rebac_engine::DEFAULT_RETENTION_MONTHS
}

pub async fn drop_audit_partitions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DropPartitionsRequest>,
) -> Result<Json<PartitionsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let partitions = state.audit_sink.drop_partitions(request.older_than_months).await.map_err(engine_error_response)?;
    Ok(Json(PartitionsResponse { partitions }))
}

#[derive(Debug, Deserialize)]
pub struct CreatePartitionRequest {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Serialize)]
pub struct CreatePartitionResponse {
    pub created: Option<String>,
}

pub async fn create_audit_partition(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePartitionRequest>,
) -> Result<Json<CreatePartitionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let created = state.audit_sink.create_partition(request.year, request.month).await.map_err(engine_error_response)?;
    Ok(Json(CreatePartitionResponse { created }))
}

pub async fn cleanup_expired(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
) -> Result<Json<CleanupReport>, (StatusCode, Json<ErrorResponse>)> {
    let report = state.maintenance.cleanup_expired(namespace.as_str()).await.map_err(engine_error_response)?;
    Ok(Json(report))
}
