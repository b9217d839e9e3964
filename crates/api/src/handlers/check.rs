use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use rebac_context::NamespaceHeader;
use rebac_engine::{ExplainPath, ResourceRow, SubjectRow};
use serde::{Deserialize, Serialize};

use super::{engine_error_response, ErrorResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub subject_id: String,
    pub permission: String,
    pub resource_type: String,
    pub resource_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

pub async fn check(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, (StatusCode, Json<ErrorResponse>)> {
    let allowed = state
        .evaluator
        .check(namespace.as_str(), &req.subject_id, &req.permission, &req.resource_type, &req.resource_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(CheckResponse { allowed }))
}

#[derive(Debug, Deserialize)]
pub struct CheckAnyAllRequest {
    pub subject_id: String,
    pub permissions: Vec<String>,
    pub resource_type: String,
    pub resource_id: String,
}

pub async fn check_any(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(req): Json<CheckAnyAllRequest>,
) -> Result<Json<CheckResponse>, (StatusCode, Json<ErrorResponse>)> {
    let allowed = state
        .evaluator
        .check_any(namespace.as_str(), &req.subject_id, &req.permissions, &req.resource_type, &req.resource_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(CheckResponse { allowed }))
}

pub async fn check_all(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(req): Json<CheckAnyAllRequest>,
) -> Result<Json<CheckResponse>, (StatusCode, Json<ErrorResponse>)> {
    let allowed = state
        .evaluator
        .check_all(namespace.as_str(), &req.subject_id, &req.permissions, &req.resource_type, &req.resource_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(CheckResponse { allowed }))
}

#[derive(Debug, Deserialize)]
pub struct ListResourcesRequest {
    pub subject_id: String,
    pub resource_type: String,
    pub permission: String,
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: i64,
}

pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(req): Json<ListResourcesRequest>,
) -> Result<Json<Vec<ResourceRow>>, (StatusCode, Json<ErrorResponse>)> {
    let rows = state
        .evaluator
        .list_resources(namespace.as_str(), &req.subject_id, &req.resource_type, &req.permission, req.cursor.as_deref(), req.limit)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub permission: String,
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: i64,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(req): Json<ListUsersRequest>,
) -> Result<Json<Vec<SubjectRow>>, (StatusCode, Json<ErrorResponse>)> {
    let rows = state
        .evaluator
        .list_users(namespace.as_str(), &req.resource_type, &req.resource_id, &req.permission, req.cursor.as_deref(), req.limit)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct FilterAuthorizedRequest {
    pub subject_id: String,
    pub permission: String,
    pub resource_type: String,
    pub resource_ids: Vec<String>,
}

pub async fn filter_authorized(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(req): Json<FilterAuthorizedRequest>,
) -> Result<Json<Vec<String>>, (StatusCode, Json<ErrorResponse>)> {
    let ids = state
        .evaluator
        .filter_authorized(namespace.as_str(), &req.subject_id, &req.permission, &req.resource_type, &req.resource_ids)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(ids))
}

pub async fn explain(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(req): Json<CheckRequest>,
) -> Result<Json<Vec<ExplainPath>>, (StatusCode, Json<ErrorResponse>)> {
    let paths = state
        .evaluator
        .explain(namespace.as_str(), &req.subject_id, &req.permission, &req.resource_type, &req.resource_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(paths))
}

#[derive(Debug, Serialize)]
pub struct ExplainTextResponse {
    pub lines: Vec<String>,
}

pub async fn explain_text(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(req): Json<CheckRequest>,
) -> Result<Json<ExplainTextResponse>, (StatusCode, Json<ErrorResponse>)> {
    let lines = state
        .evaluator
        .explain_text(namespace.as_str(), &req.subject_id, &req.permission, &req.resource_type, &req.resource_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(ExplainTextResponse { lines }))
}
