use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use rebac_context::NamespaceHeader;
use rebac_models::tuple::RelationTuple;
use serde::{Deserialize, Serialize};

use super::{engine_error_response, validation_error_response, ErrorResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TupleKeyFields {
    pub resource_type: String,
    pub resource_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
    pub subject_relation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetExpirationRequest {
    #[serde(flatten)]
    pub key: TupleKeyFields,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn set_expiration(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(request): Json<SetExpirationRequest>,
) -> Result<Json<RelationTuple>, (StatusCode, Json<ErrorResponse>)> {
    let key = key_from_fields(namespace.as_str(), request.key).map_err(|e| validation_error_response("invalid_tuple_key", e))?;
    let tuple = state.expiration_manager.set_expiration(&key, request.expires_at).await.map_err(engine_error_response)?;
    Ok(Json(tuple))
}

#[derive(Debug, Deserialize)]
pub struct ClearExpirationRequest {
    #[serde(flatten)]
    pub key: TupleKeyFields,
}

pub async fn clear_expiration(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(request): Json<ClearExpirationRequest>,
) -> Result<Json<RelationTuple>, (StatusCode, Json<ErrorResponse>)> {
    let key = key_from_fields(namespace.as_str(), request.key).map_err(|e| validation_error_response("invalid_tuple_key", e))?;
    let tuple = state.expiration_manager.clear_expiration(&key).await.map_err(engine_error_response)?;
    Ok(Json(tuple))
}

#[derive(Debug, Deserialize)]
pub struct ExtendExpirationRequest {
    #[serde(flatten)]
    pub key: TupleKeyFields,
    pub extend_by_seconds: i64,
}

pub async fn extend_expiration(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Json(request): Json<ExtendExpirationRequest>,
) -> Result<Json<RelationTuple>, (StatusCode, Json<ErrorResponse>)> {
    let key = key_from_fields(namespace.as_str(), request.key).map_err(|e| validation_error_response("invalid_tuple_key", e))?;
    let tuple = state
        .expiration_manager
        .extend_expiration(&key, Duration::seconds(request.extend_by_seconds))
        .await
        .map_err(engine_error_response)?;
    Ok(Json(tuple))
}

#[derive(Debug, Deserialize)]
pub struct ListExpiringQuery {
    pub within_seconds: i64,
}

pub async fn list_expiring(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    Query(query): Query<ListExpiringQuery>,
) -> Result<Json<Vec<RelationTuple>>, (StatusCode, Json<ErrorResponse>)> {
    let tuples = state
        .expiration_manager
        .list_expiring(namespace.as_str(), Duration::seconds(query.within_seconds))
        .await
        .map_err(engine_error_response)?;
    Ok(Json(tuples))
}

#[derive(Debug, Serialize)]
pub struct CleanupExpiredResponse {
    pub deleted: u64,
}

pub async fn cleanup_expired(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
) -> Result<Json<CleanupExpiredResponse>, (StatusCode, Json<ErrorResponse>)> {
    let deleted = state.expiration_manager.cleanup_expired(namespace.as_str()).await.map_err(engine_error_response)?;
    Ok(Json(CleanupExpiredResponse { deleted }))
}

fn key_from_fields(namespace: &str, fields: TupleKeyFields) -> Result<rebac_models::tuple::TupleKey, rebac_models::TupleInputError> {
    super::tuple_key_from_fields(
        namespace.to_string(),
        fields.resource_type,
        fields.resource_id,
        fields.relation,
        fields.subject_type,
        fields.subject_id,
        fields.subject_relation,
    )
}
