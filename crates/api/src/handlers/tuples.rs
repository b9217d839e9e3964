use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use rebac_context::{ActorHeaders, NamespaceHeader, RequestContext};
use rebac_models::tuple::{RelationTuple, TupleKey, WriteTupleRequest};
use serde::{Deserialize, Serialize};

use super::{engine_error_response, validation_error_response, ErrorResponse};
use crate::AppState;

pub async fn write_tuple(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    ActorHeaders(actor): ActorHeaders,
    Json(request): Json<WriteTupleRequest>,
) -> Result<Json<RelationTuple>, (StatusCode, Json<ErrorResponse>)> {
    let input = request.validate().map_err(|e| validation_error_response("invalid_tuple", e))?;
    let ctx = RequestContext::new(namespace).with_actor(actor);

    let tuple = state.tuple_store.write_tuple(&ctx, input).await.map_err(engine_error_response)?;
    let _ = state.evaluator.invalidate_namespace(ctx.namespace().as_str()).await;
    Ok(Json(tuple))
}

#[derive(Debug, Deserialize)]
pub struct DeleteTupleRequest {
    pub namespace: String,
    pub resource_type: String,
    pub resource_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
    pub subject_relation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteTupleResponse {
    pub deleted: bool,
}

pub async fn delete_tuple(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    ActorHeaders(actor): ActorHeaders,
    Json(request): Json<DeleteTupleRequest>,
) -> Result<Json<DeleteTupleResponse>, (StatusCode, Json<ErrorResponse>)> {
    let key = parse_tuple_key(request).map_err(|e| validation_error_response("invalid_tuple_key", e))?;
    let ctx = RequestContext::new(namespace).with_actor(actor);

    let deleted = state.tuple_store.delete_tuple(&ctx, key).await.map_err(engine_error_response)?;
    let _ = state.evaluator.invalidate_namespace(ctx.namespace().as_str()).await;
    Ok(Json(DeleteTupleResponse { deleted }))
}

#[derive(Debug, Deserialize)]
pub struct BulkWriteRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkWriteResponse {
    pub written: usize,
}

pub async fn bulk_write(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    ActorHeaders(actor): ActorHeaders,
    Json(request): Json<BulkWriteRequest>,
) -> Result<Json<BulkWriteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let ctx = RequestContext::new(namespace).with_actor(actor);
    let written = state
        .tuple_store
        .bulk_write(&ctx, &request.resource_type, &request.resource_id, &request.relation, &request.subject_type, &request.subject_ids)
        .await
        .map_err(engine_error_response)?;
    let _ = state.evaluator.invalidate_namespace(ctx.namespace().as_str()).await;
    Ok(Json(BulkWriteResponse { written }))
}

pub async fn tuples_for_resource(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    axum::extract::Path((resource_type, resource_id)): axum::extract::Path<(String, String)>,
) -> Result<Json<Vec<RelationTuple>>, (StatusCode, Json<ErrorResponse>)> {
    let tuples = state
        .tuple_store
        .tuples_for_resource(namespace.as_str(), &resource_type, &resource_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(tuples))
}

pub async fn tuples_for_subject(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    axum::extract::Path((subject_type, subject_id)): axum::extract::Path<(String, String)>,
) -> Result<Json<Vec<RelationTuple>>, (StatusCode, Json<ErrorResponse>)> {
    let tuples = state
        .tuple_store
        .tuples_for_subject(namespace.as_str(), &subject_type, &subject_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(tuples))
}

fn parse_tuple_key(request: DeleteTupleRequest) -> Result<TupleKey, rebac_models::TupleInputError> {
    super::tuple_key_from_fields(
        request.namespace,
        request.resource_type,
        request.resource_id,
        request.relation,
        request.subject_type,
        request.subject_id,
        request.subject_relation,
    )
}
