use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use rebac_context::{ActorHeaders, NamespaceHeader, RequestContext};
use rebac_models::hierarchy::{HierarchyRule, WriteHierarchyRuleRequest};
use serde::{Deserialize, Serialize};

use super::{engine_error_response, validation_error_response, ErrorResponse};
use crate::AppState;

pub async fn add_hierarchy(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    ActorHeaders(actor): ActorHeaders,
    Json(request): Json<WriteHierarchyRuleRequest>,
) -> Result<Json<HierarchyRule>, (StatusCode, Json<ErrorResponse>)> {
    let input = request.validate().map_err(|e| validation_error_response("invalid_hierarchy_rule", e))?;
    let ctx = RequestContext::new(namespace).with_actor(actor);

    let rule = state.hierarchy_store.add_hierarchy(&ctx, input).await.map_err(engine_error_response)?;
    let _ = state.evaluator.invalidate_namespace(ctx.namespace().as_str()).await;
    Ok(Json(rule))
}

#[derive(Debug, Deserialize)]
pub struct RemoveHierarchyRequest {
    pub resource_type: String,
    pub permission: String,
    pub implies: String,
}

#[derive(Debug, Serialize)]
pub struct RemoveHierarchyResponse {
    pub deleted: bool,
}

pub async fn remove_hierarchy(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    ActorHeaders(actor): ActorHeaders,
    Json(request): Json<RemoveHierarchyRequest>,
) -> Result<Json<RemoveHierarchyResponse>, (StatusCode, Json<ErrorResponse>)> {
    let ctx = RequestContext::new(namespace).with_actor(actor);
    let deleted = state
        .hierarchy_store
        .remove_hierarchy(&ctx, ctx.namespace().as_str(), &request.resource_type, &request.permission, &request.implies)
        .await
        .map_err(engine_error_response)?;
    let _ = state.evaluator.invalidate_namespace(ctx.namespace().as_str()).await;
    Ok(Json(RemoveHierarchyResponse { deleted }))
}

#[derive(Debug, Serialize)]
pub struct ClearHierarchyResponse {
    pub deleted: u64,
}

pub async fn clear_hierarchy(
    State(state): State<Arc<AppState>>,
    NamespaceHeader(namespace): NamespaceHeader,
    ActorHeaders(actor): ActorHeaders,
    axum::extract::Path(resource_type): axum::extract::Path<String>,
) -> Result<Json<ClearHierarchyResponse>, (StatusCode, Json<ErrorResponse>)> {
    let ctx = RequestContext::new(namespace).with_actor(actor);
    let deleted = state
        .hierarchy_store
        .clear_hierarchy(&ctx, ctx.namespace().as_str(), &resource_type)
        .await
        .map_err(engine_error_response)?;
    let _ = state.evaluator.invalidate_namespace(ctx.namespace().as_str()).await;
    Ok(Json(ClearHierarchyResponse { deleted }))
}
