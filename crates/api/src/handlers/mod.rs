pub mod check;
pub mod expiration;
pub mod health;
pub mod hierarchy;
pub mod maintenance;
pub mod tuples;

use axum::{http::StatusCode, Json};
use rebac_engine::EngineError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self { error: error.to_string(), message: message.into() }
    }
}

pub fn engine_error_response(err: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        EngineError::Validation { .. } => StatusCode::BAD_REQUEST,
        EngineError::Precondition { .. } => StatusCode::CONFLICT,
        EngineError::Integrity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::Database(_) | EngineError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(%err, "request failed");
    (status, Json(ErrorResponse::new("engine_error", err.to_string())))
}

pub fn validation_error_response(field: &str, message: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(field, message.to_string())))
}

/// Shared by every handler that needs an exact [`rebac_models::tuple::TupleKey`]
/// (delete, expiration) from raw request fields.
pub(crate) fn tuple_key_from_fields(
    namespace: String,
    resource_type: String,
    resource_id: String,
    relation: String,
    subject_type: String,
    subject_id: String,
    subject_relation: Option<String>,
) -> Result<rebac_models::tuple::TupleKey, rebac_models::TupleInputError> {
    use rebac_models::tuple::TupleKey;
    use rebac_models::TupleInputError as E;
    use rebac_models::{FreeFormId, Identifier, Namespace};

    Ok(TupleKey {
        namespace: Namespace::parse(namespace).map_err(E::Namespace)?,
        resource_type: Identifier::parse(resource_type).map_err(E::ResourceType)?,
        resource_id: FreeFormId::parse(resource_id).map_err(E::ResourceId)?,
        relation: Identifier::parse(relation).map_err(E::Relation)?,
        subject_type: Identifier::parse(subject_type).map_err(E::SubjectType)?,
        subject_id: FreeFormId::parse(subject_id).map_err(E::SubjectId)?,
        subject_relation: subject_relation
            .filter(|s| !s.is_empty())
            .map(Identifier::parse)
            .transpose()
            .map_err(E::SubjectRelation)?,
    })
}
