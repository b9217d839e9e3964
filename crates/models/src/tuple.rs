//! The relationship tuple — an edge in the permission graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{FreeFormId, Identifier, Namespace, ValidationError};

/// `member` denotes group-containment; `parent` denotes resource
/// containment. Both carry graph semantics and are the only relations the
/// cycle detector and the evaluator's group/ancestor expansion follow.
pub const RELATION_MEMBER: &str = "member";
pub const RELATION_PARENT: &str = "parent";

pub fn is_reserved_relation(relation: &str) -> bool {
    matches!(relation, RELATION_MEMBER | RELATION_PARENT)
}

/// A relationship tuple as persisted: `(resource_type, resource_id,
/// relation, subject_type, subject_id, subject_relation?)` under a
/// namespace, with an optional expiration.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RelationTuple {
    pub id: Uuid,
    pub namespace: String,
    pub resource_type: String,
    pub resource_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
    pub subject_relation: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RelationTuple {
    /// `none` and `""` are the same key for `subject_relation`.
    pub fn subject_relation_key(&self) -> &str {
        self.subject_relation.as_deref().unwrap_or("")
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(e) if e <= now)
    }
}

/// A validated request to write a tuple. Construction validates every
/// field; a `WriteTuple` value is known-good input to the write path.
#[derive(Debug, Clone)]
pub struct WriteTuple {
    pub namespace: Namespace,
    pub resource_type: Identifier,
    pub resource_id: FreeFormId,
    pub relation: Identifier,
    pub subject_type: Identifier,
    pub subject_id: FreeFormId,
    pub subject_relation: Option<Identifier>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TupleInputError {
    #[error("namespace: {0}")]
    Namespace(ValidationError),
    #[error("resource_type: {0}")]
    ResourceType(ValidationError),
    #[error("resource_id: {0}")]
    ResourceId(ValidationError),
    #[error("relation: {0}")]
    Relation(ValidationError),
    #[error("subject_type: {0}")]
    SubjectType(ValidationError),
    #[error("subject_id: {0}")]
    SubjectId(ValidationError),
    #[error("subject_relation: {0}")]
    SubjectRelation(ValidationError),
}

/// Raw, unvalidated field set as received at the external interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteTupleRequest {
    pub namespace: String,
    pub resource_type: String,
    pub resource_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
    pub subject_relation: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl WriteTupleRequest {
    pub fn validate(self) -> Result<WriteTuple, TupleInputError> {
        Ok(WriteTuple {
            namespace: Namespace::parse(self.namespace).map_err(TupleInputError::Namespace)?,
            resource_type: Identifier::parse(self.resource_type)
                .map_err(TupleInputError::ResourceType)?,
            resource_id: FreeFormId::parse(self.resource_id)
                .map_err(TupleInputError::ResourceId)?,
            relation: Identifier::parse(self.relation).map_err(TupleInputError::Relation)?,
            subject_type: Identifier::parse(self.subject_type)
                .map_err(TupleInputError::SubjectType)?,
            subject_id: FreeFormId::parse(self.subject_id).map_err(TupleInputError::SubjectId)?,
            subject_relation: self
                .subject_relation
                .filter(|s| !s.is_empty())
                .map(Identifier::parse)
                .transpose()
                .map_err(TupleInputError::SubjectRelation)?,
            expires_at: self.expires_at,
        })
    }
}

/// An exact tuple key (including `subject_relation`) for delete and
/// expiration operations.
#[derive(Debug, Clone)]
pub struct TupleKey {
    pub namespace: Namespace,
    pub resource_type: Identifier,
    pub resource_id: FreeFormId,
    pub relation: Identifier,
    pub subject_type: Identifier,
    pub subject_id: FreeFormId,
    pub subject_relation: Option<Identifier>,
}

impl TupleKey {
    pub fn subject_relation_key(&self) -> &str {
        self.subject_relation.as_ref().map(|r| r.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_relations_are_member_and_parent() {
        assert!(is_reserved_relation("member"));
        assert!(is_reserved_relation("parent"));
        assert!(!is_reserved_relation("read"));
    }

    #[test]
    fn write_tuple_request_normalizes_empty_subject_relation_to_none() {
        let req = WriteTupleRequest {
            namespace: "acme".into(),
            resource_type: "repo".into(),
            resource_id: "api".into(),
            relation: "read".into(),
            subject_type: "user".into(),
            subject_id: "alice".into(),
            subject_relation: Some(String::new()),
            expires_at: None,
        };
        let tuple = req.validate().unwrap();
        assert!(tuple.subject_relation.is_none());
    }
}
