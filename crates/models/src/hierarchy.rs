//! The permission-hierarchy rule — an edge in the per-`(namespace,
//! resource_type)` implication DAG: holding `permission` implies holding
//! `implies`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{Identifier, Namespace, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HierarchyRule {
    pub id: Uuid,
    pub namespace: String,
    pub resource_type: String,
    pub permission: String,
    pub implies: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WriteHierarchyRule {
    pub namespace: Namespace,
    pub resource_type: Identifier,
    pub permission: Identifier,
    pub implies: Identifier,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum HierarchyInputError {
    #[error("namespace: {0}")]
    Namespace(ValidationError),
    #[error("resource_type: {0}")]
    ResourceType(ValidationError),
    #[error("permission: {0}")]
    Permission(ValidationError),
    #[error("implies: {0}")]
    Implies(ValidationError),
    #[error("permission: must differ from implies")]
    SelfImplication,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteHierarchyRuleRequest {
    pub namespace: String,
    pub resource_type: String,
    pub permission: String,
    pub implies: String,
}

impl WriteHierarchyRuleRequest {
    pub fn validate(self) -> Result<WriteHierarchyRule, HierarchyInputError> {
        let namespace = Namespace::parse(self.namespace).map_err(HierarchyInputError::Namespace)?;
        let resource_type =
            Identifier::parse(self.resource_type).map_err(HierarchyInputError::ResourceType)?;
        let permission =
            Identifier::parse(self.permission).map_err(HierarchyInputError::Permission)?;
        let implies = Identifier::parse(self.implies).map_err(HierarchyInputError::Implies)?;

        if permission == implies {
            return Err(HierarchyInputError::SelfImplication);
        }

        Ok(WriteHierarchyRule {
            namespace,
            resource_type,
            permission,
            implies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(permission: &str, implies: &str) -> WriteHierarchyRuleRequest {
        WriteHierarchyRuleRequest {
            namespace: "acme".into(),
            resource_type: "repo".into(),
            permission: permission.into(),
            implies: implies.into(),
        }
    }

    #[test]
    fn rejects_self_implication() {
        let err = request("write", "write").validate().unwrap_err();
        assert!(matches!(err, HierarchyInputError::SelfImplication));
    }

    #[test]
    fn accepts_distinct_permission_and_implies() {
        let rule = request("write", "read").validate().unwrap();
        assert_eq!(rule.permission.as_str(), "write");
        assert_eq!(rule.implies.as_str(), "read");
    }
}
