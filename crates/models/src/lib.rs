pub mod audit;
pub mod hierarchy;
pub mod tuple;
pub mod validation;

pub use audit::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use hierarchy::{HierarchyInputError, HierarchyRule, WriteHierarchyRule, WriteHierarchyRuleRequest};
pub use tuple::{
    is_reserved_relation, RelationTuple, TupleInputError, TupleKey, WriteTuple, WriteTupleRequest,
    RELATION_MEMBER, RELATION_PARENT,
};
pub use validation::{FreeFormId, Identifier, Namespace, PositiveDuration, ValidationError};
