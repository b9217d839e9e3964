pub mod audit;
pub mod cycle;
pub mod error;
pub mod evaluator;
pub mod expiration;
pub mod graph;
pub mod hierarchy;
pub mod locks;
pub mod maintenance;
pub mod tuple;

pub use audit::{AuditSink, DEFAULT_PARTITIONS_AHEAD, DEFAULT_RETENTION_MONTHS};
pub use error::{EngineError, Result};
pub use evaluator::{Evaluator, ExplainPath, PathKind, ResourceRow, SubjectRow};
pub use expiration::ExpirationManager;
pub use hierarchy::HierarchyStore;
pub use maintenance::{CleanupReport, IntegrityKind, IntegrityWarning, Maintenance, Stats};
pub use tuple::TupleStore;
