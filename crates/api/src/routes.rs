use crate::handlers;
use crate::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/v1/tuples", post(handlers::tuples::write_tuple))
        .route("/v1/tuples", delete(handlers::tuples::delete_tuple))
        .route("/v1/tuples/bulk", post(handlers::tuples::bulk_write))
        .route("/v1/tuples/by-resource/:resource_type/:resource_id", get(handlers::tuples::tuples_for_resource))
        .route("/v1/tuples/by-subject/:subject_type/:subject_id", get(handlers::tuples::tuples_for_subject))
        .route("/v1/hierarchy", post(handlers::hierarchy::add_hierarchy))
        .route("/v1/hierarchy", delete(handlers::hierarchy::remove_hierarchy))
        .route("/v1/hierarchy/:resource_type", delete(handlers::hierarchy::clear_hierarchy))
        .route("/v1/check", post(handlers::check::check))
        .route("/v1/check/any", post(handlers::check::check_any))
        .route("/v1/check/all", post(handlers::check::check_all))
        .route("/v1/resources", post(handlers::check::list_resources))
        .route("/v1/users", post(handlers::check::list_users))
        .route("/v1/filter-authorized", post(handlers::check::filter_authorized))
        .route("/v1/explain", post(handlers::check::explain))
        .route("/v1/explain/text", post(handlers::check::explain_text))
        .route("/v1/expiration", post(handlers::expiration::set_expiration))
        .route("/v1/expiration/clear", post(handlers::expiration::clear_expiration))
        .route("/v1/expiration/extend", post(handlers::expiration::extend_expiration))
        .route("/v1/expiration/expiring", get(handlers::expiration::list_expiring))
        .route("/v1/expiration/cleanup", post(handlers::expiration::cleanup_expired))
        .route("/v1/maintenance/stats", get(handlers::maintenance::get_stats))
        .route("/v1/maintenance/integrity", get(handlers::maintenance::verify_integrity))
        .route("/v1/maintenance/audit-partitions", post(handlers::maintenance::ensure_audit_partitions))
        .route("/v1/maintenance/audit-partitions/drop", post(handlers::maintenance::drop_audit_partitions))
        .route("/v1/maintenance/audit-partitions/create", post(handlers::maintenance::create_audit_partition))
        .route("/v1/maintenance/cleanup", post(handlers::maintenance::cleanup_expired))
        .with_state(state)
}
