//! The hierarchy store: permission-implication rules per `(namespace,
//! resource_type)`, with the same cycle-safety discipline as the tuple
//! store's reserved relations (§4.4/§4.5).

use chrono::Utc;
use rebac_context::RequestContext;
use rebac_models::audit::{AuditEventBuilder, AuditEventType};
use rebac_models::hierarchy::{HierarchyRule, WriteHierarchyRule};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::cycle::reject_if_would_cycle;
use crate::error::Result;
use crate::locks;

#[derive(Clone)]
pub struct HierarchyStore {
    pool: PgPool,
    audit: AuditSink,
}

impl HierarchyStore {
    pub fn new(pool: PgPool, audit: AuditSink) -> Self {
        Self { pool, audit }
    }

    pub async fn add_hierarchy(&self, ctx: &RequestContext, input: WriteHierarchyRule) -> Result<HierarchyRule> {
        let namespace = input.namespace.as_str();
        let resource_type = input.resource_type.as_str();

        // Self-implication is already rejected by WriteHierarchyRuleRequest::validate,
        // but input may have been constructed directly; check again defensively.
        let permission = (resource_type.to_string(), input.permission.as_str().to_string());
        let implies = (resource_type.to_string(), input.implies.as_str().to_string());

        let mut tx = self.pool.begin().await?;
        locks::acquire_namespace_lock(&mut tx, namespace).await?;
        locks::acquire_dual_endpoint_locks(
            &mut tx,
            &format!("hierarchy:{}:{}", namespace, permission.1),
            &format!("hierarchy:{}:{}", namespace, implies.1),
        )
        .await?;

        let ns = namespace.to_string();
        let rt = resource_type.to_string();
        reject_if_would_cycle("add_hierarchy", permission.clone(), implies.clone(), |x| {
            self.implied_by(ns.clone(), rt.clone(), x)
        })
        .await?;

        let row: (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO hierarchy_rules (id, namespace, resource_type, permission, implies, created_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, now())
            ON CONFLICT (namespace, resource_type, permission, implies) DO UPDATE SET permission = EXCLUDED.permission
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(namespace)
        .bind(resource_type)
        .bind(input.permission.as_str())
        .bind(input.implies.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let (rule_id, inserted) = row;

        if inserted {
            let event = AuditEventBuilder::new(AuditEventType::HierarchyCreated, namespace, Utc::now())
                .resource(resource_type, "")
                .relation(input.permission.as_str())
                .subject_relation(Some(input.implies.as_str().to_string()))
                .actor(ctx.actor_id().map(String::from), ctx.request_id().map(String::from), None)
                .build();
            self.audit.record(&mut tx, &event).await?;
        }

        tx.commit().await?;

        sqlx::query_as::<_, HierarchyRule>("SELECT * FROM hierarchy_rules WHERE id = $1")
            .bind(rule_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    pub async fn remove_hierarchy(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        resource_type: &str,
        permission: &str,
        implies: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        locks::acquire_namespace_lock(&mut tx, namespace).await?;

        let deleted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            DELETE FROM hierarchy_rules
            WHERE namespace = $1 AND resource_type = $2 AND permission = $3 AND implies = $4
            RETURNING id
            "#,
        )
        .bind(namespace)
        .bind(resource_type)
        .bind(permission)
        .bind(implies)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(_) = deleted else {
            tx.commit().await?;
            return Ok(false);
        };

        let event = AuditEventBuilder::new(AuditEventType::HierarchyDeleted, namespace, Utc::now())
            .resource(resource_type, "")
            .relation(permission)
            .subject_relation(Some(implies.to_string()))
            .actor(ctx.actor_id().map(String::from), ctx.request_id().map(String::from), None)
            .build();
        self.audit.record(&mut tx, &event).await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn clear_hierarchy(&self, ctx: &RequestContext, namespace: &str, resource_type: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        locks::acquire_namespace_lock(&mut tx, namespace).await?;

        let result = sqlx::query("DELETE FROM hierarchy_rules WHERE namespace = $1 AND resource_type = $2")
            .bind(namespace)
            .bind(resource_type)
            .execute(&mut *tx)
            .await?;

        let count = result.rows_affected();
        if count > 0 {
            let event = AuditEventBuilder::new(AuditEventType::HierarchyDeleted, namespace, Utc::now())
                .resource(resource_type, "*")
                .actor(ctx.actor_id().map(String::from), ctx.request_id().map(String::from), None)
                .build();
            self.audit.record(&mut tx, &event).await?;
        }

        tx.commit().await?;
        Ok(count)
    }

    pub async fn rules_for_resource_type(&self, namespace: &str, resource_type: &str) -> Result<Vec<HierarchyRule>> {
        Ok(sqlx::query_as::<_, HierarchyRule>(
            "SELECT * FROM hierarchy_rules WHERE namespace = $1 AND resource_type = $2",
        )
        .bind(namespace)
        .bind(resource_type)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Permissions that imply `x` directly — walking backward from `x`
    /// toward whatever already implies it, used both by the cycle
    /// detector (does `implies` already transitively imply `permission`?)
    /// and is the mirror of `implies_of` used in fixed-point expansion.
    pub(crate) async fn implied_by(
        &self,
        namespace: String,
        resource_type: String,
        x: (String, String),
    ) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT implies FROM hierarchy_rules WHERE namespace = $1 AND resource_type = $2 AND permission = $3",
        )
        .bind(&namespace)
        .bind(&resource_type)
        .bind(&x.1)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(implies,)| (resource_type.clone(), implies)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebac_context::RequestContext;
    use rebac_models::hierarchy::WriteHierarchyRuleRequest;
    use rebac_models::validation::Namespace;

    async fn test_store() -> HierarchyStore {
        let db = rebac_database::Database::new(rebac_database::DatabaseConfig::from_env())
            .await
            .expect("failed to connect to database");
        let pool = db.pool().clone();
        HierarchyStore::new(pool.clone(), AuditSink::new(pool))
    }

    fn rule(namespace: &str, permission: &str, implies: &str) -> WriteHierarchyRule {
        WriteHierarchyRuleRequest {
            namespace: namespace.to_string(),
            resource_type: "repo".to_string(),
            permission: permission.to_string(),
            implies: implies.to_string(),
        }
        .validate()
        .expect("valid test rule")
    }

    fn ctx(namespace: &str) -> RequestContext {
        RequestContext::new(Namespace::parse(namespace).unwrap())
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn add_hierarchy_is_idempotent_on_rule_id() {
        let store = test_store().await;
        let c = ctx("acme_hier_idem");
        let first = store.add_hierarchy(&c, rule("acme_hier_idem", "admin", "write")).await.expect("first add");
        let second = store.add_hierarchy(&c, rule("acme_hier_idem", "admin", "write")).await.expect("second add");
        assert_eq!(first.id, second.id, "re-adding the same rule must resolve to the same rule id");
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn rejects_rule_that_would_close_an_implication_cycle() {
        let store = test_store().await;
        let c = ctx("acme_hier_cycle");
        store
            .add_hierarchy(&c, rule("acme_hier_cycle", "admin", "write"))
            .await
            .expect("admin implies write should succeed");

        let result = store.add_hierarchy(&c, rule("acme_hier_cycle", "write", "admin")).await;
        assert!(result.is_err(), "closing the implication cycle must be rejected");
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn remove_hierarchy_on_absent_rule_returns_false() {
        let store = test_store().await;
        let c = ctx("acme_hier_remove");
        let removed = store
            .remove_hierarchy(&c, "acme_hier_remove", "repo", "admin", "write")
            .await
            .expect("remove should not error on an absent rule");
        assert!(!removed);
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn clear_hierarchy_removes_all_rules_for_resource_type() {
        let store = test_store().await;
        let c = ctx("acme_hier_clear");
        store.add_hierarchy(&c, rule("acme_hier_clear", "admin", "write")).await.expect("add admin->write");
        store.add_hierarchy(&c, rule("acme_hier_clear", "write", "read")).await.expect("add write->read");

        let cleared = store.clear_hierarchy(&c, "acme_hier_clear", "repo").await.expect("clear should succeed");
        assert_eq!(cleared, 2);

        let remaining = store
            .rules_for_resource_type("acme_hier_clear", "repo")
            .await
            .expect("read should succeed");
        assert!(remaining.is_empty());
    }
}
