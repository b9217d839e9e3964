//! The tuple store: the write path for relationship tuples (§4.3/§4.6) and
//! the read helpers the evaluator and cycle detector use to walk the
//! group-membership and resource-containment graphs.

use chrono::Utc;
use rebac_context::RequestContext;
use rebac_models::audit::{AuditEventBuilder, AuditEventType};
use rebac_models::tuple::{
    is_reserved_relation, RelationTuple, TupleKey, WriteTuple, RELATION_MEMBER, RELATION_PARENT,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::cycle::{reject_if_would_cycle, Endpoint};
use crate::error::{EngineError, Result};
use crate::locks;

#[derive(Clone)]
pub struct TupleStore {
    pool: PgPool,
    audit: AuditSink,
}

impl TupleStore {
    pub fn new(pool: PgPool, audit: AuditSink) -> Self {
        Self { pool, audit }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// `write_tuple` — §4.6's end-to-end sequence: validate, serialize on
    /// the namespace, cycle-check reserved relations under dual-endpoint
    /// locks, upsert, emit exactly one audit event in the same
    /// transaction.
    pub async fn write_tuple(&self, ctx: &RequestContext, input: WriteTuple) -> Result<RelationTuple> {
        if let Some(exp) = input.expires_at {
            if exp <= Utc::now() {
                return Err(EngineError::precondition("write_tuple", "expires_at must not be in the past"));
            }
        }

        let namespace = input.namespace.as_str();
        if ctx.namespace().as_str() != namespace {
            tracing::warn!(
                active = %ctx.namespace(),
                requested = %namespace,
                "write_tuple: explicit namespace disagrees with the active tenant context; results will be scoped to the active tenant",
            );
        }

        let relation = input.relation.as_str().to_string();
        let u: Endpoint = (input.resource_type.as_str().to_string(), input.resource_id.as_str().to_string());
        let v: Endpoint = (input.subject_type.as_str().to_string(), input.subject_id.as_str().to_string());

        // Hold the namespace lock, and for reserved relations the
        // dual-endpoint locks, across both the cycle check and the
        // insert below: the lock must still be held when we commit, or a
        // concurrent writer could interleave between our check and our
        // insert.
        let mut tx = self.pool.begin().await?;
        locks::acquire_namespace_lock(&mut tx, namespace).await?;

        if is_reserved_relation(&relation) {
            locks::acquire_dual_endpoint_locks(&mut tx, &endpoint_key(&u), &endpoint_key(&v)).await?;

            // Neighbor lookups read via the pool, not `tx`: safe, because
            // holding the endpoint locks blocks every other writer that
            // would touch these endpoints, and we haven't written
            // anything in `tx` yet ourselves.
            if relation == RELATION_MEMBER && input.subject_type.as_str() != "user" {
                // `u` (resource) contains `v` (subject) here, the opposite
                // orientation from `parent` below: the cycle to reject is
                // the subject already transitively containing the
                // resource, so the walk starts at `u` via `who_contains`
                // looking for `v`.
                let ns = namespace.to_string();
                reject_if_would_cycle("write_tuple", v.clone(), u.clone(), |x| self.who_contains(ns.clone(), x)).await?;
            } else if relation == RELATION_PARENT {
                let ns = namespace.to_string();
                reject_if_would_cycle("write_tuple", u.clone(), v.clone(), |x| self.parent_of(ns.clone(), x)).await?;
            }
        }

        let subject_relation = input.subject_relation.as_ref().map(|r| r.as_str().to_string());

        let row: (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO relation_tuples
                (id, namespace, resource_type, resource_id, relation,
                 subject_type, subject_id, subject_relation, expires_at, created_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (namespace, resource_type, resource_id, relation, subject_type, subject_id, (COALESCE(subject_relation, '')))
            DO UPDATE SET expires_at = EXCLUDED.expires_at
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(namespace)
        .bind(input.resource_type.as_str())
        .bind(input.resource_id.as_str())
        .bind(&relation)
        .bind(input.subject_type.as_str())
        .bind(input.subject_id.as_str())
        .bind(&subject_relation)
        .bind(input.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        let (tuple_id, inserted) = row;

        let event_type = if inserted { AuditEventType::TupleCreated } else { AuditEventType::TupleUpdated };
        let event = AuditEventBuilder::new(event_type, namespace, Utc::now())
            .resource(input.resource_type.as_str(), input.resource_id.as_str())
            .relation(&relation)
            .subject(input.subject_type.as_str(), input.subject_id.as_str())
            .subject_relation(subject_relation.clone())
            .tuple_id(tuple_id)
            .expires_at(input.expires_at)
            .actor(
                ctx.actor_id().map(String::from),
                ctx.request_id().map(String::from),
                ctx.actor().and_then(|a| a.reason.clone()),
            )
            .connection(ctx.actor().and_then(|a| a.ip_address), ctx.actor().and_then(|a| a.user_agent.clone()))
            .build();
        self.audit.record(&mut tx, &event).await?;

        tx.commit().await?;

        tracing::info!(namespace, relation = %relation, tuple_id = %tuple_id, "wrote tuple");

        self.fetch_by_id(tuple_id).await?.ok_or_else(|| {
            EngineError::integrity("write_tuple", "tuple vanished immediately after commit")
        })
    }

    /// `delete_tuple` — exact key match including `subject_relation`.
    /// Returns whether a row was found; never errors on "not found".
    pub async fn delete_tuple(&self, ctx: &RequestContext, key: TupleKey) -> Result<bool> {
        let namespace = key.namespace.as_str();
        let subject_relation = key.subject_relation_key().to_string();
        let subject_relation = if subject_relation.is_empty() { None } else { Some(subject_relation) };

        let mut tx = self.pool.begin().await?;
        locks::acquire_namespace_lock(&mut tx, namespace).await?;

        let deleted: Option<(Uuid, Option<chrono::DateTime<Utc>>)> = sqlx::query_as(
            r#"
            DELETE FROM relation_tuples
            WHERE namespace = $1 AND resource_type = $2 AND resource_id = $3 AND relation = $4
              AND subject_type = $5 AND subject_id = $6
              AND COALESCE(subject_relation, '') = COALESCE($7, '')
            RETURNING id, expires_at
            "#,
        )
        .bind(namespace)
        .bind(key.resource_type.as_str())
        .bind(key.resource_id.as_str())
        .bind(key.relation.as_str())
        .bind(key.subject_type.as_str())
        .bind(key.subject_id.as_str())
        .bind(&subject_relation)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((tuple_id, expires_at)) = deleted else {
            tx.commit().await?;
            return Ok(false);
        };

        let event = AuditEventBuilder::new(AuditEventType::TupleDeleted, namespace, Utc::now())
            .resource(key.resource_type.as_str(), key.resource_id.as_str())
            .relation(key.relation.as_str())
            .subject(key.subject_type.as_str(), key.subject_id.as_str())
            .subject_relation(subject_relation)
            .tuple_id(tuple_id)
            .expires_at(expires_at)
            .actor(
                ctx.actor_id().map(String::from),
                ctx.request_id().map(String::from),
                ctx.actor().and_then(|a| a.reason.clone()),
            )
            .build();
        self.audit.record(&mut tx, &event).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// `bulk_write` — inserts many tuples sharing `(resource, relation,
    /// subject_type)` with a single validation pass and a single lock
    /// acquire. Forbidden for reserved relations since cycle detection
    /// needs per-edge analysis.
    pub async fn bulk_write(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        resource_id: &str,
        relation: &str,
        subject_type: &str,
        subject_ids: &[String],
    ) -> Result<usize> {
        if is_reserved_relation(relation) {
            return Err(EngineError::precondition(
                "bulk_write",
                "bulk path cannot create reserved-relation (member/parent) edges",
            ));
        }

        let namespace = ctx.namespace().as_str().to_string();
        let mut tx = self.pool.begin().await?;
        locks::acquire_namespace_lock(&mut tx, &namespace).await?;

        let mut count = 0usize;
        for subject_id in subject_ids {
            let row: (Uuid, bool) = sqlx::query_as(
                r#"
                INSERT INTO relation_tuples
                    (id, namespace, resource_type, resource_id, relation, subject_type, subject_id, subject_relation, expires_at, created_at)
                VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, NULL, NULL, now())
                ON CONFLICT (namespace, resource_type, resource_id, relation, subject_type, subject_id, (COALESCE(subject_relation, '')))
                DO UPDATE SET expires_at = relation_tuples.expires_at
                RETURNING id, (xmax = 0) AS inserted
                "#,
            )
            .bind(&namespace)
            .bind(resource_type)
            .bind(resource_id)
            .bind(relation)
            .bind(subject_type)
            .bind(subject_id)
            .fetch_one(&mut *tx)
            .await?;

            let (tuple_id, inserted) = row;
            if inserted {
                count += 1;
                let event = AuditEventBuilder::new(AuditEventType::TupleCreated, &namespace, Utc::now())
                    .resource(resource_type, resource_id)
                    .relation(relation)
                    .subject(subject_type, subject_id.as_str())
                    .tuple_id(tuple_id)
                    .actor(ctx.actor_id().map(String::from), ctx.request_id().map(String::from), None)
                    .build();
                self.audit.record(&mut tx, &event).await?;
            }
        }

        tx.commit().await?;
        Ok(count)
    }

    pub async fn fetch_by_id(&self, id: Uuid) -> Result<Option<RelationTuple>> {
        Ok(sqlx::query_as::<_, RelationTuple>("SELECT * FROM relation_tuples WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn tuples_for_resource(&self, namespace: &str, resource_type: &str, resource_id: &str) -> Result<Vec<RelationTuple>> {
        Ok(sqlx::query_as::<_, RelationTuple>(
            r#"
            SELECT * FROM relation_tuples
            WHERE namespace = $1 AND resource_type = $2 AND resource_id = $3
              AND (expires_at IS NULL OR expires_at > now())
            ORDER BY created_at DESC
            "#,
        )
        .bind(namespace)
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn tuples_for_subject(&self, namespace: &str, subject_type: &str, subject_id: &str) -> Result<Vec<RelationTuple>> {
        Ok(sqlx::query_as::<_, RelationTuple>(
            r#"
            SELECT * FROM relation_tuples
            WHERE namespace = $1 AND subject_type = $2 AND subject_id = $3
              AND (expires_at IS NULL OR expires_at > now())
            ORDER BY created_at DESC
            "#,
        )
        .bind(namespace)
        .bind(subject_type)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// "Who contains `x`?" — groups that already list `x` as a `member`.
    /// Used both by the cycle detector and the evaluator's upward group
    /// expansion.
    pub(crate) async fn who_contains(&self, namespace: String, x: Endpoint) -> Result<Vec<Endpoint>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT resource_type, resource_id FROM relation_tuples
            WHERE namespace = $1 AND relation = 'member' AND subject_type = $2 AND subject_id = $3
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(&namespace)
        .bind(&x.0)
        .bind(&x.1)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// `x`'s existing parent(s), following `parent` edges upward.
    pub(crate) async fn parent_of(&self, namespace: String, x: Endpoint) -> Result<Vec<Endpoint>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT subject_type, subject_id FROM relation_tuples
            WHERE namespace = $1 AND relation = 'parent' AND resource_type = $2 AND resource_id = $3
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(&namespace)
        .bind(&x.0)
        .bind(&x.1)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

}

fn endpoint_key(e: &Endpoint) -> String {
    format!("{}:{}", e.0, e.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebac_context::RequestContext;
    use rebac_models::validation::Namespace;

    async fn test_store() -> TupleStore {
        let db = rebac_database::Database::new(rebac_database::DatabaseConfig::from_env())
            .await
            .expect("failed to connect to database");
        let pool = db.pool().clone();
        TupleStore::new(pool.clone(), AuditSink::new(pool))
    }

    fn write(namespace: &str, resource_id: &str, relation: &str, subject_type: &str, subject_id: &str) -> WriteTuple {
        rebac_models::tuple::WriteTupleRequest {
            namespace: namespace.to_string(),
            resource_type: "team".to_string(),
            resource_id: resource_id.to_string(),
            relation: relation.to_string(),
            subject_type: subject_type.to_string(),
            subject_id: subject_id.to_string(),
            subject_relation: None,
            expires_at: None,
        }
        .validate()
        .expect("valid test tuple input")
    }

    fn ctx(namespace: &str) -> RequestContext {
        RequestContext::new(Namespace::parse(namespace).unwrap())
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn write_then_read_round_trip() {
        let store = test_store().await;
        let c = ctx("acme_tuple_rt");
        let tuple = store
            .write_tuple(&c, write("acme_tuple_rt", "eng", RELATION_MEMBER, "user", "alice"))
            .await
            .expect("write should succeed");

        let fetched = store
            .tuples_for_resource("acme_tuple_rt", "team", "eng")
            .await
            .expect("read should succeed");
        assert!(fetched.iter().any(|t| t.id == tuple.id));
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn write_twice_is_idempotent_on_tuple_id() {
        let store = test_store().await;
        let c = ctx("acme_tuple_idem");
        let first = store
            .write_tuple(&c, write("acme_tuple_idem", "eng", "read", "user", "bob"))
            .await
            .expect("first write");
        let second = store
            .write_tuple(&c, write("acme_tuple_idem", "eng", "read", "user", "bob"))
            .await
            .expect("second write");
        assert_eq!(first.id, second.id, "re-writing the same key must resolve to the same tuple id");
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn delete_absent_returns_false() {
        let store = test_store().await;
        let c = ctx("acme_tuple_del");
        let key = TupleKey {
            namespace: Namespace::parse("acme_tuple_del").unwrap(),
            resource_type: rebac_models::validation::Identifier::parse("team").unwrap(),
            resource_id: rebac_models::validation::FreeFormId::parse("ghost").unwrap(),
            relation: rebac_models::validation::Identifier::parse("read").unwrap(),
            subject_type: rebac_models::validation::Identifier::parse("user").unwrap(),
            subject_id: rebac_models::validation::FreeFormId::parse("nobody").unwrap(),
            subject_relation: None,
        };
        let deleted = store.delete_tuple(&c, key).await.expect("delete should not error on absent key");
        assert!(!deleted);
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn rejects_member_edge_that_would_close_a_cycle() {
        let store = test_store().await;
        let c = ctx("acme_tuple_cycle");
        store
            .write_tuple(&c, write("acme_tuple_cycle", "a", RELATION_MEMBER, "team", "b"))
            .await
            .expect("a member-of b should succeed");

        let result = store
            .write_tuple(&c, write("acme_tuple_cycle", "b", RELATION_MEMBER, "team", "a"))
            .await;
        assert!(result.is_err(), "closing the membership cycle must be rejected");
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn tuples_are_isolated_by_namespace() {
        let store = test_store().await;
        let c = ctx("acme_tuple_ns_a");
        store
            .write_tuple(&c, write("acme_tuple_ns_a", "eng", "read", "user", "carol"))
            .await
            .expect("write under namespace a");

        let visible_in_other_ns = store
            .tuples_for_resource("acme_tuple_ns_b", "team", "eng")
            .await
            .expect("read should succeed");
        assert!(visible_in_other_ns.is_empty(), "a tuple written under one namespace must not leak into another");
    }
}
