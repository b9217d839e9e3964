//! Expiration manager (§4.8): managing `expires_at` on existing tuples
//! independent of the write path's upsert-on-conflict behavior.

use chrono::{DateTime, Duration, Utc};
use rebac_models::tuple::{RelationTuple, TupleKey};
use sqlx::PgPool;

use crate::error::{EngineError, Result};

#[derive(Clone)]
pub struct ExpirationManager {
    pool: PgPool,
}

impl ExpirationManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fails if the target tuple doesn't exist, or `expires_at` is a past
    /// timestamp.
    pub async fn set_expiration(&self, key: &TupleKey, expires_at: Option<DateTime<Utc>>) -> Result<RelationTuple> {
        if let Some(exp) = expires_at {
            if exp <= Utc::now() {
                return Err(EngineError::precondition("set_expiration", "expires_at must not be in the past"));
            }
        }

        let subject_relation = key.subject_relation_key();
        let subject_relation = if subject_relation.is_empty() { None } else { Some(subject_relation.to_string()) };

        sqlx::query_as::<_, RelationTuple>(
            r#"
            UPDATE relation_tuples
            SET expires_at = $8
            WHERE namespace = $1 AND resource_type = $2 AND resource_id = $3 AND relation = $4
              AND subject_type = $5 AND subject_id = $6
              AND COALESCE(subject_relation, '') = COALESCE($7, '')
            RETURNING *
            "#,
        )
        .bind(key.namespace.as_str())
        .bind(key.resource_type.as_str())
        .bind(key.resource_id.as_str())
        .bind(key.relation.as_str())
        .bind(key.subject_type.as_str())
        .bind(key.subject_id.as_str())
        .bind(&subject_relation)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| EngineError::precondition("set_expiration", "tuple not found"))
    }

    /// If the tuple has no expiration, errors. If already past, extends
    /// from now; otherwise adds `interval` to the current expiration.
    pub async fn extend_expiration(&self, key: &TupleKey, interval: Duration) -> Result<RelationTuple> {
        let current = self.fetch(key).await?;
        let Some(current) = current else {
            return Err(EngineError::precondition("extend_expiration", "tuple not found"));
        };

        let Some(expires_at) = current.expires_at else {
            return Err(EngineError::precondition("extend_expiration", "no expiration to extend"));
        };

        let base = if expires_at <= Utc::now() { Utc::now() } else { expires_at };
        self.set_expiration(key, Some(base + interval)).await
    }

    pub async fn clear_expiration(&self, key: &TupleKey) -> Result<RelationTuple> {
        // set_expiration rejects only past, non-null values; None is always allowed.
        self.set_expiration(key, None).await
    }

    /// Future expirations within `within`, soonest first.
    pub async fn list_expiring(&self, namespace: &str, within: Duration) -> Result<Vec<RelationTuple>> {
        let until = Utc::now() + within;
        Ok(sqlx::query_as::<_, RelationTuple>(
            r#"
            SELECT * FROM relation_tuples
            WHERE namespace = $1 AND expires_at IS NOT NULL AND expires_at > now() AND expires_at <= $2
            ORDER BY expires_at ASC
            "#,
        )
        .bind(namespace)
        .bind(until)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Physically deletes tuples past expiration. Returns the count
    /// removed.
    pub async fn cleanup_expired(&self, namespace: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM relation_tuples WHERE namespace = $1 AND expires_at < now()")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch(&self, key: &TupleKey) -> Result<Option<RelationTuple>> {
        let subject_relation = key.subject_relation_key();
        let subject_relation = if subject_relation.is_empty() { None } else { Some(subject_relation.to_string()) };

        Ok(sqlx::query_as::<_, RelationTuple>(
            r#"
            SELECT * FROM relation_tuples
            WHERE namespace = $1 AND resource_type = $2 AND resource_id = $3 AND relation = $4
              AND subject_type = $5 AND subject_id = $6
              AND COALESCE(subject_relation, '') = COALESCE($7, '')
            "#,
        )
        .bind(key.namespace.as_str())
        .bind(key.resource_type.as_str())
        .bind(key.resource_id.as_str())
        .bind(key.relation.as_str())
        .bind(key.subject_type.as_str())
        .bind(key.subject_id.as_str())
        .bind(&subject_relation)
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditSink;
    use crate::tuple::TupleStore;
    use rebac_context::RequestContext;
    use rebac_models::validation::Namespace;

    async fn pool() -> PgPool {
        let db = rebac_database::Database::new(rebac_database::DatabaseConfig::from_env())
            .await
            .expect("failed to connect to database");
        db.pool().clone()
    }

    fn ctx(namespace: &str) -> RequestContext {
        RequestContext::new(Namespace::parse(namespace).unwrap())
    }

    async fn seed_tuple(pool: &PgPool, namespace: &str, resource_id: &str, subject_id: &str, expires_at: Option<DateTime<Utc>>) -> TupleKey {
        let store = TupleStore::new(pool.clone(), AuditSink::new(pool.clone()));
        let input = rebac_models::tuple::WriteTupleRequest {
            namespace: namespace.to_string(),
            resource_type: "team".to_string(),
            resource_id: resource_id.to_string(),
            relation: "read".to_string(),
            subject_type: "user".to_string(),
            subject_id: subject_id.to_string(),
            subject_relation: None,
            expires_at,
        }
        .validate()
        .expect("valid seed tuple");
        store.write_tuple(&ctx(namespace), input).await.expect("seed write");

        TupleKey {
            namespace: Namespace::parse(namespace).unwrap(),
            resource_type: rebac_models::validation::Identifier::parse("team").unwrap(),
            resource_id: rebac_models::validation::FreeFormId::parse(resource_id).unwrap(),
            relation: rebac_models::validation::Identifier::parse("read").unwrap(),
            subject_type: rebac_models::validation::Identifier::parse("user").unwrap(),
            subject_id: rebac_models::validation::FreeFormId::parse(subject_id).unwrap(),
            subject_relation: None,
        }
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn set_expiration_rejects_past_timestamp() {
        let pool = pool().await;
        let manager = ExpirationManager::new(pool.clone());
        let key = seed_tuple(&pool, "acme_exp_past", "eng", "alice", None).await;

        let result = manager.set_expiration(&key, Some(Utc::now() - Duration::hours(1))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn list_expiring_includes_tuple_within_window() {
        let pool = pool().await;
        let manager = ExpirationManager::new(pool.clone());
        seed_tuple(&pool, "acme_exp_list", "eng", "bob", Some(Utc::now() + Duration::hours(1))).await;

        let soon = manager.list_expiring("acme_exp_list", Duration::days(1)).await.expect("list should succeed");
        assert_eq!(soon.len(), 1);

        let immediate = manager.list_expiring("acme_exp_list", Duration::minutes(1)).await.expect("list should succeed");
        assert!(immediate.is_empty(), "a tuple expiring in an hour must not show up in a one-minute window");
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn extend_expiration_errors_when_none_set() {
        let pool = pool().await;
        let manager = ExpirationManager::new(pool.clone());
        let key = seed_tuple(&pool, "acme_exp_extend", "eng", "carol", None).await;

        let result = manager.extend_expiration(&key, Duration::hours(1)).await;
        assert!(result.is_err(), "extending a tuple with no expiration must fail");
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn clear_expiration_round_trips_to_none() {
        let pool = pool().await;
        let manager = ExpirationManager::new(pool.clone());
        let key = seed_tuple(&pool, "acme_exp_clear", "eng", "dave", Some(Utc::now() + Duration::hours(1))).await;

        let cleared = manager.clear_expiration(&key).await.expect("clear should succeed");
        assert!(cleared.expires_at.is_none());
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn cleanup_expired_deletes_past_tuples() {
        let pool = pool().await;
        let manager = ExpirationManager::new(pool.clone());
        seed_tuple(&pool, "acme_exp_cleanup", "eng", "erin", Some(Utc::now() + Duration::seconds(1))).await;

        // set_expiration refuses past timestamps, so force the row past
        // expiry directly to exercise cleanup in isolation.
        sqlx::query("UPDATE relation_tuples SET expires_at = now() - interval '1 second' WHERE namespace = $1")
            .bind("acme_exp_cleanup")
            .execute(&pool)
            .await
            .expect("force-expire for test");

        let deleted = manager.cleanup_expired("acme_exp_cleanup").await.expect("cleanup should succeed");
        assert_eq!(deleted, 1);
    }
}
