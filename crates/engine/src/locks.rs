//! Postgres advisory-lock helpers backing the concurrency model: a
//! namespace-keyed lock serializing all writes to one tenant, and a
//! canonical-order dual-endpoint lock pair preventing interleaved
//! acyclicity-check-then-insert races on edge writes.
//!
//! Both are transaction-scoped (`pg_advisory_xact_lock`) and release
//! automatically on commit or rollback — no explicit unlock call needed.

use sqlx::{PgConnection, Result as SqlxResult};

/// Serializes every mutating call against `namespace`. Acquired first in
/// the write path, before any cycle check or row write.
pub async fn acquire_namespace_lock(conn: &mut PgConnection, namespace: &str) -> SqlxResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(namespace)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Locks both endpoints of a reserved-relation edge in a deterministic
/// order (`min(a, b)` then `max(a, b)` by string ordering), so two
/// transactions proposing opposite-direction edges between the same pair
/// cannot both pass their cycle check before either commits.
pub async fn acquire_dual_endpoint_locks(conn: &mut PgConnection, a: &str, b: &str) -> SqlxResult<()> {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(first)
        .execute(&mut *conn)
        .await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(second)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
