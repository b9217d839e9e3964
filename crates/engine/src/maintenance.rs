//! Maintenance (§4.10): statistics, integrity verification, and combined
//! expired-row cleanup across subsystems.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::PgPool;

use crate::error::Result;
use crate::expiration::ExpirationManager;

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub tuple_count: i64,
    pub hierarchy_rule_count: i64,
    pub distinct_user_subjects: i64,
    pub distinct_resources: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum IntegrityKind {
    GroupCycles,
    ResourceCycles,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityWarning {
    pub status: &'static str,
    pub kind: IntegrityKind,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CleanupReport {
    pub tuples_deleted: u64,
    pub hierarchy_rules_deleted: u64,
}

#[derive(Clone)]
pub struct Maintenance {
    pool: PgPool,
    expiration: ExpirationManager,
}

impl Maintenance {
    pub fn new(pool: PgPool) -> Self {
        let expiration = ExpirationManager::new(pool.clone());
        Self { pool, expiration }
    }

    pub async fn get_stats(&self, namespace: &str) -> Result<Stats> {
        let tuple_count: i64 = sqlx::query_scalar("SELECT count(*) FROM relation_tuples WHERE namespace = $1")
            .bind(namespace)
            .fetch_one(&self.pool)
            .await?;
        let hierarchy_rule_count: i64 = sqlx::query_scalar("SELECT count(*) FROM hierarchy_rules WHERE namespace = $1")
            .bind(namespace)
            .fetch_one(&self.pool)
            .await?;
        let distinct_user_subjects: i64 = sqlx::query_scalar(
            "SELECT count(DISTINCT subject_id) FROM relation_tuples WHERE namespace = $1 AND subject_type = 'user'",
        )
        .bind(namespace)
        .fetch_one(&self.pool)
        .await?;
        let distinct_resources: i64 = sqlx::query_scalar(
            "SELECT count(DISTINCT (resource_type, resource_id)) FROM relation_tuples WHERE namespace = $1",
        )
        .bind(namespace)
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats { tuple_count, hierarchy_rule_count, distinct_user_subjects, distinct_resources })
    }

    /// Full scan for cycles in the `member` and `parent` graphs. The write
    /// path prevents these under normal operation; a non-empty result
    /// points at data written outside it (manual inserts, a schema
    /// migration, restored backups).
    pub async fn verify_integrity(&self, namespace: &str) -> Result<Vec<IntegrityWarning>> {
        let mut warnings = Vec::new();

        let member_edges: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT resource_type, resource_id, subject_type, subject_id FROM relation_tuples WHERE namespace = $1 AND relation = 'member'",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;
        if let Some(cycle) = find_cycle(member_edges.into_iter().map(|(rt, ri, st, si)| ((st, si), (rt, ri)))) {
            warnings.push(IntegrityWarning { status: "warning", kind: IntegrityKind::GroupCycles, details: cycle });
        }

        let parent_edges: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT resource_type, resource_id, subject_type, subject_id FROM relation_tuples WHERE namespace = $1 AND relation = 'parent'",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;
        if let Some(cycle) = find_cycle(parent_edges.into_iter().map(|(rt, ri, st, si)| ((rt, ri), (st, si)))) {
            warnings.push(IntegrityWarning { status: "warning", kind: IntegrityKind::ResourceCycles, details: cycle });
        }

        Ok(warnings)
    }

    pub async fn cleanup_expired(&self, namespace: &str) -> Result<CleanupReport> {
        let tuples_deleted = self.expiration.cleanup_expired(namespace).await?;
        Ok(CleanupReport { tuples_deleted, hierarchy_rules_deleted: 0 })
    }
}

type Endpoint = (String, String);

/// DFS-based cycle detection over an edge list `from -> to`. Returns the
/// first cycle found as a printable chain, if any.
fn find_cycle(edges: impl Iterator<Item = (Endpoint, Endpoint)>) -> Option<Vec<String>> {
    let mut adjacency: HashMap<Endpoint, Vec<Endpoint>> = HashMap::new();
    for (from, to) in edges {
        adjacency.entry(from).or_default().push(to);
    }

    let mut visited: HashSet<Endpoint> = HashSet::new();
    let mut stack: HashSet<Endpoint> = HashSet::new();

    for node in adjacency.keys().cloned().collect::<Vec<_>>() {
        if visited.contains(&node) {
            continue;
        }
        let mut path = Vec::new();
        if let Some(cycle) = dfs(&node, &adjacency, &mut visited, &mut stack, &mut path) {
            return Some(cycle);
        }
    }

    None
}

fn dfs(
    node: &Endpoint,
    adjacency: &HashMap<Endpoint, Vec<Endpoint>>,
    visited: &mut HashSet<Endpoint>,
    stack: &mut HashSet<Endpoint>,
    path: &mut Vec<Endpoint>,
) -> Option<Vec<String>> {
    visited.insert(node.clone());
    stack.insert(node.clone());
    path.push(node.clone());

    if let Some(neighbors) = adjacency.get(node) {
        for next in neighbors {
            if stack.contains(next) {
                let start = path.iter().position(|n| n == next).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|(t, id)| format!("{}:{}", t, id)).collect();
                cycle.push(format!("{}:{}", next.0, next.1));
                return Some(cycle);
            }
            if !visited.contains(next) {
                if let Some(cycle) = dfs(next, adjacency, visited, stack, path) {
                    return Some(cycle);
                }
            }
        }
    }

    path.pop();
    stack.remove(node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_cycle_detects_a_simple_loop() {
        let edges = vec![
            (("team".to_string(), "a".to_string()), ("team".to_string(), "b".to_string())),
            (("team".to_string(), "b".to_string()), ("team".to_string(), "a".to_string())),
        ];
        let cycle = find_cycle(edges.into_iter());
        assert!(cycle.is_some());
    }

    #[test]
    fn find_cycle_returns_none_for_a_dag() {
        let edges = vec![
            (("team".to_string(), "a".to_string()), ("team".to_string(), "b".to_string())),
            (("team".to_string(), "b".to_string()), ("team".to_string(), "c".to_string())),
        ];
        assert!(find_cycle(edges.into_iter()).is_none());
    }
}
