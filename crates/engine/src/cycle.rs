//! Cycle detection for the two graphs that must stay acyclic under
//! concurrent writers: group membership and resource containment. The
//! hierarchy implication graph is checked the same way from
//! [`crate::hierarchy`].
//!
//! The detector is async because, unlike [`crate::graph`]'s pure
//! primitives, it walks edges stored in Postgres. The traversal shape is
//! identical to `graph::reaches` — bounded BFS with an early-exit target
//! match — just with an async neighbor fetch.

use std::collections::HashSet;
use std::future::Future;

use crate::error::{EngineError, Result};
use crate::graph::MAX_DEPTH;

/// Bounded reachability check over an async neighbor-fetch closure.
/// Mirrors [`crate::graph::reaches`] but allows the neighbor lookup to hit
/// the database.
pub async fn reaches_async<N, F, Fut>(start: N, target: &N, max_depth: usize, mut neighbors: F) -> Result<bool>
where
    N: Eq + std::hash::Hash + Clone,
    F: FnMut(N) -> Fut,
    Fut: Future<Output = Result<Vec<N>>>,
{
    if &start == target {
        return Ok(true);
    }

    let mut visited: HashSet<N> = HashSet::new();
    visited.insert(start.clone());
    let mut frontier = vec![start];
    let mut depth = 0;

    while !frontier.is_empty() && depth < max_depth {
        let mut next = Vec::new();
        for node in frontier {
            for n in neighbors(node).await? {
                if &n == target {
                    return Ok(true);
                }
                if visited.insert(n.clone()) {
                    next.push(n);
                }
            }
        }
        frontier = next;
        depth += 1;
    }

    Ok(false)
}

/// A group- or resource-edge endpoint: `(type, id)`.
pub type Endpoint = (String, String);

/// Rejects the edge `u -> v` if `u == v`, otherwise runs a bounded walk
/// from `v` via `neighbors_of` and errors if it reaches `u`. Callers are
/// responsible for holding the dual-endpoint advisory locks for the
/// duration of this check plus the subsequent insert.
pub async fn reject_if_would_cycle<F, Fut>(
    operation: &str,
    u: Endpoint,
    v: Endpoint,
    neighbors_of: F,
) -> Result<()>
where
    F: FnMut(Endpoint) -> Fut,
    Fut: Future<Output = Result<Vec<Endpoint>>>,
{
    if u == v {
        return Err(EngineError::precondition(
            operation,
            "would create a circular membership/hierarchy (self-reference)",
        ));
    }

    if reaches_async(v, &u, MAX_DEPTH, neighbors_of).await? {
        return Err(EngineError::precondition(
            operation,
            "would create a circular membership/hierarchy",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn endpoint(t: &str, id: &str) -> Endpoint {
        (t.to_string(), id.to_string())
    }

    #[tokio::test]
    async fn self_edge_always_rejected() {
        let u = endpoint("team", "infra");
        let result = reject_if_would_cycle("add_member", u.clone(), u, |_| async { Ok(vec![]) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_edge_that_would_close_existing_chain() {
        // infra already contains platform (platform is a member of infra):
        // "who contains platform" -> infra.
        let mut who_contains: HashMap<Endpoint, Vec<Endpoint>> = HashMap::new();
        who_contains.insert(endpoint("team", "platform"), vec![endpoint("team", "infra")]);

        // Now platform -> infra would close the loop (infra already
        // contains platform transitively through this edge).
        let u = endpoint("team", "platform");
        let v = endpoint("team", "infra");

        let result = reject_if_would_cycle("add_member", u, v, |x: Endpoint| {
            let who_contains = who_contains.clone();
            async move { Ok(who_contains.get(&x).cloned().unwrap_or_default()) }
        })
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn allows_edge_with_no_existing_path() {
        let u = endpoint("team", "infra");
        let v = endpoint("team", "eng");
        let result = reject_if_would_cycle("add_member", u, v, |_: Endpoint| async { Ok(vec![]) }).await;
        assert!(result.is_ok());
    }
}
