//! Pure, I/O-free graph traversal primitives shared by the cycle detector
//! and the evaluator. Each function takes a neighbor-fetch closure so it
//! can be driven by a real `PgPool` query in production and by a plain
//! `HashMap` adjacency list in tests — no database required to exercise
//! the traversal logic itself.

use std::collections::HashSet;
use std::hash::Hash;

pub const MAX_DEPTH: usize = 50;
pub const MAX_HIERARCHY_ITERATIONS: usize = 100;

/// Bounded breadth-first expansion from `start`. Returns every node
/// reached, including the start set, within `max_depth` hops.
pub fn bounded_bfs<N, F>(start: impl IntoIterator<Item = N>, max_depth: usize, mut neighbors: F) -> HashSet<N>
where
    N: Eq + Hash + Clone,
    F: FnMut(&N) -> Vec<N>,
{
    let mut visited: HashSet<N> = start.into_iter().collect();
    let mut frontier: Vec<N> = visited.iter().cloned().collect();
    let mut depth = 0;

    while !frontier.is_empty() && depth < max_depth {
        let mut next = Vec::new();
        for node in &frontier {
            for n in neighbors(node) {
                if visited.insert(n.clone()) {
                    next.push(n);
                }
            }
        }
        frontier = next;
        depth += 1;
    }

    visited
}

/// Whether `target` is reachable from `start` within `max_depth` hops.
/// Used by the cycle detector: does the existing graph already let you
/// walk from the proposed edge's far endpoint back to its near endpoint?
pub fn reaches<N, F>(start: N, target: &N, max_depth: usize, mut neighbors: F) -> bool
where
    N: Eq + Hash + Clone,
    F: FnMut(&N) -> Vec<N>,
{
    if &start == target {
        return true;
    }

    let mut visited: HashSet<N> = HashSet::new();
    visited.insert(start.clone());
    let mut frontier = vec![start];
    let mut depth = 0;

    while !frontier.is_empty() && depth < max_depth {
        let mut next = Vec::new();
        for node in &frontier {
            for n in neighbors(node) {
                if &n == target {
                    return true;
                }
                if visited.insert(n.clone()) {
                    next.push(n);
                }
            }
        }
        frontier = next;
        depth += 1;
    }

    false
}

/// The fixed-point bound was exceeded without the set converging. Under
/// the hierarchy DAG invariant this cannot happen; reaching it means the
/// invariant has already been violated elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureOverflow;

/// Iterates `set := set ∪ {implies(p) : p ∈ set}` until it stops growing,
/// bounded defensively by `max_iterations`.
pub fn fixed_point_closure<P, F>(
    seed: impl IntoIterator<Item = P>,
    max_iterations: usize,
    mut implies: F,
) -> Result<HashSet<P>, ClosureOverflow>
where
    P: Eq + Hash + Clone,
    F: FnMut(&P) -> Vec<P>,
{
    let mut set: HashSet<P> = seed.into_iter().collect();

    for _ in 0..max_iterations {
        let additions: Vec<P> = set.iter().flat_map(|p| implies(p)).collect();
        let mut grew = false;
        for a in additions {
            if set.insert(a) {
                grew = true;
            }
        }
        if !grew {
            return Ok(set);
        }
    }

    Err(ClosureOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn adjacency(edges: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in edges {
            map.entry(from.to_string()).or_default().push(to.to_string());
        }
        map
    }

    #[test]
    fn bounded_bfs_visits_all_nodes_within_depth() {
        // infra -> platform -> eng, mirrors nested team groups
        let adj = adjacency(&[("infra", "platform"), ("platform", "eng")]);
        let visited = bounded_bfs(["infra".to_string()], MAX_DEPTH, |n| adj.get(n).cloned().unwrap_or_default());
        assert!(visited.contains("infra"));
        assert!(visited.contains("platform"));
        assert!(visited.contains("eng"));
    }

    #[test]
    fn bounded_bfs_respects_depth_limit() {
        let adj = adjacency(&[("a", "b"), ("b", "c"), ("c", "d")]);
        let visited = bounded_bfs(["a".to_string()], 1, |n| adj.get(n).cloned().unwrap_or_default());
        assert!(visited.contains("a"));
        assert!(visited.contains("b"));
        assert!(!visited.contains("c"));
    }

    #[test]
    fn reaches_detects_existing_path() {
        let adj = adjacency(&[("b", "a")]);
        assert!(reaches("b".to_string(), &"a".to_string(), MAX_DEPTH, |n| {
            adj.get(n).cloned().unwrap_or_default()
        }));
    }

    #[test]
    fn reaches_returns_false_when_unreachable() {
        let adj = adjacency(&[("b", "c")]);
        assert!(!reaches("b".to_string(), &"a".to_string(), MAX_DEPTH, |n| {
            adj.get(n).cloned().unwrap_or_default()
        }));
    }

    #[test]
    fn fixed_point_closure_converges_over_implication_chain() {
        // admin -> write -> read
        let mut implies_map: HashMap<&str, Vec<&str>> = HashMap::new();
        implies_map.insert("admin", vec!["write"]);
        implies_map.insert("write", vec!["read"]);

        let closure = fixed_point_closure(["admin"], MAX_HIERARCHY_ITERATIONS, |p| {
            implies_map.get(p.as_str()).cloned().unwrap_or_default().into_iter().map(String::from).collect()
        })
        .unwrap();

        assert!(closure.contains("admin"));
        assert!(closure.contains("write"));
        assert!(closure.contains("read"));
    }

    #[test]
    fn fixed_point_closure_overflows_on_unbounded_growth() {
        // a pathological "implies" that never stops growing — simulates a
        // corrupted (non-DAG) hierarchy graph.
        let result = fixed_point_closure(["0".to_string()], 5, |p: &String| {
            vec![format!("{}x", p)]
        });
        assert_eq!(result, Err(ClosureOverflow));
    }
}
