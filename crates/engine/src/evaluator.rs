//! The evaluator: `check`, `check_any`, `check_all`, `list_resources`,
//! `list_users`, `filter_authorized`, `explain` (§4.7). A lazy evaluator —
//! every call walks live tuples, nothing is materialized.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rebac_cache::{check_cache_key, namespace_invalidation_pattern, Cache};
use sqlx::PgPool;

use crate::error::Result;
use crate::graph::MAX_DEPTH;

const MAX_HIERARCHY_ITERATIONS: usize = 100;
const DEFAULT_PAGE_SIZE: i64 = 100;
const MAX_PAGE_SIZE: i64 = 1000;
const CHECK_CACHE_TTL_SECONDS: usize = 30;

type Endpoint = (String, String);

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResourceRow {
    pub resource_type: String,
    pub resource_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SubjectRow {
    pub subject_type: String,
    pub subject_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum PathKind {
    Direct,
    Group,
    Hierarchy,
    Resource,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExplainPath {
    pub kind: PathKind,
    /// The relation directly granted to `via_subject_type`/`via_subject_id`
    /// that this path's traversal starts from.
    pub via_relation: String,
    pub via_subject_type: Option<String>,
    pub via_subject_id: Option<String>,
    pub via_membership: Option<String>,
    pub chain: Vec<String>,
}

#[derive(Clone)]
pub struct Evaluator {
    pool: PgPool,
    cache: Option<Cache>,
}

impl Evaluator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, cache: None }
    }

    pub fn with_cache(pool: PgPool, cache: Cache) -> Self {
        Self { pool, cache: Some(cache) }
    }

    pub async fn check(
        &self,
        namespace: &str,
        subject_id: &str,
        permission: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<bool> {
        if let Some(cache) = &self.cache {
            let key = check_cache_key(namespace, "user", subject_id, permission, resource_type, resource_id);
            if let Ok(Some(hit)) = cache.get::<bool>(&key).await {
                return Ok(hit);
            }
            let result = self.evaluate(namespace, subject_id, resource_type, resource_id, permission).await?;
            let _ = cache.set(&key, &result, Some(CHECK_CACHE_TTL_SECONDS)).await;
            return Ok(result);
        }

        self.evaluate(namespace, subject_id, resource_type, resource_id, permission).await
    }

    pub async fn check_any(
        &self,
        namespace: &str,
        subject_id: &str,
        permissions: &[String],
        resource_type: &str,
        resource_id: &str,
    ) -> Result<bool> {
        let granted = self.granted_permissions(namespace, subject_id, resource_type, resource_id).await?;
        Ok(permissions.iter().any(|p| granted.contains(p)))
    }

    pub async fn check_all(
        &self,
        namespace: &str,
        subject_id: &str,
        permissions: &[String],
        resource_type: &str,
        resource_id: &str,
    ) -> Result<bool> {
        if permissions.is_empty() {
            return Ok(true);
        }
        let granted = self.granted_permissions(namespace, subject_id, resource_type, resource_id).await?;
        Ok(permissions.iter().all(|p| granted.contains(p)))
    }

    /// Invalidates every cached `check` result for `namespace`. Callers on
    /// the write path should call this after any mutation, since the
    /// cache is conservative (TTL + explicit invalidation), not precise.
    pub async fn invalidate_namespace(&self, namespace: &str) -> Result<()> {
        if let Some(cache) = &self.cache {
            let pattern = namespace_invalidation_pattern(namespace);
            let _ = cache.delete_pattern(&pattern).await;
        }
        Ok(())
    }

    async fn evaluate(
        &self,
        namespace: &str,
        subject_id: &str,
        resource_type: &str,
        resource_id: &str,
        permission: &str,
    ) -> Result<bool> {
        let granted = self.granted_permissions(namespace, subject_id, resource_type, resource_id).await?;
        Ok(granted.contains(permission))
    }

    /// Steps 1-4 of §4.7: membership expansion, ancestor expansion, grant
    /// collection, hierarchy fixed-point closure. Returns the full set of
    /// permissions the subject holds on the resource.
    async fn granted_permissions(
        &self,
        namespace: &str,
        subject_id: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<HashSet<String>> {
        let memberships = self.expand_memberships(namespace, subject_id).await?;
        let ancestors = self.expand_ancestors(namespace, resource_type, resource_id).await?;
        let direct = self.collect_grants(namespace, subject_id, &memberships, &ancestors).await?;
        self.close_hierarchy(namespace, resource_type, direct).await
    }

    /// Step 1: groups containing `subject_id`, climbed upward along
    /// `member` edges. Each entry also carries the membership relation the
    /// subject (or an intermediate group) holds, for userset matching.
    async fn expand_memberships(&self, namespace: &str, subject_id: &str) -> Result<HashMap<Endpoint, Option<String>>> {
        let mut out: HashMap<Endpoint, Option<String>> = HashMap::new();
        let mut frontier: Vec<(Endpoint, Option<String>)> = self
            .member_groups_of(namespace, "user", subject_id)
            .await?
            .into_iter()
            .map(|(g, rel)| (g, rel))
            .collect();

        for (group, rel) in &frontier {
            out.insert(group.clone(), rel.clone());
        }

        let mut depth = 0;
        while !frontier.is_empty() && depth < MAX_DEPTH {
            let mut next = Vec::new();
            for (group, _rel) in frontier {
                for (outer, outer_rel) in self.member_groups_of(namespace, &group.0, &group.1).await? {
                    if !out.contains_key(&outer) {
                        out.insert(outer.clone(), outer_rel.clone());
                        next.push((outer, outer_rel));
                    }
                }
            }
            frontier = next;
            depth += 1;
        }

        Ok(out)
    }

    /// Step 2: `(resource_type, resource_id)` plus all resources reached by
    /// following `parent` edges upward.
    async fn expand_ancestors(&self, namespace: &str, resource_type: &str, resource_id: &str) -> Result<Vec<Endpoint>> {
        let start: Endpoint = (resource_type.to_string(), resource_id.to_string());
        let mut out = vec![start.clone()];
        let mut seen: HashSet<Endpoint> = HashSet::from([start.clone()]);
        let mut frontier = vec![start];
        let mut depth = 0;

        while !frontier.is_empty() && depth < MAX_DEPTH {
            let mut next = Vec::new();
            for node in frontier {
                for parent in self.parent_of(namespace, &node.0, &node.1).await? {
                    if seen.insert(parent.clone()) {
                        out.push(parent.clone());
                        next.push(parent);
                    }
                }
            }
            frontier = next;
            depth += 1;
        }

        Ok(out)
    }

    /// Step 3: direct grants plus grants via group membership, respecting
    /// userset `subject_relation` semantics.
    async fn collect_grants(
        &self,
        namespace: &str,
        subject_id: &str,
        memberships: &HashMap<Endpoint, Option<String>>,
        ancestors: &[Endpoint],
    ) -> Result<HashSet<String>> {
        let mut grants = HashSet::new();

        for (rtype, rid) in ancestors {
            let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
                r#"
                SELECT relation, subject_type, subject_id, subject_relation
                FROM relation_tuples
                WHERE namespace = $1 AND resource_type = $2 AND resource_id = $3
                  AND relation NOT IN ('member', 'parent')
                  AND (expires_at IS NULL OR expires_at > now())
                "#,
            )
            .bind(namespace)
            .bind(rtype)
            .bind(rid)
            .fetch_all(&self.pool)
            .await?;

            for (relation, subject_type, sid, subject_relation) in rows {
                if subject_type == "user" && sid == subject_id {
                    grants.insert(relation);
                    continue;
                }

                if let Some(membership_relation) = memberships.get(&(subject_type, sid)) {
                    let matches = match &subject_relation {
                        None => true,
                        Some(r) => membership_relation.as_deref() == Some(r.as_str()),
                    };
                    if matches {
                        grants.insert(relation);
                    }
                }
            }
        }

        Ok(grants)
    }

    /// Step 4: fixed-point closure over the hierarchy's `(permission,
    /// implies)` edges for `resource_type`, bounded at
    /// [`MAX_HIERARCHY_ITERATIONS`].
    async fn close_hierarchy(&self, namespace: &str, resource_type: &str, seed: HashSet<String>) -> Result<HashSet<String>> {
        let mut current = seed;
        for _ in 0..MAX_HIERARCHY_ITERATIONS {
            let mut next = current.clone();
            for permission in &current {
                for implied in self.implies_of(namespace, resource_type, permission).await? {
                    next.insert(implied);
                }
            }
            if next == current {
                return Ok(current);
            }
            current = next;
        }

        Err(crate::error::EngineError::integrity(
            "close_hierarchy",
            "hierarchy fixed-point did not converge within the iteration bound; the implication graph may contain a cycle",
        ))
    }

    /// **list_resources**: resources of `resource_type` the subject can
    /// reach `permission` on, paginated by resource id.
    pub async fn list_resources(
        &self,
        namespace: &str,
        subject_id: &str,
        resource_type: &str,
        permission: &str,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ResourceRow>> {
        let limit = if limit <= 0 { DEFAULT_PAGE_SIZE } else { limit.clamp(1, MAX_PAGE_SIZE) };
        let implying = self.implication_closure_of(namespace, resource_type, permission).await?;
        let memberships = self.expand_memberships(namespace, subject_id).await?;
        let mut granted: HashSet<String> = HashSet::new();

        // Direct grants to the subject themselves.
        let direct_rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT resource_type, resource_id FROM relation_tuples
            WHERE namespace = $1 AND resource_type = $2 AND subject_type = 'user' AND subject_id = $3
              AND relation = ANY($4)
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(namespace)
        .bind(resource_type)
        .bind(subject_id)
        .bind(implying.iter().cloned().collect::<Vec<_>>())
        .fetch_all(&self.pool)
        .await?;
        for (rtype, rid) in direct_rows {
            granted.insert(format!("{}\u{0}{}", rtype, rid));
        }

        // Grants via group membership.
        for (group_type, group_id) in memberships.keys() {
            let via_rows: Vec<(String, String)> = sqlx::query_as(
                r#"
                SELECT resource_type, resource_id FROM relation_tuples
                WHERE namespace = $1 AND resource_type = $2 AND subject_type = $3 AND subject_id = $4
                  AND relation = ANY($5)
                  AND (expires_at IS NULL OR expires_at > now())
                "#,
            )
            .bind(namespace)
            .bind(resource_type)
            .bind(group_type)
            .bind(group_id)
            .bind(implying.iter().cloned().collect::<Vec<_>>())
            .fetch_all(&self.pool)
            .await?;
            for (rtype, rid) in via_rows {
                granted.insert(format!("{}\u{0}{}", rtype, rid));
            }
        }

        // Descendant resources (via `parent`) of any granted resource,
        // matching the requested type.
        let mut all: HashSet<String> = granted.clone();
        for key in &granted {
            let (rtype, rid) = split_key(key);
            let descendants = self.descendants_of(namespace, &rtype, &rid, resource_type).await?;
            for (dtype, did) in descendants {
                all.insert(format!("{}\u{0}{}", dtype, did));
            }
        }

        let mut out: Vec<ResourceRow> = all
            .into_iter()
            .map(|key| {
                let (resource_type, resource_id) = split_key(&key);
                ResourceRow { resource_type, resource_id }
            })
            .filter(|r| r.resource_type == resource_type)
            .collect();
        out.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));

        if let Some(cursor) = cursor {
            out.retain(|r| r.resource_id.as_str() > cursor);
        }
        out.truncate(limit as usize);
        Ok(out)
    }

    /// **list_users**: subjects with `permission` on `(resource_type,
    /// resource_id)` via any ancestor, with group subjects expanded down
    /// to individual users.
    pub async fn list_users(
        &self,
        namespace: &str,
        resource_type: &str,
        resource_id: &str,
        permission: &str,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SubjectRow>> {
        let limit = if limit <= 0 { DEFAULT_PAGE_SIZE } else { limit.clamp(1, MAX_PAGE_SIZE) };
        let ancestors = self.expand_ancestors(namespace, resource_type, resource_id).await?;
        let implying = self.implication_closure_of(namespace, resource_type, permission).await?;

        let mut users: HashSet<String> = HashSet::new();
        for (rtype, rid) in &ancestors {
            let rows: Vec<(String, String)> = sqlx::query_as(
                r#"
                SELECT subject_type, subject_id FROM relation_tuples
                WHERE namespace = $1 AND resource_type = $2 AND resource_id = $3
                  AND relation = ANY($4)
                  AND (expires_at IS NULL OR expires_at > now())
                "#,
            )
            .bind(namespace)
            .bind(rtype)
            .bind(rid)
            .bind(implying.iter().cloned().collect::<Vec<_>>())
            .fetch_all(&self.pool)
            .await?;

            for (subject_type, subject_id) in rows {
                if subject_type == "user" {
                    users.insert(subject_id);
                } else {
                    for user in self.expand_group_to_users(namespace, &subject_type, &subject_id).await? {
                        users.insert(user);
                    }
                }
            }
        }

        let mut out: Vec<String> = users.into_iter().collect();
        out.sort();
        if let Some(cursor) = cursor {
            out.retain(|u| u.as_str() > cursor);
        }
        out.truncate(limit as usize);
        Ok(out.into_iter().map(|subject_id| SubjectRow { subject_type: "user".to_string(), subject_id }).collect())
    }

    /// **filter_authorized**: subset of `ids` for which `check` holds.
    /// Walked one candidate at a time; callers should keep `ids.len()`
    /// near the ~1000-candidate ceiling the evaluator is designed for.
    pub async fn filter_authorized(
        &self,
        namespace: &str,
        subject_id: &str,
        permission: &str,
        resource_type: &str,
        ids: &[String],
    ) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for id in ids {
            if self.check(namespace, subject_id, permission, resource_type, id).await? {
                out.push(id.clone());
            }
        }
        Ok(out)
    }

    /// **explain**: every justification path for access, or empty if none.
    /// Each path is tagged by its dominant traversal dimension (group
    /// membership, resource ancestry, permission hierarchy, or a bare
    /// direct grant) with a chain naming the nodes actually crossed, so the
    /// output matches what a caller would reconstruct by hand.
    pub async fn explain(
        &self,
        namespace: &str,
        subject_id: &str,
        permission: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Vec<ExplainPath>> {
        let mut paths = Vec::new();
        let ancestors = self.expand_ancestors(namespace, resource_type, resource_id).await?;
        let implying = self.implication_closure_of(namespace, resource_type, permission).await?;

        for (rtype, rid) in &ancestors {
            let is_origin = rtype == resource_type && rid == resource_id;

            let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
                r#"
                SELECT relation, subject_type, subject_id, subject_relation
                FROM relation_tuples
                WHERE namespace = $1 AND resource_type = $2 AND resource_id = $3
                  AND relation = ANY($4)
                  AND (expires_at IS NULL OR expires_at > now())
                "#,
            )
            .bind(namespace)
            .bind(rtype)
            .bind(rid)
            .bind(implying.iter().cloned().collect::<Vec<_>>())
            .fetch_all(&self.pool)
            .await?;

            for (relation, subject_type, sid, subject_relation) in rows {
                let group_chain = if subject_type == "user" {
                    None
                } else {
                    self.group_chain_to(namespace, &subject_type, &sid, subject_id).await?
                };
                let is_subject_match = if subject_type == "user" { sid == subject_id } else { group_chain.is_some() };
                if !is_subject_match {
                    continue;
                }

                let mut chain = Vec::new();
                if !is_origin {
                    if let Some(resource_chain) = self.resource_chain_to(namespace, resource_type, resource_id, rtype, rid).await? {
                        chain.extend(resource_chain);
                    }
                }
                if let Some(group_chain) = group_chain.clone() {
                    chain.extend(group_chain);
                }
                if relation != permission {
                    if let Some(hierarchy_chain) = self.hierarchy_chain_between(namespace, resource_type, &relation, permission).await? {
                        chain.extend(hierarchy_chain);
                    }
                }
                if chain.is_empty() {
                    chain.push(format!("{}:{}", resource_type, resource_id));
                }

                let kind = if subject_type != "user" {
                    PathKind::Group
                } else if !is_origin {
                    PathKind::Resource
                } else if relation != permission {
                    PathKind::Hierarchy
                } else {
                    PathKind::Direct
                };

                paths.push(ExplainPath {
                    kind,
                    via_relation: relation,
                    via_subject_type: Some(subject_type),
                    via_subject_id: Some(sid),
                    via_membership: subject_relation,
                    chain,
                });
            }
        }

        Ok(paths)
    }

    /// Human-readable rendering of `explain`'s paths, one line per path.
    pub async fn explain_text(
        &self,
        namespace: &str,
        subject_id: &str,
        permission: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Vec<String>> {
        let paths = self.explain(namespace, subject_id, permission, resource_type, resource_id).await?;
        if paths.is_empty() {
            return Ok(vec![format!(
                "{} has no path to {} on {}:{}",
                subject_id, permission, resource_type, resource_id
            )]);
        }

        Ok(paths
            .iter()
            .map(|path| {
                let kind = match path.kind {
                    PathKind::Direct => "direct",
                    PathKind::Group => "group",
                    PathKind::Hierarchy => "hierarchy",
                    PathKind::Resource => "resource",
                };
                format!(
                    "{} has {} on {}:{} ({} via {}:{}) chain: {}",
                    subject_id,
                    permission,
                    resource_type,
                    resource_id,
                    kind,
                    path.via_subject_type.as_deref().unwrap_or("?"),
                    path.via_subject_id.as_deref().unwrap_or("?"),
                    path.chain.join(" -> "),
                )
            })
            .collect())
    }

    /// Groups `x` directly belongs to via `member` edges, together with
    /// the membership's `subject_relation` (userset tag).
    async fn member_groups_of(&self, namespace: &str, subject_type: &str, subject_id: &str) -> Result<Vec<(Endpoint, Option<String>)>> {
        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT resource_type, resource_id, subject_relation FROM relation_tuples
            WHERE namespace = $1 AND relation = 'member' AND subject_type = $2 AND subject_id = $3
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(namespace)
        .bind(subject_type)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(t, id, rel)| ((t, id), rel)).collect())
    }

    async fn parent_of(&self, namespace: &str, resource_type: &str, resource_id: &str) -> Result<Vec<Endpoint>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT subject_type, subject_id FROM relation_tuples
            WHERE namespace = $1 AND relation = 'parent' AND resource_type = $2 AND resource_id = $3
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(namespace)
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn descendants_of(&self, namespace: &str, resource_type: &str, resource_id: &str, want_type: &str) -> Result<Vec<Endpoint>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT resource_type, resource_id FROM relation_tuples
            WHERE namespace = $1 AND relation = 'parent' AND subject_type = $2 AND subject_id = $3
              AND resource_type = $4
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(namespace)
        .bind(resource_type)
        .bind(resource_id)
        .bind(want_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn implies_of(&self, namespace: &str, resource_type: &str, permission: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT implies FROM hierarchy_rules WHERE namespace = $1 AND resource_type = $2 AND permission = $3",
        )
        .bind(namespace)
        .bind(resource_type)
        .bind(permission)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(i,)| i).collect())
    }

    /// All permissions that transitively imply `permission` (reverse
    /// hierarchy closure), used by `list_resources`/`list_users` to widen
    /// the relation filter to anything sufficient to grant `permission`.
    async fn implication_closure_of(&self, namespace: &str, resource_type: &str, permission: &str) -> Result<HashSet<String>> {
        let mut closure: HashSet<String> = HashSet::from([permission.to_string()]);
        for _ in 0..MAX_HIERARCHY_ITERATIONS {
            let mut next = closure.clone();
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT permission FROM hierarchy_rules WHERE namespace = $1 AND resource_type = $2 AND implies = ANY($3)",
            )
            .bind(namespace)
            .bind(resource_type)
            .bind(closure.iter().cloned().collect::<Vec<_>>())
            .fetch_all(&self.pool)
            .await?;
            for (p,) in rows {
                next.insert(p);
            }
            if next == closure {
                return Ok(closure);
            }
            closure = next;
        }
        Err(crate::error::EngineError::integrity(
            "implication_closure_of",
            "reverse hierarchy closure did not converge within the iteration bound",
        ))
    }

    async fn expand_group_to_users(&self, namespace: &str, group_type: &str, group_id: &str) -> Result<Vec<String>> {
        let mut users = Vec::new();
        let mut seen: HashSet<Endpoint> = HashSet::new();
        let mut frontier = vec![(group_type.to_string(), group_id.to_string())];
        let mut depth = 0;

        while !frontier.is_empty() && depth < MAX_DEPTH {
            let mut next = Vec::new();
            for (gtype, gid) in frontier {
                let rows: Vec<(String, String)> = sqlx::query_as(
                    r#"
                    SELECT subject_type, subject_id FROM relation_tuples
                    WHERE namespace = $1 AND relation = 'member' AND resource_type = $2 AND resource_id = $3
                      AND (expires_at IS NULL OR expires_at > now())
                    "#,
                )
                .bind(namespace)
                .bind(&gtype)
                .bind(&gid)
                .fetch_all(&self.pool)
                .await?;

                for (subject_type, subject_id) in rows {
                    if subject_type == "user" {
                        users.push(subject_id);
                    } else if seen.insert((subject_type.clone(), subject_id.clone())) {
                        next.push((subject_type, subject_id));
                    }
                }
            }
            frontier = next;
            depth += 1;
        }

        Ok(users)
    }

    /// Chain of nested groups between the directly-granted group and
    /// `user_id`, ordered from the group closest to the user up to the
    /// directly-granted group (the user itself is not a chain node).
    async fn group_chain_to(&self, namespace: &str, group_type: &str, group_id: &str, user_id: &str) -> Result<Option<Vec<String>>> {
        // Backward BFS from the direct group down to `user_id`, recording
        // the path for the explain chain.
        let mut visited: HashSet<Endpoint> = HashSet::new();
        let start: Endpoint = (group_type.to_string(), group_id.to_string());
        visited.insert(start.clone());
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(vec![start]);
        let mut depth = 0;

        while let Some(path) = queue.pop_front() {
            if depth > MAX_DEPTH {
                break;
            }
            let (gtype, gid) = path.last().unwrap().clone();
            let members = self.member_subjects_of(namespace, &gtype, &gid).await?;
            for (subject_type, subject_id) in members {
                if subject_type == "user" && subject_id == user_id {
                    let mut chain: Vec<String> = path.iter().map(|(t, id)| format!("{}:{}", t, id)).collect();
                    chain.reverse();
                    return Ok(Some(chain));
                }
                if subject_type != "user" {
                    let next_endpoint = (subject_type, subject_id);
                    if visited.insert(next_endpoint.clone()) {
                        let mut next_path = path.clone();
                        next_path.push(next_endpoint);
                        queue.push_back(next_path);
                    }
                }
            }
            depth += 1;
        }

        Ok(None)
    }

    /// Chain of resources from `(from_type, from_id)` to `(to_type, to_id)`
    /// along `parent` edges, inclusive of both ends, or `None` if `to` is
    /// not an ancestor of `from` within [`MAX_DEPTH`].
    async fn resource_chain_to(
        &self,
        namespace: &str,
        from_type: &str,
        from_id: &str,
        to_type: &str,
        to_id: &str,
    ) -> Result<Option<Vec<String>>> {
        let start: Endpoint = (from_type.to_string(), from_id.to_string());
        if start == (to_type.to_string(), to_id.to_string()) {
            return Ok(Some(vec![format!("{}:{}", from_type, from_id)]));
        }

        let mut visited: HashSet<Endpoint> = HashSet::from([start.clone()]);
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(vec![start]);
        let mut depth = 0;

        while let Some(path) = queue.pop_front() {
            if depth > MAX_DEPTH {
                break;
            }
            let (rtype, rid) = path.last().unwrap().clone();
            for parent in self.parent_of(namespace, &rtype, &rid).await? {
                if parent.0 == to_type && parent.1 == to_id {
                    let mut chain: Vec<String> = path.iter().map(|(t, id)| format!("{}:{}", t, id)).collect();
                    chain.push(format!("{}:{}", to_type, to_id));
                    return Ok(Some(chain));
                }
                if visited.insert(parent.clone()) {
                    let mut next_path = path.clone();
                    next_path.push(parent);
                    queue.push_back(next_path);
                }
            }
            depth += 1;
        }

        Ok(None)
    }

    /// Chain of permission names from `from_permission` to `to_permission`
    /// along `implies` edges, inclusive of both ends, or `None` if
    /// `to_permission` is not reached within [`MAX_DEPTH`].
    async fn hierarchy_chain_between(
        &self,
        namespace: &str,
        resource_type: &str,
        from_permission: &str,
        to_permission: &str,
    ) -> Result<Option<Vec<String>>> {
        if from_permission == to_permission {
            return Ok(Some(vec![from_permission.to_string()]));
        }

        let mut visited: HashSet<String> = HashSet::from([from_permission.to_string()]);
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(vec![from_permission.to_string()]);
        let mut depth = 0;

        while let Some(path) = queue.pop_front() {
            if depth > MAX_DEPTH {
                break;
            }
            let current = path.last().unwrap().clone();
            for implied in self.implies_of(namespace, resource_type, &current).await? {
                if implied == to_permission {
                    let mut chain = path.clone();
                    chain.push(implied);
                    return Ok(Some(chain));
                }
                if visited.insert(implied.clone()) {
                    let mut next_path = path.clone();
                    next_path.push(implied);
                    queue.push_back(next_path);
                }
            }
            depth += 1;
        }

        Ok(None)
    }

    async fn member_subjects_of(&self, namespace: &str, resource_type: &str, resource_id: &str) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT subject_type, subject_id FROM relation_tuples
            WHERE namespace = $1 AND relation = 'member' AND resource_type = $2 AND resource_id = $3
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(namespace)
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn split_key(key: &str) -> (String, String) {
    let mut parts = key.splitn(2, '\u{0}');
    let t = parts.next().unwrap_or_default().to_string();
    let id = parts.next().unwrap_or_default().to_string();
    (t, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_key_round_trips() {
        let (t, id) = split_key("team\u{0}infra");
        assert_eq!(t, "team");
        assert_eq!(id, "infra");
    }
}
