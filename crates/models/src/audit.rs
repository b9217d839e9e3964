//! Audit event — append-only, time-range-partitioned record of mutations
//! and security-relevant events.
//!
//! The event-type enum is closed and shared with the (out-of-scope)
//! authentication sibling: this crate only ever constructs the
//! `tuple_*`/`hierarchy_*` variants, but the sink and its storage must
//! accept the full set, since the partitioned audit log is shared
//! infrastructure.

use std::net::IpAddr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    UserCreated,
    UserUpdated,
    UserDisabled,
    UserEnabled,
    UserDeleted,
    PasswordUpdated,
    EmailUpdated,
    EmailVerified,
    SessionCreated,
    SessionRevoked,
    SessionsRevokedAll,
    TokenCreated,
    TokenConsumed,
    MfaAdded,
    MfaRemoved,
    MfaUsed,
    LoginAttemptFailed,
    LockoutTriggered,
    TupleCreated,
    TupleUpdated,
    TupleDeleted,
    HierarchyCreated,
    HierarchyDeleted,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCreated => "user_created",
            Self::UserUpdated => "user_updated",
            Self::UserDisabled => "user_disabled",
            Self::UserEnabled => "user_enabled",
            Self::UserDeleted => "user_deleted",
            Self::PasswordUpdated => "password_updated",
            Self::EmailUpdated => "email_updated",
            Self::EmailVerified => "email_verified",
            Self::SessionCreated => "session_created",
            Self::SessionRevoked => "session_revoked",
            Self::SessionsRevokedAll => "sessions_revoked_all",
            Self::TokenCreated => "token_created",
            Self::TokenConsumed => "token_consumed",
            Self::MfaAdded => "mfa_added",
            Self::MfaRemoved => "mfa_removed",
            Self::MfaUsed => "mfa_used",
            Self::LoginAttemptFailed => "login_attempt_failed",
            Self::LockoutTriggered => "lockout_triggered",
            Self::TupleCreated => "tuple_created",
            Self::TupleUpdated => "tuple_updated",
            Self::TupleDeleted => "tuple_deleted",
            Self::HierarchyCreated => "hierarchy_created",
            Self::HierarchyDeleted => "hierarchy_deleted",
        }
    }
}

/// Append-only audit event row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub event_time: DateTime<Utc>,
    pub event_type: String,
    pub namespace: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub relation: Option<String>,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
    pub subject_relation: Option<String>,
    pub tuple_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub actor_id: Option<String>,
    pub request_id: Option<String>,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Builder mirroring the shape of mutation context: fill in what the
/// mutation knows, let actor-context fields default from the caller's
/// request context.
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn new(event_type: AuditEventType, namespace: impl Into<String>, event_time: DateTime<Utc>) -> Self {
        Self {
            event: AuditEvent {
                event_id: Uuid::new_v4(),
                event_time,
                event_type: event_type.as_str().to_string(),
                namespace: namespace.into(),
                resource_type: None,
                resource_id: None,
                relation: None,
                subject_type: None,
                subject_id: None,
                subject_relation: None,
                tuple_id: None,
                expires_at: None,
                actor_id: None,
                request_id: None,
                reason: None,
                ip_address: None,
                user_agent: None,
            },
        }
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        self.event.resource_type = Some(resource_type.into());
        self.event.resource_id = Some(resource_id.into());
        self
    }

    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        self.event.relation = Some(relation.into());
        self
    }

    pub fn subject(mut self, subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        self.event.subject_type = Some(subject_type.into());
        self.event.subject_id = Some(subject_id.into());
        self
    }

    pub fn subject_relation(mut self, subject_relation: Option<String>) -> Self {
        self.event.subject_relation = subject_relation;
        self
    }

    pub fn tuple_id(mut self, id: Uuid) -> Self {
        self.event.tuple_id = Some(id);
        self
    }

    pub fn expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.event.expires_at = expires_at;
        self
    }

    pub fn actor(mut self, actor_id: Option<String>, request_id: Option<String>, reason: Option<String>) -> Self {
        self.event.actor_id = actor_id;
        self.event.request_id = request_id;
        self.event.reason = reason;
        self
    }

    pub fn connection(mut self, ip_address: Option<IpAddr>, user_agent: Option<String>) -> Self {
        self.event.ip_address = ip_address.map(|ip| ip.to_string());
        self.event.user_agent = user_agent;
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

/// Month-partition name: `audit_events_yYYYYmMM`. This format is part of
/// the external contract — operational tooling parses it.
pub fn partition_name(year: i32, month: u32) -> String {
    format!("audit_events_y{:04}m{:02}", year, month)
}

/// The `(year, month)` a timestamp's partition belongs to.
pub fn partition_of(ts: DateTime<Utc>) -> (i32, u32) {
    (ts.year(), ts.month())
}

/// `count` consecutive `(year, month)` pairs starting at `start`, inclusive.
pub fn month_range(start: (i32, u32), count: u32) -> Vec<(i32, u32)> {
    let mut out = Vec::with_capacity(count as usize);
    let (mut y, mut m) = start;
    for _ in 0..count {
        out.push((y, m));
        m += 1;
        if m > 12 {
            m = 1;
            y += 1;
        }
    }
    out
}

/// Months before `(end_year, end_month)` by exactly `months`, used to
/// compute retention cutoffs.
pub fn months_before(end: (i32, u32), months: u32) -> (i32, u32) {
    let (mut y, mut m) = end;
    let mut remaining = months;
    while remaining > 0 {
        if m == 1 {
            m = 12;
            y -= 1;
        } else {
            m -= 1;
        }
        remaining -= 1;
    }
    (y, m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_name_matches_external_contract_format() {
        assert_eq!(partition_name(2026, 7), "audit_events_y2026m07");
    }

    #[test]
    fn month_range_wraps_year_boundary() {
        assert_eq!(
            month_range((2025, 11), 4),
            vec![(2025, 11), (2025, 12), (2026, 1), (2026, 2)]
        );
    }

    #[test]
    fn months_before_wraps_year_boundary_backward() {
        assert_eq!(months_before((2026, 2), 4), (2025, 10));
        assert_eq!(months_before((2026, 7), 84), (2019, 11));
    }
}
