//! `RequestContext` — explicit, immutable per-call context carrying the
//! tenant boundary and actor metadata. Every engine operation threads one
//! of these through explicitly rather than reading it from ambient/session
//! state: the namespace an operation runs against, and who asked, must
//! both be visible at the call site.

use std::net::IpAddr;

use rebac_models::Namespace;

/// Who is making the call, for audit attribution. Every field is optional:
/// system-initiated maintenance jobs carry a bare `RequestContext` with no
/// actor at all.
#[derive(Debug, Clone, Default)]
pub struct ActorContext {
    pub actor_id: Option<String>,
    pub request_id: Option<String>,
    pub reason: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ActorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_connection(mut self, ip_address: Option<IpAddr>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// The namespace an operation runs against, plus who's asking. Construct
/// one per call; never stash it in a shared/session-scoped slot.
#[derive(Debug, Clone)]
pub struct RequestContext {
    namespace: Namespace,
    actor: Option<ActorContext>,
}

impl RequestContext {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: ActorContext) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn actor(&self) -> Option<&ActorContext> {
        self.actor.as_ref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor.as_ref().and_then(|a| a.actor_id.as_deref())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.actor.as_ref().and_then(|a| a.request_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_context_without_actor_has_no_actor_id() {
        let ctx = RequestContext::new(Namespace::parse("acme").unwrap());
        assert_eq!(ctx.actor_id(), None);
        assert_eq!(ctx.namespace().as_str(), "acme");
    }

    #[test]
    fn request_context_carries_actor_fields() {
        let actor = ActorContext::new()
            .with_actor_id("user:alice")
            .with_request_id("req-1")
            .with_reason("support ticket #42");
        let ctx = RequestContext::new(Namespace::parse("acme").unwrap()).with_actor(actor);
        assert_eq!(ctx.actor_id(), Some("user:alice"));
        assert_eq!(ctx.request_id(), Some("req-1"));
    }
}
