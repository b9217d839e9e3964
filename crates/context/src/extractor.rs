//! Axum extractors that build the pieces of a [`crate::RequestContext`]
//! from request headers, mirroring the header set the reverse-proxy
//! forward-auth pattern uses: `X-Tenant-ID`, `X-Request-Id`, `X-Actor-Id`,
//! `X-Reason`.

use std::net::IpAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use rebac_models::{Namespace, ValidationError};

use crate::context::ActorContext;

pub const NAMESPACE_HEADER: &str = "x-tenant-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const REASON_HEADER: &str = "x-reason";

/// Extracts and validates the tenant namespace from `X-Tenant-ID`.
#[derive(Debug, Clone)]
pub struct NamespaceHeader(pub Namespace);

impl<S> FromRequestParts<S> for NamespaceHeader
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(NAMESPACE_HEADER)
            .ok_or((StatusCode::BAD_REQUEST, format!("missing {NAMESPACE_HEADER} header")))?
            .to_str()
            .map_err(|_| (StatusCode::BAD_REQUEST, format!("{NAMESPACE_HEADER} header is not valid utf-8")))?;

        Namespace::parse(raw)
            .map(NamespaceHeader)
            .map_err(|e: ValidationError| (StatusCode::BAD_REQUEST, format!("{NAMESPACE_HEADER}: {e}")))
    }
}

/// Best-effort actor attribution: absent or malformed headers degrade to
/// `None` fields rather than rejecting the request. The namespace is the
/// only extractor allowed to fail the request.
#[derive(Debug, Clone)]
pub struct ActorHeaders(pub ActorContext);

impl<S> FromRequestParts<S> for ActorHeaders
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header_str = |name: &str| -> Option<String> {
            parts.headers.get(name)?.to_str().ok().map(str::to_string)
        };

        let ip_address: Option<IpAddr> = ConnectInfo::<std::net::SocketAddr>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr.ip());

        let user_agent = header_str(axum::http::header::USER_AGENT.as_str());

        let actor = ActorContext {
            actor_id: header_str(ACTOR_ID_HEADER),
            request_id: header_str(REQUEST_ID_HEADER),
            reason: header_str(REASON_HEADER),
            ip_address,
            user_agent,
        };

        Ok(ActorHeaders(actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn namespace_header_rejects_missing_header() {
        let req = Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        let result = NamespaceHeader::from_request_parts(&mut parts, &()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn namespace_header_accepts_valid_namespace() {
        let req = Request::builder()
            .header(NAMESPACE_HEADER, "acme")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let NamespaceHeader(ns) = NamespaceHeader::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ns.as_str(), "acme");
    }
}
