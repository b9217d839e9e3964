pub mod context;
pub mod extractor;

pub use context::{ActorContext, RequestContext};
pub use extractor::{ActorHeaders, NamespaceHeader, ACTOR_ID_HEADER, NAMESPACE_HEADER, REASON_HEADER, REQUEST_ID_HEADER};
