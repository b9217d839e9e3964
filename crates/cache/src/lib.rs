pub mod redis_cache;
pub mod error;

pub use redis_cache::{check_cache_key, namespace_invalidation_pattern, Cache, CacheConfig};
pub use error::{CacheError, Result};
