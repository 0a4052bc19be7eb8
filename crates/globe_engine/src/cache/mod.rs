//! GPU resource caching
//!
//! A generic LRU cache plus its render-resource specialization, which owns
//! the eviction-to-disposal handoff and the retrieval-completion handoff.

pub mod lru;
pub mod resource_cache;

pub use lru::{KeyedLruCache, PutResult};
pub use resource_cache::{CacheStats, GpuResource, RenderResourceCache, ResourceKey, TextKey};
