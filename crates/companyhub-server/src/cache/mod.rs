//! Per-replica company cache.
//!
//! The cache is a disposable projection of the store: request handlers fill
//! it on read misses and the event consumer folds log events into it. It has
//! no TTL and no eviction; entries leave only through a local delete, a
//! local invalidation or a `DELETE` event.

mod local;

pub use local::{CacheStats, LocalCache};
