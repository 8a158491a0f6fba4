//! # Response Cache Module
//!
//! TTL/LRU caching of remote call responses to avoid redundant invocations
//! for identical (operation, parameters) pairs within a bounded time window,
//! with bounded memory.
//!
//! Keys are order-independent: two logically identical parameter payloads
//! hash to the same key regardless of object key ordering anywhere in the
//! structure. A miss is a value, never an error; cache-side failures are
//! forced misses.

pub mod key;
pub mod response_cache;

pub use key::{cache_key, canonical_json, try_cache_key};
pub use response_cache::{
    CacheConfig, CacheEntry, CacheStatistics, CacheSweeper, ResponseCache,
};
