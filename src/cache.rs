//! Response caching.
//!
//! - [`TtlCache`]: scope-agnostic key/value store with per-entry expiry and an optional LRU
//!   capacity bound.
//! - [`CacheRegistry`]: explicit home of caches shared by every client of one class.
//! - [`CacheInterceptor`]: pipeline stage answering from the cache and storing fresh
//!   successful responses.
//!
//! Whether a cache is private to one client or shared across a class is decided by
//! [`CacheOptions`], never by the store itself.

pub mod middleware;
pub mod registry;
pub mod store;

pub use middleware::{CacheInterceptor, CacheOptions, CacheScope};
pub use registry::CacheRegistry;
pub use store::TtlCache;

use crate::response::Response;

/// Cache of raw responses keyed by [`Request::cache_key`](crate::Request::cache_key).
pub type ResponseCache = TtlCache<String, Response>;
