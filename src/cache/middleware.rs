use crate::cache::ResponseCache;
use crate::error::{BuildError, Result};
use crate::pipeline::{Context, Interceptor};
use crate::response::Response;
use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which cache instance a call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheScope {
    /// One cache per client object and endpoint.
    #[default]
    Client,
    /// One cache per client class and endpoint, held by a [`CacheRegistry`](super::CacheRegistry).
    Class,
}

/// Cache configuration for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    ttl: Option<Duration>,
    scope: CacheScope,
    capacity: Option<NonZeroUsize>,
}

impl CacheOptions {
    /// Private cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl: Some(ttl), scope: CacheScope::Client, capacity: None }
    }

    /// Private cache whose entries never expire.
    pub fn forever() -> Self {
        Self { ttl: None, scope: CacheScope::Client, capacity: None }
    }

    /// Share the cache across every client of the same class.
    pub fn shared(mut self) -> Self {
        self.scope = CacheScope::Class;
        self
    }

    /// Bound the number of entries.
    ///
    /// # Errors
    /// [`BuildError::ZeroCacheCapacity`] for `0`.
    pub fn capacity(mut self, capacity: usize) -> std::result::Result<Self, BuildError> {
        self.capacity = Some(NonZeroUsize::new(capacity).ok_or(BuildError::ZeroCacheCapacity)?);
        Ok(self)
    }

    /// Entry lifetime; `None` never expires.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Cache scope.
    pub fn scope(&self) -> CacheScope {
        self.scope
    }

    /// Capacity bound, if any.
    pub fn max_entries(&self) -> Option<NonZeroUsize> {
        self.capacity
    }
}

/// Answers from the cache when it can; otherwise proceeds and stores successful responses.
///
/// Errors are never cached.
#[derive(Debug, Clone)]
pub struct CacheInterceptor {
    options: CacheOptions,
}

impl CacheInterceptor {
    /// Interceptor with the given options.
    pub fn new(options: CacheOptions) -> Self {
        Self { options }
    }

    fn cache_for(&self, ctx: &Context) -> Result<Arc<ResponseCache>> {
        let client = ctx.client();
        match self.options.scope {
            CacheScope::Client => Ok(client.private_cache(ctx.endpoint(), self.options.capacity)),
            CacheScope::Class => client.shared_cache(ctx.endpoint(), self.options.capacity),
        }
    }
}

#[async_trait]
impl Interceptor for CacheInterceptor {
    async fn intercept(&self, ctx: &mut Context) -> Result<Response> {
        let cache = self.cache_for(ctx)?;
        let key = ctx.request().cache_key();

        if let Some(hit) = cache.load(&key) {
            debug!(endpoint = ctx.endpoint(), key = %key, "cache hit");
            return Ok(hit);
        }
        debug!(endpoint = ctx.endpoint(), key = %key, "cache miss");

        let response = ctx.proceed().await?;
        cache.store(key, response.clone(), self.options.ttl);
        Ok(response)
    }
}
