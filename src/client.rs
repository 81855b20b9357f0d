//! Client objects.
//!
//! A [`Client`] owns the transport and everything that is per client object: authentication
//! hooks, default headers, and the private response caches of its endpoints. Endpoints are
//! declared separately and called *through* a client, so one declaration serves any number of
//! clients.
//!
//! Clients are cheap handles: clones share the same transport and caches. The transport is
//! closed exactly once, by [`Client::close`] or when the last handle is dropped, whichever
//! comes first.

use crate::cache::{CacheRegistry, ResponseCache, TtlCache};
use crate::clock::{Clock, MonotonicClock};
use crate::error::{BuildError, PipelineError, Result};
use crate::request::Request;
use crate::transport::Transport;
use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use parking_lot::Mutex;
use serde::Deserialize;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Stable identity of a client class, used to key shared caches.
#[derive(Clone, Copy)]
pub struct ClassId {
    id: TypeId,
    name: &'static str,
}

impl ClassId {
    /// Identity of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }

    /// Type name, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassId {}

impl Hash for ClassId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.name)
    }
}

/// Per-client hooks invoked by the pipeline.
#[async_trait]
pub trait ClientHooks: Send + Sync + fmt::Debug {
    /// Add credentials to an outgoing request. Called by the auth interceptor on every attempt.
    async fn authenticate(&self, request: &mut Request) -> Result<()> {
        let _ = request;
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl ClientHooks for NoHooks {}

/// Declarative client settings, loadable with serde.
///
/// ```rust
/// use tether::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(
///     r#"{ "default_headers": { "user-agent": "tether-demo" }, "cache_capacity": 128 }"#,
/// )
/// .unwrap();
/// assert_eq!(config.cache_capacity, Some(128));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Headers added to every request unless the request already sets them.
    pub default_headers: BTreeMap<String, String>,
    /// Capacity bound for private caches of endpoints that do not set their own.
    pub cache_capacity: Option<usize>,
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    hooks: Arc<dyn ClientHooks>,
    class: ClassId,
    registry: Option<CacheRegistry>,
    clock: Arc<dyn Clock>,
}

impl ClientBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: ClientConfig::default(),
            hooks: Arc::new(NoHooks),
            class: ClassId::of::<Client>(),
            registry: None,
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Add one default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(name.into(), value.into());
        self
    }

    /// Authentication and other per-client hooks.
    pub fn hooks(mut self, hooks: impl ClientHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Class identity used for shared caches. Clients of the same class share them.
    pub fn class<T: ?Sized + 'static>(mut self) -> Self {
        self.class = ClassId::of::<T>();
        self
    }

    /// Registry holding shared caches. Takes precedence over the installed global registry.
    pub fn cache_registry(mut self, registry: CacheRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Clock for private cache expiry.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    /// Invalid default header names or values, or a zero cache capacity.
    pub fn build(self) -> std::result::Result<Client, BuildError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.config.default_headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| BuildError::InvalidHeader(name.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| BuildError::InvalidHeader(name.clone()))?;
            default_headers.insert(header, value);
        }
        let cache_capacity = match self.config.cache_capacity {
            Some(n) => Some(NonZeroUsize::new(n).ok_or(BuildError::ZeroCacheCapacity)?),
            None => None,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                hooks: self.hooks,
                default_headers,
                cache_capacity,
                class: self.class,
                registry: self.registry,
                clock: self.clock,
                caches: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    hooks: Arc<dyn ClientHooks>,
    default_headers: HeaderMap,
    cache_capacity: Option<NonZeroUsize>,
    class: ClassId,
    registry: Option<CacheRegistry>,
    clock: Arc<dyn Clock>,
    caches: Mutex<HashMap<String, Arc<ResponseCache>>>,
    closed: AtomicBool,
}

impl ClientInner {
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.transport.close();
        true
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if self.close() {
            info!(class = self.class.name(), "client dropped; transport closed");
        }
    }
}

/// Handle to a client object.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

/// Closes its client when dropped.
struct CloseOnDrop(Client);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl Client {
    /// Start building a client on `transport`.
    pub fn builder(transport: impl Transport + 'static) -> ClientBuilder {
        ClientBuilder::new(Arc::new(transport))
    }

    /// Start building a client on a shared transport.
    pub fn builder_shared(transport: Arc<dyn Transport>) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    /// Class identity.
    pub fn class(&self) -> ClassId {
        self.inner.class
    }

    /// The transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.inner.transport.clone()
    }

    /// The hooks.
    pub fn hooks(&self) -> Arc<dyn ClientHooks> {
        self.inner.hooks.clone()
    }

    /// True once [`Client::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the transport now. Later calls through any handle fail with
    /// [`PipelineError::ClientClosed`]. Idempotent.
    pub fn close(&self) {
        if self.inner.close() {
            info!(class = self.inner.class.name(), "client closed");
        }
    }

    /// Run `f` with this client and close it afterwards, whatever `f` returns.
    ///
    /// The client is also closed when the returned future is dropped before completion or `f`
    /// panics.
    pub async fn scoped<F, Fut, T>(self, f: F) -> T
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = CloseOnDrop(self.clone());
        f(self).await
    }

    /// Private cache of `endpoint`, created on first use.
    pub fn private_cache(
        &self,
        endpoint: &str,
        capacity: Option<NonZeroUsize>,
    ) -> Arc<ResponseCache> {
        let mut caches = self.inner.caches.lock();
        caches
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                let capacity = capacity.or(self.inner.cache_capacity);
                Arc::new(TtlCache::new(capacity).with_clock(self.inner.clock.clone()))
            })
            .clone()
    }

    /// Shared cache of `endpoint` for this client's class.
    ///
    /// # Errors
    /// [`PipelineError::SharedCacheUnavailable`] when no registry is injected or installed.
    pub fn shared_cache(
        &self,
        endpoint: &str,
        capacity: Option<NonZeroUsize>,
    ) -> Result<Arc<ResponseCache>> {
        let registry = match &self.inner.registry {
            Some(registry) => registry,
            None => CacheRegistry::global().ok_or_else(|| {
                PipelineError::SharedCacheUnavailable { endpoint: endpoint.to_string() }
            })?,
        };
        Ok(registry.get_or_create(self.inner.class, endpoint, capacity))
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PipelineError::ClientClosed.into());
        }
        Ok(())
    }

    pub(crate) fn apply_default_headers(&self, request: &mut Request) {
        let headers = request.headers_mut();
        for (name, value) in &self.inner.default_headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("class", &self.inner.class)
            .field("transport", &self.inner.transport)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
