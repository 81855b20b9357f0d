//! Endpoint declarations and bound endpoints.
//!
//! An [`Endpoint`] is the declarative description of one API method: verb, path template,
//! parameters and interceptor options. [`Endpoint::bind`] validates it once and produces a
//! [`BoundEndpoint`], which is what callers invoke through a [`Client`].
//!
//! ```rust
//! use std::time::Duration;
//! use tether::binding::{Args, Param};
//! use tether::cache::CacheOptions;
//! use tether::decode::Text;
//! use tether::{Client, Endpoint, Error, Request, Response, ServiceTransport};
//! use http::StatusCode;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let transport = ServiceTransport::new(tower::service_fn(|req: Request| async move {
//!     Ok::<_, Error>(Response::new(StatusCode::OK, req.path_and_query()))
//! }));
//! let client = Client::builder(transport).build().unwrap();
//!
//! let get_user = Endpoint::new("get_user", "/users/{login}")
//!     .param(Param::path("login"))
//!     .param(Param::query("fields"))
//!     .cache(CacheOptions::new(Duration::from_secs(60)))
//!     .bind(Text)
//!     .unwrap();
//!
//! let body = get_user.call(&client, Args::new().arg("ada").arg(None::<String>)).await.unwrap();
//! assert_eq!(body, "/users/ada");
//! # });
//! ```

use crate::auth::AuthInterceptor;
use crate::binding::{Args, BindingError, Param, RequestBuilder};
use crate::cache::{CacheInterceptor, CacheOptions};
use crate::client::Client;
use crate::decode::Decoder;
use crate::error::Result;
use crate::pipeline::{priority, ExecutionMode, Interceptor, Pipeline, ResponseCheck, TransportTerminal};
use crate::rate_limit::{RateLimitInterceptor, RateLimiter};
use crate::request::Request;
use crate::response::Response;
use crate::retry::{RetryInterceptor, RetryPolicy};
use crate::sleeper::Sleeper;
use http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const VERB_PREFIXES: [(&str, Method); 7] = [
    ("get", Method::GET),
    ("post", Method::POST),
    ("put", Method::PUT),
    ("patch", Method::PATCH),
    ("delete", Method::DELETE),
    ("head", Method::HEAD),
    ("options", Method::OPTIONS),
];

/// Verb for a method name: the matching prefix (`get_user`, `postComment`, `delete`), else GET.
///
/// A prefix only counts at a word boundary, so `poster` is a GET.
pub fn infer_method(name: &str) -> Method {
    let lower = name.to_ascii_lowercase();
    for (prefix, method) in VERB_PREFIXES {
        if !lower.starts_with(prefix) {
            continue;
        }
        match name[prefix.len()..].chars().next() {
            None => return method,
            Some(c) if !c.is_ascii_lowercase() && !c.is_ascii_digit() => return method,
            Some(_) => {}
        }
    }
    Method::GET
}

/// Declaration of one API method.
#[derive(Clone)]
pub struct Endpoint {
    name: String,
    method: Method,
    template: String,
    params: Vec<Param>,
    stages: Vec<(i32, Arc<dyn Interceptor>)>,
    check: Option<ResponseCheck>,
}

impl Endpoint {
    /// Endpoint named like the method it backs; the verb is inferred from the name.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        let name = name.into();
        let method = infer_method(&name);
        Self::with_method(name, method, template.into())
    }

    fn with_method(name: String, method: Method, template: String) -> Self {
        Self { name, method, template, params: Vec::new(), stages: Vec::new(), check: None }
    }

    fn verb(method: Method, template: impl Into<String>) -> Self {
        let template = template.into();
        Self::with_method(format!("{method} {template}"), method, template)
    }

    /// `GET template`.
    pub fn get(template: impl Into<String>) -> Self {
        Self::verb(Method::GET, template)
    }

    /// `POST template`.
    pub fn post(template: impl Into<String>) -> Self {
        Self::verb(Method::POST, template)
    }

    /// `PUT template`.
    pub fn put(template: impl Into<String>) -> Self {
        Self::verb(Method::PUT, template)
    }

    /// `PATCH template`.
    pub fn patch(template: impl Into<String>) -> Self {
        Self::verb(Method::PATCH, template)
    }

    /// `DELETE template`.
    pub fn delete(template: impl Into<String>) -> Self {
        Self::verb(Method::DELETE, template)
    }

    /// Override the verb.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Declare the next parameter. Positional arguments bind in declaration order.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Cache successful responses.
    pub fn cache(self, options: CacheOptions) -> Self {
        self.intercept(priority::CACHE, CacheInterceptor::new(options))
    }

    /// Charge `tokens` per attempt against `limiter`. Clones of a limiter share its bucket, so
    /// passing the same limiter to several endpoints limits them together.
    pub fn rate_limit(self, limiter: impl RateLimiter + 'static, tokens: f64) -> Self {
        self.intercept(priority::RATE_LIMIT, RateLimitInterceptor::new(Arc::new(limiter), tokens))
    }

    /// Like [`Endpoint::rate_limit`], but waits with `sleeper` instead of the execution mode's
    /// default.
    pub fn rate_limit_with_sleeper(
        self,
        limiter: impl RateLimiter + 'static,
        tokens: f64,
        sleeper: impl Sleeper + 'static,
    ) -> Self {
        let interceptor =
            RateLimitInterceptor::new(Arc::new(limiter), tokens).with_sleeper(Arc::new(sleeper));
        self.intercept(priority::RATE_LIMIT, interceptor)
    }

    /// Retry according to `policy`.
    pub fn retry(self, policy: RetryPolicy<Response>) -> Self {
        self.intercept(priority::RETRY, RetryInterceptor::new(policy))
    }

    /// Run the client's authentication hook before every attempt.
    pub fn authenticate(self) -> Self {
        self.intercept(priority::AUTH, AuthInterceptor)
    }

    /// Register a custom interceptor at `priority`. Equal priorities run in registration order.
    pub fn intercept(mut self, priority: i32, interceptor: impl Interceptor + 'static) -> Self {
        self.stages.push((priority, Arc::new(interceptor)));
        self
    }

    /// Replace the default status check (>= 400 is an error) with `check`.
    pub fn check_response<F>(mut self, check: F) -> Self
    where
        F: Fn(Response) -> Result<Response> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Treat every status as success.
    pub fn accept_any_status(self) -> Self {
        self.check_response(Ok)
    }

    /// Validate the declaration and attach `decoder`.
    ///
    /// # Errors
    /// Structural [`BindingError`]s: malformed template, duplicate names, several bodies,
    /// unbound placeholders.
    pub fn bind<D: Decoder>(self, decoder: D) -> std::result::Result<BoundEndpoint<D>, BindingError> {
        let builder = RequestBuilder::new(self.method, &self.template, self.params)?;
        let terminal = match self.check {
            Some(check) => TransportTerminal::with_check(check),
            None => TransportTerminal::new(),
        };
        let pipeline = self
            .stages
            .into_iter()
            .fold(Pipeline::builder(), |b, (priority, stage)| b.stage(priority, stage))
            .terminal(Arc::new(terminal))
            .build();
        Ok(BoundEndpoint { name: Arc::from(self.name), builder, pipeline, decoder })
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("template", &self.template)
            .field("params", &self.params)
            .field("stages", &self.stages.iter().map(|(p, _)| *p).collect::<Vec<_>>())
            .finish()
    }
}

/// A validated endpoint, ready to be called through any [`Client`].
///
/// Holds no per-client state; one bound endpoint serves every client.
pub struct BoundEndpoint<D> {
    name: Arc<str>,
    builder: RequestBuilder,
    pipeline: Pipeline,
    decoder: D,
}

impl<D: Decoder> BoundEndpoint<D> {
    /// Endpoint name, also the key of its caches.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The request builder.
    pub fn request_builder(&self) -> &RequestBuilder {
        &self.builder
    }

    /// The interceptor chain.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Build the request `call` would send, client default headers included.
    ///
    /// # Errors
    /// Call-time [`BindingError`]s.
    pub fn build_request(&self, client: &Client, args: &Args) -> Result<Request> {
        let mut request = self.builder.build(args)?;
        client.apply_default_headers(&mut request);
        Ok(request)
    }

    /// Call the endpoint, waiting cooperatively.
    pub async fn call(&self, client: &Client, args: Args) -> Result<D::Output> {
        self.execute(client, args, ExecutionMode::Cooperative).await
    }

    /// Call the endpoint on the current thread; waits park the thread.
    ///
    /// The client's transport must not need an async runtime to make progress.
    pub fn call_blocking(&self, client: &Client, args: Args) -> Result<D::Output> {
        futures::executor::block_on(self.execute(client, args, ExecutionMode::Blocking))
    }

    async fn execute(&self, client: &Client, args: Args, mode: ExecutionMode) -> Result<D::Output> {
        client.ensure_open()?;
        let request = self.build_request(client, &args)?;
        debug!(
            endpoint = %self.name,
            method = %request.method(),
            path = %request.path_and_query(),
            ?mode,
            "dispatching"
        );
        let response = self.pipeline.run(request, client.clone(), self.name.clone(), mode).await?;
        self.decoder.decode(response)
    }
}

impl<D> fmt::Debug for BoundEndpoint<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundEndpoint")
            .field("name", &self.name)
            .field("builder", &self.builder)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
