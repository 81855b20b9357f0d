#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # tether
//!
//! Declarative HTTP client framework: describe each API method once, then call it through any
//! client object.
//!
//! ## Features
//!
//! - **Request binding** from path templates (`/users/{id}/[archived]`) and typed parameter
//!   descriptors (path, query, header, body), validated once at bind time
//! - **Onion middleware** with explicit priorities: cache, retry, rate limiting, authentication,
//!   and your own interceptors
//! - **Retry engine** composing retry conditions, wait strategies, and stop conditions
//! - **Token-bucket rate limiting** with reservations that queue concurrent callers fairly
//! - **Response caching** with TTL and LRU bounds, private per client or shared per class
//! - **Cooperative and blocking execution** from the same pipeline code
//! - **Pluggable transports**: anything implementing [`Transport`], or any `tower::Service`
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use tether::binding::{Args, Param};
//! use tether::decode::Json;
//! use tether::retry::RetryPolicyBuilder;
//! use tether::{Client, Endpoint, Error, Request, Response, ServiceTransport};
//! use http::StatusCode;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     login: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     // Any tower service can stand in for a real HTTP transport.
//!     let transport = ServiceTransport::new(tower::service_fn(|req: Request| async move {
//!         let login = req.path().trim_start_matches("/users/").to_string();
//!         Ok::<_, Error>(Response::new(StatusCode::OK, format!(r#"{{"login":"{login}"}}"#)))
//!     }));
//!     let client = Client::builder(transport).header("user-agent", "tether").build()?;
//!
//!     let get_user = Endpoint::new("get_user", "/users/{login}")
//!         .param(Param::path("login"))
//!         .retry(RetryPolicyBuilder::http().build())
//!         .bind(Json::<User>::new())?;
//!
//!     let user = get_user.call(&client, Args::new().arg("ada")).await?;
//!     assert_eq!(user.login, "ada");
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod binding;
pub mod cache;
pub mod client;
pub mod clock;
pub mod decode;
pub mod endpoint;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod rate_limit;
pub mod request;
pub mod response;
pub mod retry;
pub mod sleeper;
pub mod transport;

// Re-exports
pub use auth::{AuthInterceptor, Credentials};
pub use binding::{Args, BindingError, Param};
pub use cache::{CacheOptions, CacheRegistry};
pub use client::{ClassId, Client, ClientBuilder, ClientConfig, ClientHooks, NoHooks};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use endpoint::{BoundEndpoint, Endpoint};
pub use error::{
    BoxError, BuildError, Error, ErrorKind, ParseResponseError, PipelineError, RequestError,
    ResponseError, ResponseErrorKind, Result, RetryError, TransportError, TransportErrorKind,
};
pub use pipeline::{Context, ExecutionMode, Interceptor};
pub use rate_limit::{RateLimitError, RateLimiter, TokenBucketLimiter};
pub use request::{Body, Request};
pub use response::Response;
pub use retry::{Condition, RetryPolicy, RetryPolicyBuilder, Wait};
pub use sleeper::{InstantSleeper, Sleeper, ThreadSleeper, TokioSleeper, TrackingSleeper};
pub use transport::{ServiceTransport, Transport};
