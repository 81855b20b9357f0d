//! Error taxonomy for bound endpoints.
//!
//! Every failure surfaced by a call is a [`Error`]. The variants wrap distinct types so callers
//! can discriminate with a `match`, and [`ErrorKind`] mirrors the hierarchy so retry conditions
//! can target a family of failures (a [`TransportErrorKind::Timeout`] is also a server error and a
//! transport error).
//!
//! Cause chains are preserved: [`Error::chain`] yields the wrapped error first and then every
//! `source()` below it, so the originating low-level failure is always reachable.

use crate::binding::BindingError;
use crate::rate_limit::RateLimitError;
use crate::response::Response;
use http::StatusCode;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed low-level cause carried by transport, request, and response errors.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Discriminant over the error hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Arguments could not be bound to the endpoint's parameters.
    Binding,
    /// An option was configured with invalid values.
    Build,
    /// The request could not be formed or dispatched.
    Request,
    /// Network or protocol failure reported by the transport.
    Transport,
    /// Proxy failure (a transport error).
    Proxy,
    /// Server-side failure (a transport error).
    Server,
    /// Timeout (a server error).
    Timeout,
    /// The response arrived but was not what the endpoint expected.
    Response,
    /// The response body failed to decode (a response error).
    ParseResponse,
    /// Retry loop ended without a recorded outcome.
    Retry,
    /// Rate limiter misconfiguration.
    RateLimit,
    /// Misuse of the middleware pipeline.
    Pipeline,
}

impl ErrorKind {
    /// Parent kind in the hierarchy, if any.
    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            ErrorKind::Proxy | ErrorKind::Server => Some(ErrorKind::Transport),
            ErrorKind::Timeout => Some(ErrorKind::Server),
            ErrorKind::ParseResponse => Some(ErrorKind::Response),
            _ => None,
        }
    }

    /// True when `self` is `other` or one of its descendants.
    pub fn is_a(self, other: ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}

/// Unified error returned by bound endpoints.
#[derive(Debug, Error)]
pub enum Error {
    /// See [`BindingError`].
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// See [`BuildError`].
    #[error(transparent)]
    Build(#[from] BuildError),
    /// See [`RequestError`].
    #[error(transparent)]
    Request(#[from] RequestError),
    /// See [`TransportError`].
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// See [`ResponseError`].
    #[error(transparent)]
    Response(#[from] ResponseError),
    /// See [`ParseResponseError`].
    #[error(transparent)]
    ParseResponse(#[from] ParseResponseError),
    /// See [`RetryError`].
    #[error(transparent)]
    Retry(#[from] RetryError),
    /// See [`RateLimitError`].
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    /// See [`PipelineError`].
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl Error {
    /// Most specific kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Binding(_) => ErrorKind::Binding,
            Self::Build(_) => ErrorKind::Build,
            Self::Request(_) => ErrorKind::Request,
            Self::Transport(e) => match e.kind() {
                TransportErrorKind::Connect => ErrorKind::Transport,
                TransportErrorKind::Proxy => ErrorKind::Proxy,
                TransportErrorKind::Server => ErrorKind::Server,
                TransportErrorKind::Timeout => ErrorKind::Timeout,
            },
            Self::Response(_) => ErrorKind::Response,
            Self::ParseResponse(_) => ErrorKind::ParseResponse,
            Self::Retry(_) => ErrorKind::Retry,
            Self::RateLimit(_) => ErrorKind::RateLimit,
            Self::Pipeline(_) => ErrorKind::Pipeline,
        }
    }

    /// Hierarchy-aware kind check: a timeout `is(ErrorKind::Transport)`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind().is_a(kind)
    }

    /// Check if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        self.is(ErrorKind::Timeout)
    }

    /// Pipeline misuse is a programming error and is never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Pipeline(PipelineError::NoMoreSteps { .. }))
    }

    /// Response carried by a response or parse error.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Response(e) => Some(e.response()),
            Self::ParseResponse(e) => Some(e.response()),
            _ => None,
        }
    }

    /// Status of the carried response, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(Response::status)
    }

    /// The wrapped error followed by its `source()` chain.
    pub fn chain(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        let mut next = Some(self.inner());
        std::iter::from_fn(move || {
            let current = next?;
            next = current.source();
            Some(current)
        })
    }

    /// True if any link of [`Error::chain`] is an `E`.
    pub fn caused_by<E: StdError + 'static>(&self) -> bool {
        self.chain().any(|e| e.is::<E>())
    }

    fn inner(&self) -> &(dyn StdError + 'static) {
        match self {
            Self::Binding(e) => e,
            Self::Build(e) => e,
            Self::Request(e) => e,
            Self::Transport(e) => e,
            Self::Response(e) => e,
            Self::ParseResponse(e) => e,
            Self::Retry(e) => e,
            Self::RateLimit(e) => e,
            Self::Pipeline(e) => e,
        }
    }
}

/// The request could not be formed or dispatched (bad URL, unsupported scheme). Never retried
/// by the default conditions.
#[derive(Debug, Error)]
#[error("request could not be sent: {message}")]
pub struct RequestError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl RequestError {
    /// Create a request error.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    /// Attach the low-level cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Sub-classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection-level failure (refused, reset, DNS).
    Connect,
    /// The configured proxy failed.
    Proxy,
    /// The server misbehaved at the protocol level.
    Server,
    /// The exchange did not complete in time.
    Timeout,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connection"),
            Self::Proxy => write!(f, "proxy"),
            Self::Server => write!(f, "server"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Network/protocol failure surfaced by a transport adapter.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Create a transport error of the given kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    /// Connection-level failure.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Proxy failure.
    pub fn proxy(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Proxy, message)
    }

    /// Server/protocol failure.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Server, message)
    }

    /// Timeout.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// Attach the low-level cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Kind of failure.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Timeouts count as server errors.
    pub fn is_server(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Server | TransportErrorKind::Timeout)
    }

    /// Check if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

/// Why a received response was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseErrorKind {
    /// The status did not satisfy the endpoint's checks.
    Status,
    /// The body could not be read.
    Read,
    /// Custom rejection raised by an endpoint hook.
    Custom,
}

/// The response was received but was not as expected. Carries the offending response.
#[derive(Debug, Error)]
#[error("unexpected response ({}): {message}", .response.status())]
pub struct ResponseError {
    kind: ResponseErrorKind,
    message: String,
    response: Box<Response>,
    #[source]
    source: Option<BoxError>,
}

impl ResponseError {
    /// Create a response error of the given kind.
    pub fn new(kind: ResponseErrorKind, message: impl Into<String>, response: Response) -> Self {
        Self { kind, message: message.into(), response: Box::new(response), source: None }
    }

    /// Rejection because of the response status.
    pub fn status(response: Response) -> Self {
        let message = response
            .status()
            .canonical_reason()
            .unwrap_or("unrecognised status")
            .to_string();
        Self::new(ResponseErrorKind::Status, message, response)
    }

    /// Attach the low-level cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Why the response was rejected.
    pub fn kind(&self) -> ResponseErrorKind {
        self.kind
    }

    /// The offending response.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Take ownership of the offending response.
    pub fn into_response(self) -> Response {
        *self.response
    }
}

/// The body failed structural decoding. Carries the raw text for diagnostics.
#[derive(Debug, Error)]
#[error("failed to decode response body ({}): {message}", .response.status())]
pub struct ParseResponseError {
    message: String,
    text: String,
    response: Box<Response>,
    #[source]
    source: Option<BoxError>,
}

impl ParseResponseError {
    /// Create a parse error for `response`; the body is captured lossily as text.
    pub fn new(message: impl Into<String>, response: Response) -> Self {
        let text = String::from_utf8_lossy(response.read()).into_owned();
        Self { message: message.into(), text, response: Box::new(response), source: None }
    }

    /// Attach the low-level cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Raw body text that failed to decode.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The offending response.
    pub fn response(&self) -> &Response {
        &self.response
    }
}

/// The retry loop stopped without recording a result or an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("retries exhausted after {attempts} attempts with no recorded outcome")]
pub struct RetryError {
    /// Attempts performed before the loop stopped.
    pub attempts: u32,
}

/// Misuse of the middleware pipeline or the client around it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// `proceed()` was called with no step left to run.
    #[error("no more steps in pipeline (cursor {cursor}, {steps} steps)")]
    NoMoreSteps {
        /// Cursor position at the failing call.
        cursor: usize,
        /// Number of steps, terminal included.
        steps: usize,
    },
    /// A shared cache was requested but no registry is injected or installed.
    #[error("endpoint '{endpoint}' uses a shared cache but no cache registry is available")]
    SharedCacheUnavailable {
        /// Endpoint name.
        endpoint: String,
    },
    /// The client was closed before the call.
    #[error("client is closed")]
    ClientClosed,
}

/// Errors produced while validating declaration-time options.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// Cache capacity must be > 0.
    #[error("cache capacity must be > 0")]
    ZeroCacheCapacity,
    /// Random wait needs `min <= max`.
    #[error("random wait range is empty ({min:?} > {max:?})")]
    EmptyWaitRange {
        /// Lower bound.
        min: std::time::Duration,
        /// Upper bound.
        max: std::time::Duration,
    },
    /// Exponential wait needs finite, non-negative parameters and `lower <= upper`.
    #[error("invalid exponential wait: {0}")]
    InvalidExponential(&'static str),
    /// Fixed wait needs at least one delay.
    #[error("fixed wait requires at least one delay")]
    EmptyFixedWait,
    /// Header name or value is not valid HTTP.
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
}
