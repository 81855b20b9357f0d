//! Transport-agnostic request value produced by the binding engine.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use std::collections::BTreeMap;

/// Request body.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Pre-encoded bytes (form, text, or custom encodings).
    Bytes(Bytes),
    /// JSON document; transports serialize it on send.
    Json(serde_json::Value),
}

impl Body {
    /// Check if there is no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Wire bytes for this body.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Bytes(bytes) => bytes.clone(),
            Body::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

/// A bound request: method, path relative to the transport's base, query, headers, body.
///
/// Produced fresh per call. Interceptors may adjust headers (authentication) through the
/// pipeline context before the transport consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    /// Create a request with no query, headers, or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub(crate) fn from_parts(
        method: Method,
        path: String,
        query: BTreeMap<String, String>,
        headers: HeaderMap,
        body: Body,
    ) -> Self {
        Self { method, path, query, headers, body }
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in key order.
    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access for interceptors and authentication hooks.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Request body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Deterministic, URL-encoded query string (`a=1&b=x+y`); empty when there is no query.
    pub fn query_string(&self) -> String {
        // BTreeMap iteration order is the canonical key order.
        serde_urlencoded::to_string(&self.query).unwrap_or_default()
    }

    /// Path followed by the query string, if any.
    pub fn path_and_query(&self) -> String {
        let query = self.query_string();
        if query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, query)
        }
    }

    /// Key used by the response cache.
    pub fn cache_key(&self) -> String {
        self.path_and_query()
    }
}
