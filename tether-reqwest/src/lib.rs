//! [`reqwest`] transport for `tether`.
//!
//! Request paths are appended to the base URL's path, so a base of
//! `https://api.example.com/v3` and a request for `/users/ada` reach
//! `https://api.example.com/v3/users/ada`.

use async_trait::async_trait;
use parking_lot::RwLock;
use tether::{Error, Request, RequestError, Response, Result, Transport, TransportError};
use tracing::debug;
use url::Url;

/// Async transport over a shared [`reqwest::Client`].
#[derive(Debug)]
pub struct ReqwestTransport {
    base: Url,
    client: RwLock<Option<reqwest::Client>>,
}

impl ReqwestTransport {
    /// Transport with a default `reqwest` client.
    pub fn new(base: Url) -> Self {
        Self::with_client(base, reqwest::Client::new())
    }

    /// Transport with a default client, parsing `base`.
    pub fn parse(base: &str) -> std::result::Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(base)?))
    }

    /// Transport on a preconfigured client (timeouts, proxies, TLS).
    pub fn with_client(base: Url, client: reqwest::Client) -> Self {
        Self { base, client: RwLock::new(Some(client)) }
    }

    /// Base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn client(&self) -> Result<reqwest::Client> {
        self.client.read().clone().ok_or_else(closed)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> Result<Response> {
        let url = url_for(&self.base, request);
        let mut builder = self
            .client()?
            .request(request.method().clone(), url)
            .headers(request.headers().clone());
        if !request.body().is_empty() {
            builder = builder.body(request.body().to_bytes());
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_error)?;
        Ok(Response::from_parts(status, headers, body))
    }

    fn close(&self) {
        if self.client.write().take().is_some() {
            debug!(base = %self.base, "reqwest client released");
        }
    }
}

/// Blocking transport over [`reqwest::blocking::Client`], for `call_blocking` outside of an
/// async runtime.
#[cfg(feature = "blocking")]
#[derive(Debug)]
pub struct BlockingReqwestTransport {
    base: Url,
    client: RwLock<Option<reqwest::blocking::Client>>,
}

#[cfg(feature = "blocking")]
impl BlockingReqwestTransport {
    /// Transport with a default blocking client.
    pub fn new(base: Url) -> Self {
        Self::with_client(base, reqwest::blocking::Client::new())
    }

    /// Transport with a default blocking client, parsing `base`.
    pub fn parse(base: &str) -> std::result::Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(base)?))
    }

    /// Transport on a preconfigured blocking client.
    pub fn with_client(base: Url, client: reqwest::blocking::Client) -> Self {
        Self { base, client: RwLock::new(Some(client)) }
    }
}

#[cfg(feature = "blocking")]
#[async_trait]
impl Transport for BlockingReqwestTransport {
    async fn send(&self, request: &Request) -> Result<Response> {
        let client = self.client.read().clone().ok_or_else(closed)?;
        let mut builder = client
            .request(request.method().clone(), url_for(&self.base, request))
            .headers(request.headers().clone());
        if !request.body().is_empty() {
            builder = builder.body(request.body().to_bytes());
        }

        let response = builder.send().map_err(map_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().map_err(map_error)?;
        Ok(Response::from_parts(status, headers, body))
    }

    fn close(&self) {
        if self.client.write().take().is_some() {
            debug!(base = %self.base, "blocking reqwest client released");
        }
    }
}

fn url_for(base: &Url, request: &Request) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}{}", request.path()));
    if !request.query().is_empty() {
        url.query_pairs_mut().extend_pairs(request.query());
    }
    url
}

fn closed() -> Error {
    RequestError::new("transport is closed").into()
}

/// Map a `reqwest` failure into the tether taxonomy, keeping it as the source.
pub fn map_error(err: reqwest::Error) -> Error {
    let message = err.to_string();
    if err.is_builder() {
        return RequestError::new(message).with_source(err).into();
    }
    let transport = if err.is_timeout() {
        TransportError::timeout(message)
    } else if err.is_connect() {
        TransportError::connect(message)
    } else {
        TransportError::server(message)
    };
    transport.with_source(err).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn paths_are_appended_to_the_base_path() {
        let request = Request::new(Method::GET, "/users/ada");
        assert_eq!(
            url_for(&base("https://api.example.com/v3/"), &request).as_str(),
            "https://api.example.com/v3/users/ada"
        );
        assert_eq!(
            url_for(&base("https://api.example.com"), &request).as_str(),
            "https://api.example.com/users/ada"
        );
    }

    #[test]
    fn query_is_added_only_when_present() {
        let plain = Request::new(Method::GET, "/search");
        assert_eq!(url_for(&base("http://h"), &plain).query(), None);

        let with_query = plain.with_query("q", "a b").with_query("page", "2");
        assert_eq!(
            url_for(&base("http://h"), &with_query).as_str(),
            "http://h/search?page=2&q=a+b"
        );
    }

    #[tokio::test]
    async fn closed_transport_refuses_requests() {
        let transport = ReqwestTransport::parse("http://127.0.0.1:9").unwrap();
        transport.close();
        let err = transport.send(&Request::new(Method::GET, "/")).await.unwrap_err();
        assert_eq!(err.kind(), tether::ErrorKind::Request);
    }
}
