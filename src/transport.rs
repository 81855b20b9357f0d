//! Transport boundary.
//!
//! The framework never opens sockets itself. A [`Transport`] sends a bound [`Request`] and
//! returns the raw [`Response`] (any status), mapping its own failures into
//! [`TransportError`](crate::TransportError) or [`RequestError`](crate::RequestError).

use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use std::fmt;
use tower_service::Service;

/// Sends requests on behalf of a client.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send one request. Non-2xx statuses are returned as `Ok`; the pipeline decides what they mean.
    async fn send(&self, request: &Request) -> Result<Response>;

    /// Release connections and other resources. Called once when the owning client closes.
    fn close(&self) {}
}

/// Adapts any `tower::Service<Request>` into a [`Transport`].
///
/// The service is cloned per request, so it should be cheap to clone.
#[derive(Clone)]
pub struct ServiceTransport<S> {
    inner: S,
}

impl<S> ServiceTransport<S> {
    /// Wrap a service.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Get a reference to the inner service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S> fmt::Debug for ServiceTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> Transport for ServiceTransport<S>
where
    S: Service<Request, Response = Response> + Clone + Send + Sync + 'static,
    S::Error: Into<Error>,
    S::Future: Send,
{
    async fn send(&self, request: &Request) -> Result<Response> {
        let mut service = self.inner.clone();
        futures::future::poll_fn(|cx| service.poll_ready(cx)).await.map_err(Into::into)?;
        service.call(request.clone()).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use http::{Method, StatusCode};

    #[tokio::test]
    async fn service_transport_forwards_requests() {
        let transport = ServiceTransport::new(tower::service_fn(|req: Request| async move {
            Ok::<_, Error>(Response::new(StatusCode::OK, req.path().to_string()))
        }));
        let response = transport.send(&Request::new(Method::GET, "/ping")).await.unwrap();
        assert_eq!(response.text().unwrap(), "/ping");
    }

    #[tokio::test]
    async fn service_errors_pass_through() {
        let transport = ServiceTransport::new(tower::service_fn(|_req: Request| async move {
            Err::<Response, Error>(TransportError::connect("refused").into())
        }));
        let err = transport.send(&Request::new(Method::GET, "/")).await.unwrap_err();
        assert!(err.is(crate::ErrorKind::Transport));
    }
}
