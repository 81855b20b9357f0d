//! Authentication.
//!
//! Endpoints marked `authenticate` get an [`AuthInterceptor`] at [`priority::AUTH`], the
//! innermost built-in stage, so it runs again on every retry attempt right before the
//! transport. The interceptor delegates to the client's [`ClientHooks::authenticate`];
//! [`Credentials`] covers the common header schemes.
//!
//! [`priority::AUTH`]: crate::pipeline::priority::AUTH

use crate::client::ClientHooks;
use crate::error::{BuildError, Result};
use crate::pipeline::{Context, Interceptor};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use base64::Engine;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tracing::trace;

/// Runs the client's authentication hook, then proceeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthInterceptor;

#[async_trait]
impl Interceptor for AuthInterceptor {
    async fn intercept(&self, ctx: &mut Context) -> Result<Response> {
        let hooks = ctx.client().hooks();
        hooks.authenticate(ctx.request_mut()).await?;
        trace!(endpoint = ctx.endpoint(), "request authenticated");
        ctx.proceed().await
    }
}

/// Static credentials added as a header.
///
/// Header values are validated when the credentials are created, so authenticating never fails.
#[derive(Clone)]
pub struct Credentials {
    name: HeaderName,
    value: HeaderValue,
}

impl Credentials {
    /// `Authorization: Bearer <token>`.
    pub fn bearer(token: impl AsRef<str>) -> std::result::Result<Self, BuildError> {
        Self::authorization(format!("Bearer {}", token.as_ref()))
    }

    /// `Authorization: Basic base64(<username>:<password>)`.
    pub fn basic(
        username: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> std::result::Result<Self, BuildError> {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username.as_ref(), password.as_ref()));
        Self::authorization(format!("Basic {encoded}"))
    }

    /// `<header>: <key>`.
    pub fn api_key(
        header: impl AsRef<str>,
        key: impl AsRef<str>,
    ) -> std::result::Result<Self, BuildError> {
        let header = header.as_ref();
        let name = HeaderName::from_bytes(header.as_bytes())
            .map_err(|_| BuildError::InvalidHeader(header.to_string()))?;
        let value = sensitive(key.as_ref(), header)?;
        Ok(Self { name, value })
    }

    fn authorization(value: String) -> std::result::Result<Self, BuildError> {
        Ok(Self { name: AUTHORIZATION, value: sensitive(&value, AUTHORIZATION.as_str())? })
    }

    /// Header this credential sets.
    pub fn header_name(&self) -> &HeaderName {
        &self.name
    }
}

fn sensitive(value: &str, header: &str) -> std::result::Result<HeaderValue, BuildError> {
    let mut value =
        HeaderValue::from_str(value).map_err(|_| BuildError::InvalidHeader(header.to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("header", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl ClientHooks for Credentials {
    async fn authenticate(&self, request: &mut Request) -> Result<()> {
        request.headers_mut().insert(self.name.clone(), self.value.clone());
        Ok(())
    }
}
