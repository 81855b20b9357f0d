//! Response decoders.
//!
//! Decoding happens after the pipeline returns, so interceptors (and the cache) always deal in
//! raw [`Response`]s and the same cached response can feed any decoder.

use crate::error::{ParseResponseError, Result};
use crate::response::Response;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

/// Turns the final response into the endpoint's return value.
pub trait Decoder: Send + Sync {
    /// Decoded value.
    type Output;

    /// Decode. Failures should be [`ParseResponseError`]s carrying the response.
    fn decode(&self, response: Response) -> Result<Self::Output>;
}

/// Deserialize the body as JSON.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    /// JSON decoder for `T`.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Json<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> Decoder for Json<T> {
    type Output = T;

    fn decode(&self, response: Response) -> Result<T> {
        response.json()
    }
}

/// Deserialize the JSON value at an RFC 6901 pointer (`/data/items`).
pub struct JsonPointer<T> {
    pointer: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonPointer<T> {
    /// Decoder reading `pointer`.
    pub fn new(pointer: impl Into<String>) -> Self {
        Self { pointer: pointer.into(), _marker: PhantomData }
    }
}

impl<T> fmt::Debug for JsonPointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonPointer").field("pointer", &self.pointer).finish()
    }
}

impl<T: DeserializeOwned> Decoder for JsonPointer<T> {
    type Output = T;

    fn decode(&self, response: Response) -> Result<T> {
        let mut document: serde_json::Value = response.json()?;
        let Some(value) = document.pointer_mut(&self.pointer).map(serde_json::Value::take) else {
            let message = format!("no value at '{}'", self.pointer);
            return Err(ParseResponseError::new(message, response).into());
        };
        serde_json::from_value(value).map_err(|e| {
            ParseResponseError::new(format!("invalid value at '{}'", self.pointer), response)
                .with_source(e)
                .into()
        })
    }
}

/// Body as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

impl Decoder for Text {
    type Output = String;

    fn decode(&self, response: Response) -> Result<String> {
        response.text()
    }
}

/// Body bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Decoder for Raw {
    type Output = Bytes;

    fn decode(&self, response: Response) -> Result<Bytes> {
        Ok(response.into_bytes())
    }
}

/// The response itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Full;

impl Decoder for Full {
    type Output = Response;

    fn decode(&self, response: Response) -> Result<Response> {
        Ok(response)
    }
}

/// Discard the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unit;

impl Decoder for Unit {
    type Output = ();

    fn decode(&self, _response: Response) -> Result<()> {
        Ok(())
    }
}

/// Decoder from a closure.
pub struct FnDecoder<F>(F);

impl<F> FnDecoder<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnDecoder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnDecoder(<fn>)")
    }
}

impl<F, T> Decoder for FnDecoder<F>
where
    F: Fn(Response) -> Result<T> + Send + Sync,
{
    type Output = T;

    fn decode(&self, response: Response) -> Result<T> {
        (self.0)(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use http::StatusCode;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        login: String,
    }

    fn ok(body: &'static str) -> Response {
        Response::new(StatusCode::OK, body)
    }

    #[test]
    fn json_decodes_body() {
        let user = Json::<User>::new().decode(ok(r#"{"login":"ada"}"#)).unwrap();
        assert_eq!(user, User { login: "ada".into() });
    }

    #[test]
    fn json_failure_is_parse_error_with_body() {
        let err = Json::<User>::new().decode(ok("not json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseResponse);
        match err {
            crate::Error::ParseResponse(e) => assert_eq!(e.text(), "not json"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pointer_extracts_nested_value() {
        let decoder = JsonPointer::<Vec<User>>::new("/data/users");
        let users = decoder
            .decode(ok(r#"{"data":{"users":[{"login":"a"},{"login":"b"}]}}"#))
            .unwrap();
        assert_eq!(users.len(), 2);

        let err = decoder.decode(ok(r#"{"data":{}}"#)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseResponse);
    }

    #[test]
    fn text_raw_full_unit() {
        assert_eq!(Text.decode(ok("hi")).unwrap(), "hi");
        assert_eq!(Raw.decode(ok("hi")).unwrap(), Bytes::from_static(b"hi"));
        assert_eq!(Full.decode(ok("hi")).unwrap().status(), StatusCode::OK);
        Unit.decode(ok("ignored")).unwrap();
    }

    #[test]
    fn fn_decoder_runs_closure() {
        let decoder = FnDecoder::new(|r: Response| -> Result<usize> { Ok(r.read().len()) });
        assert_eq!(decoder.decode(ok("four")).unwrap(), 4);
    }
}
