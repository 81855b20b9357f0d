//! Reusable request builder and call arguments.

use super::param::{is_truthy, Param, ParamKind};
use super::{BindingError, PathTemplate, RESERVED_NAME};
use crate::request::{Body, Request};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Call arguments: positional values bind to parameters in declaration order, named values bind
/// by call name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl Args {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Add a named argument.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    /// Append a positional argument from any serializable value.
    pub fn try_arg<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, BindingError> {
        let value = to_value(&format!("#{}", self.positional.len()), value)?;
        Ok(self.arg(value))
    }

    /// Add a named argument from any serializable value.
    pub fn try_named<T: Serialize + ?Sized>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, BindingError> {
        let name = name.into();
        let value = to_value(&name, value)?;
        Ok(self.named(name, value))
    }

    /// Positional arguments.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }
}

fn to_value<T: Serialize + ?Sized>(name: &str, value: &T) -> Result<Value, BindingError> {
    serde_json::to_value(value)
        .map_err(|e| BindingError::Encode { name: name.to_string(), message: e.to_string() })
}

/// Validated binding of a path template and parameter descriptors.
///
/// Created once per endpoint declaration; [`RequestBuilder::build`] is called per invocation.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    template: PathTemplate,
    params: Vec<Param>,
    header_names: Vec<Option<HeaderName>>,
}

impl RequestBuilder {
    /// Validate the template and descriptors.
    ///
    /// # Errors
    /// Any structural problem: malformed template, duplicate or reserved names, more than one
    /// body, path parameters absent from the template, or placeholders without a parameter.
    pub fn new(
        method: Method,
        template: &str,
        params: Vec<Param>,
    ) -> Result<Self, BindingError> {
        let template = PathTemplate::parse(template)?;

        let mut names = HashSet::new();
        let mut wires = HashSet::new();
        let mut body: Option<&str> = None;
        let mut header_names = Vec::with_capacity(params.len());

        for param in &params {
            if param.name == RESERVED_NAME {
                return Err(BindingError::ReservedName(param.name.clone()));
            }
            if !names.insert(param.name.as_str()) {
                return Err(BindingError::DuplicateName(param.name.clone()));
            }
            if param.kind != ParamKind::Body && !wires.insert(param.wire.as_str()) {
                return Err(BindingError::DuplicateWireName(param.wire.clone()));
            }

            match param.kind {
                ParamKind::Body => {
                    if let Some(first) = body {
                        return Err(BindingError::MultipleBodies {
                            first: first.to_string(),
                            second: param.name.clone(),
                        });
                    }
                    body = Some(param.name.as_str());
                }
                ParamKind::Path if !template.mentions(&param.wire) => {
                    return Err(BindingError::PathParamNotInTemplate(param.wire.clone()));
                }
                _ => {}
            }

            header_names.push(match param.kind {
                ParamKind::Header => Some(
                    HeaderName::from_bytes(param.wire.as_bytes())
                        .map_err(|_| BindingError::InvalidHeaderName(param.wire.clone()))?,
                ),
                _ => None,
            });
        }

        for name in template.placeholders().iter().chain(template.flags()) {
            let covered = params
                .iter()
                .any(|p| p.kind == ParamKind::Path && &p.wire == name);
            if !covered {
                return Err(BindingError::UnboundPlaceholder(name.clone()));
            }
        }

        Ok(Self { method, template, params, header_names })
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Parsed template.
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Declared parameters in order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Bind arguments and produce a request.
    ///
    /// Absent arguments take the declared default; `null` (explicit or resolved) omits query and
    /// header entries and turns a conditional flag off.
    pub fn build(&self, args: &Args) -> Result<Request, BindingError> {
        let values = self.resolve(args)?;

        let mut path_values: HashMap<&str, String> = HashMap::new();
        let mut flags: HashMap<&str, bool> = HashMap::new();
        let mut query = BTreeMap::new();
        let mut headers = HeaderMap::new();
        let mut body = Body::Empty;

        for ((param, value), header_name) in
            self.params.iter().zip(values).zip(&self.header_names)
        {
            match param.kind {
                ParamKind::Path => {
                    let wire = param.wire.as_str();
                    let is_placeholder = self.template.placeholders().iter().any(|p| p == wire);
                    if self.template.flags().iter().any(|f| f == wire) {
                        flags.insert(wire, value.as_ref().is_some_and(is_truthy));
                    }
                    if is_placeholder {
                        match value {
                            Some(v) if !v.is_null() => {
                                path_values.insert(wire, param.stringify(&v));
                            }
                            _ => return Err(BindingError::MissingPathArgument(param.name.clone())),
                        }
                    }
                }
                ParamKind::Query => {
                    let Some(v) = value.filter(|v| !v.is_null()) else { continue };
                    match &param.unwrapper {
                        Some(unwrap) => query.extend(unwrap(&v)),
                        None => {
                            query.insert(param.wire.clone(), param.stringify(&v));
                        }
                    }
                }
                ParamKind::Header => {
                    let Some(v) = value.filter(|v| !v.is_null()) else { continue };
                    let Some(name) = header_name else { continue };
                    let header = HeaderValue::from_str(&param.stringify(&v))
                        .map_err(|_| BindingError::InvalidHeaderValue(param.wire.clone()))?;
                    headers.insert(name.clone(), header);
                }
                ParamKind::Body => {
                    let Some(v) = value.filter(|v| !v.is_null()) else { continue };
                    body = encode_body(param, v)?;
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static(param.encoding.content_type()),
                    );
                }
            }
        }

        let path = self.template.render(&path_values, &flags)?;
        Ok(Request::from_parts(self.method.clone(), path, query, headers, body))
    }

    /// One slot per parameter: supplied value, else the default, else `None`.
    fn resolve(&self, args: &Args) -> Result<Vec<Option<Value>>, BindingError> {
        if args.positional.len() > self.params.len() {
            return Err(BindingError::TooManyArguments {
                given: args.positional.len(),
                max: self.params.len(),
            });
        }

        let mut slots: Vec<Option<Value>> = vec![None; self.params.len()];
        for (slot, value) in slots.iter_mut().zip(&args.positional) {
            *slot = Some(value.clone());
        }
        for (name, value) in &args.named {
            let index = self
                .params
                .iter()
                .position(|p| &p.name == name)
                .ok_or_else(|| BindingError::UnknownArgument(name.clone()))?;
            slots[index] = Some(value.clone());
        }

        Ok(slots
            .into_iter()
            .zip(&self.params)
            .map(|(slot, param)| slot.or_else(|| param.default.clone()))
            .collect())
    }
}

fn encode_body(param: &Param, value: Value) -> Result<Body, BindingError> {
    use super::BodyEncoding;

    match param.encoding {
        BodyEncoding::Json => Ok(Body::Json(value)),
        BodyEncoding::Form => serde_urlencoded::to_string(&value)
            .map(|encoded| Body::Bytes(Bytes::from(encoded)))
            .map_err(|e| BindingError::Encode { name: param.name.clone(), message: e.to_string() }),
        BodyEncoding::Text => Ok(Body::Bytes(Bytes::from(param.stringify(&value)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder(template: &str, params: Vec<Param>) -> RequestBuilder {
        RequestBuilder::new(Method::GET, template, params).unwrap()
    }

    #[test]
    fn binds_path_query_and_header() {
        let b = builder(
            "/users/{id}/repos",
            vec![Param::path("id"), Param::query("sort"), Param::header("x-trace").wire("X-Trace-Id")],
        );
        let req = b
            .build(&Args::new().arg(7).arg("updated").named("x-trace", "abc"))
            .unwrap();
        assert_eq!(req.path(), "/users/7/repos");
        assert_eq!(req.query_string(), "sort=updated");
        assert_eq!(req.headers().get("x-trace-id").unwrap(), "abc");
        assert!(req.body().is_empty());
    }

    #[test]
    fn null_query_is_omitted_and_default_applies_when_absent() {
        let b = builder("/items", vec![Param::query("page").default(1), Param::query("q")]);
        let req = b.build(&Args::new()).unwrap();
        assert_eq!(req.query_string(), "page=1");

        let req = b.build(&Args::new().named("q", Value::Null).named("page", Value::Null)).unwrap();
        assert_eq!(req.query_string(), "");
    }

    #[test]
    fn unwrapper_expands_map_into_pairs() {
        let b = builder(
            "/search",
            vec![Param::query("filters").unwrap_with(|v| {
                v.as_object()
                    .map(|m| {
                        m.iter()
                            .map(|(k, v)| (format!("filter[{k}]"), super::super::param::to_wire(v)))
                            .collect()
                    })
                    .unwrap_or_default()
            })],
        );
        let req = b.build(&Args::new().arg(json!({"lang": "rust", "stars": 10}))).unwrap();
        assert_eq!(req.query().get("filter[lang]").map(String::as_str), Some("rust"));
        assert_eq!(req.query().get("filter[stars]").map(String::as_str), Some("10"));
    }

    #[test]
    fn conditional_flag_from_named_argument() {
        let b = builder("/{entity}/[all]", vec![Param::path("entity"), Param::path("all")]);
        let req = b.build(&Args::new().arg("users")).unwrap();
        assert_eq!(req.path(), "/users");
        let req = b.build(&Args::new().arg("users").named("all", true)).unwrap();
        assert_eq!(req.path(), "/users/all");
    }

    #[test]
    fn json_and_form_bodies_set_content_type() {
        let b = RequestBuilder::new(Method::POST, "/users", vec![Param::body("user")]).unwrap();
        let req = b.build(&Args::new().arg(json!({"name": "ada"}))).unwrap();
        assert_eq!(req.body(), &Body::Json(json!({"name": "ada"})));
        assert_eq!(req.headers().get(CONTENT_TYPE).unwrap(), "application/json");

        let b = RequestBuilder::new(Method::POST, "/login", vec![Param::form("creds")]).unwrap();
        let req = b.build(&Args::new().arg(json!({"user": "ada", "pw": "x y"}))).unwrap();
        assert_eq!(req.body().to_bytes(), Bytes::from_static(b"pw=x+y&user=ada"));
        assert_eq!(
            req.headers().get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
    }

    #[test]
    fn structural_errors_are_raised_at_construction() {
        let err = |t: &str, p: Vec<Param>| RequestBuilder::new(Method::GET, t, p).unwrap_err();

        assert_eq!(
            err("/a/{x}", vec![Param::path("x"), Param::query("x")]),
            BindingError::DuplicateWireName("x".into())
        );
        assert_eq!(
            err("/a", vec![Param::path("x")]),
            BindingError::PathParamNotInTemplate("x".into())
        );
        assert_eq!(err("/a/{x}", vec![]), BindingError::UnboundPlaceholder("x".into()));
        assert_eq!(err("/a", vec![Param::body("self")]), BindingError::ReservedName("self".into()));
        assert!(matches!(
            err("/a", vec![Param::body("a"), Param::body("b")]),
            BindingError::MultipleBodies { .. }
        ));
        assert_eq!(
            err("/a", vec![Param::header("h").wire("bad header")]),
            BindingError::InvalidHeaderName("bad header".into())
        );
    }

    #[test]
    fn call_shape_errors() {
        let b = builder("/a/{x}", vec![Param::path("x")]);
        assert_eq!(
            b.build(&Args::new().named("y", 1)),
            Err(BindingError::UnknownArgument("y".into()))
        );
        assert_eq!(
            b.build(&Args::new().arg(1).arg(2)),
            Err(BindingError::TooManyArguments { given: 2, max: 1 })
        );
        assert_eq!(b.build(&Args::new()), Err(BindingError::MissingPathArgument("x".into())));
    }

    #[test]
    fn try_arg_serializes_structs() {
        #[derive(Serialize)]
        struct NewUser<'a> {
            name: &'a str,
        }
        let args = Args::new().try_arg(&NewUser { name: "ada" }).unwrap();
        assert_eq!(args.positional(), [json!({"name": "ada"})]);
    }
}
