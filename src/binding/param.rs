//! Parameter descriptors.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Stringifies a bound value for the wire (path, query, header).
pub type Formatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Expands one bound value into several query pairs (e.g. a filter map).
pub type Unwrapper = Arc<dyn Fn(&Value) -> Vec<(String, String)> + Send + Sync>;

/// Where a parameter lands in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Substituted into `{name}`, or the flag of a `[name]` conditional segment.
    Path,
    /// Query string entry.
    Query,
    /// Request header.
    Header,
    /// Request body.
    Body,
}

/// How a body parameter is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// `application/json`.
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`; the value must be a flat object.
    Form,
    /// `text/plain`; the value is stringified.
    Text,
}

impl BodyEncoding {
    pub(crate) fn content_type(self) -> &'static str {
        match self {
            BodyEncoding::Json => "application/json",
            BodyEncoding::Form => "application/x-www-form-urlencoded",
            BodyEncoding::Text => "text/plain; charset=utf-8",
        }
    }
}

/// Descriptor for one declared argument.
///
/// The call name is what callers pass as a named argument; the wire name is what appears in the
/// template, query string, or header. They are the same unless [`Param::wire`] is used.
#[derive(Clone)]
pub struct Param {
    pub(crate) kind: ParamKind,
    pub(crate) name: String,
    pub(crate) wire: String,
    pub(crate) default: Option<Value>,
    pub(crate) formatter: Option<Formatter>,
    pub(crate) unwrapper: Option<Unwrapper>,
    pub(crate) encoding: BodyEncoding,
}

impl Param {
    fn new(kind: ParamKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind,
            wire: name.clone(),
            name,
            default: None,
            formatter: None,
            unwrapper: None,
            encoding: BodyEncoding::default(),
        }
    }

    /// Path placeholder or conditional flag.
    pub fn path(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Path, name)
    }

    /// Query parameter.
    pub fn query(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Query, name)
    }

    /// Header parameter.
    pub fn header(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Header, name)
    }

    /// JSON body.
    pub fn body(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Body, name)
    }

    /// Form-encoded body.
    pub fn form(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Body, name).encoding(BodyEncoding::Form)
    }

    /// Use a different name on the wire.
    pub fn wire(mut self, wire: impl Into<String>) -> Self {
        self.wire = wire.into();
        self
    }

    /// Value used when the caller supplies nothing for this parameter.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Custom stringification.
    pub fn format<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(f));
        self
    }

    /// Expand the value into several query pairs. Only meaningful for query parameters.
    pub fn unwrap_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Vec<(String, String)> + Send + Sync + 'static,
    {
        self.unwrapper = Some(Arc::new(f));
        self
    }

    /// Body encoding. Only meaningful for body parameters.
    pub fn encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Parameter kind.
    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Call name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire name.
    pub fn wire_name(&self) -> &str {
        &self.wire
    }

    pub(crate) fn stringify(&self, value: &Value) -> String {
        match &self.formatter {
            Some(format) => format(value),
            None => to_wire(value),
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("wire", &self.wire)
            .field("default", &self.default)
            .field("formatter", &self.formatter.is_some())
            .field("unwrapper", &self.unwrapper.is_some())
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// Default wire form: strings verbatim, scalars via `Display`, composites as JSON.
pub(crate) fn to_wire(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Truthiness of a conditional segment flag.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_form_of_scalars() {
        assert_eq!(to_wire(&json!("abc")), "abc");
        assert_eq!(to_wire(&json!(5)), "5");
        assert_eq!(to_wire(&json!(true)), "true");
        assert_eq!(to_wire(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("yes")));
        assert!(is_truthy(&json!(1)));
    }

    #[test]
    fn formatter_overrides_default_stringify() {
        let p = Param::query("ids").format(|v| {
            v.as_array()
                .map(|items| items.iter().map(to_wire).collect::<Vec<_>>().join(","))
                .unwrap_or_default()
        });
        assert_eq!(p.stringify(&json!([1, 2, 3])), "1,2,3");
    }

    #[test]
    fn wire_name_defaults_to_call_name() {
        let p = Param::query("per_page");
        assert_eq!(p.wire_name(), "per_page");
        let p = Param::query("per_page").wire("perPage");
        assert_eq!(p.name(), "per_page");
        assert_eq!(p.wire_name(), "perPage");
    }
}
