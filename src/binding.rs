//! Request binding engine.
//!
//! Turns an endpoint's path template and ordered parameter descriptors into a reusable
//! [`RequestBuilder`]. All structural validation happens once, when the builder is created;
//! per call only the arguments are checked.
//!
//! - [`PathTemplate`]: `{name}` placeholders and `[flag]` / `[flag:literal]` conditional segments.
//! - [`Param`]: one descriptor per declared argument (path, query, header, or body).
//! - [`Args`]: positional and named call arguments as JSON values.
//!
//! ```rust
//! use tether::binding::{Args, Param, RequestBuilder};
//! use http::Method;
//!
//! let builder = RequestBuilder::new(
//!     Method::GET,
//!     "/repos/{owner}/[archived]",
//!     vec![Param::path("owner"), Param::path("archived"), Param::query("per_page").default(30)],
//! )
//! .unwrap();
//!
//! let request = builder.build(&Args::new().arg("rust-lang").named("archived", true)).unwrap();
//! assert_eq!(request.path(), "/repos/rust-lang/archived");
//! assert_eq!(request.query_string(), "per_page=30");
//! ```

mod builder;
mod param;
mod template;

pub use builder::{Args, RequestBuilder};
pub use param::{BodyEncoding, Formatter, Param, ParamKind, Unwrapper};
pub use template::PathTemplate;

use thiserror::Error;

/// Name reserved for the receiver of a declared method.
pub const RESERVED_NAME: &str = "self";

/// Errors raised while binding. Structural variants surface when the builder is created;
/// argument-shape variants surface per call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The path template is empty.
    #[error("path template is empty")]
    EmptyPath,
    /// The path template does not start with `/`.
    #[error("path template '{0}' must start with '/'")]
    MissingLeadingSlash(String),
    /// A conditional segment is malformed (`[` or `]` outside a whole-segment `[flag]`).
    #[error("malformed conditional segment '{0}'")]
    MalformedSegment(String),
    /// Two descriptors share a call name.
    #[error("duplicate parameter name '{0}'")]
    DuplicateName(String),
    /// Two descriptors share a wire name.
    #[error("duplicate wire name '{0}'")]
    DuplicateWireName(String),
    /// A descriptor uses the reserved receiver name.
    #[error("parameter name '{0}' is reserved")]
    ReservedName(String),
    /// More than one body parameter.
    #[error("at most one body parameter is allowed (found '{first}' and '{second}')")]
    MultipleBodies {
        /// First body parameter.
        first: String,
        /// Second body parameter.
        second: String,
    },
    /// A path descriptor has no placeholder in the template.
    #[error("path parameter '{0}' does not occur in the path template")]
    PathParamNotInTemplate(String),
    /// A template placeholder has no path descriptor.
    #[error("placeholder '{0}' has no matching path parameter")]
    UnboundPlaceholder(String),
    /// A header descriptor's wire name is not a valid header name.
    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),
    /// A named argument matches no descriptor.
    #[error("unknown argument '{0}'")]
    UnknownArgument(String),
    /// More positional arguments than descriptors.
    #[error("too many positional arguments ({given} given, at most {max})")]
    TooManyArguments {
        /// Positional arguments supplied.
        given: usize,
        /// Declared parameters.
        max: usize,
    },
    /// A path placeholder has no value and no default.
    #[error("missing value for path parameter '{0}'")]
    MissingPathArgument(String),
    /// A header value cannot be sent.
    #[error("invalid value for header '{0}'")]
    InvalidHeaderValue(String),
    /// An argument could not be converted or encoded.
    #[error("failed to encode '{name}': {message}")]
    Encode {
        /// Parameter name.
        name: String,
        /// Encoder message.
        message: String,
    },
}
