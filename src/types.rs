//! Core record types: attributes, values, and the per-request log record.
//!
//! This module contains the data structures that travel from the middleware
//! pipeline to a [`LogEmitter`](crate::LogEmitter), along with the error and
//! trace types the pipeline reads back out of the request/response cycle.

use axum::http::StatusCode;
use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, SystemTime};

/// A typed attribute value.
///
/// Values are deliberately simple: everything the pipeline records fits one
/// of these shapes, and emitters render them without knowing where they came
/// from.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 text (header values and bodies are converted lossily).
    Str(String),
    /// Signed integer (status codes, counts).
    Int(i64),
    /// Boolean flag.
    Bool(bool),
    /// Elapsed time.
    Duration(Duration),
    /// Wall-clock instant, rendered as milliseconds since the Unix epoch.
    Time(SystemTime),
    /// Ordered list of strings (forwarded-for chains, multi-value headers).
    List(Vec<String>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Duration(d) => write!(f, "{d:?}"),
            Value::Time(t) => {
                let millis = t
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis();
                write!(f, "{millis}")
            }
            Value::List(items) => write!(f, "{items:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}

impl From<SystemTime> for Value {
    fn from(t: SystemTime) -> Self {
        Value::Time(t)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

/// A single key/value pair in a log record.
///
/// Attribute order is significant: the pipeline appends attributes in a fixed
/// order and emitters render them in that order. Keys are not required to be
/// unique.
///
/// # Examples
///
/// ```rust
/// use logbook::Attr;
///
/// let attr = Attr::new("tenant", "acme");
/// assert_eq!(attr.key, "tenant");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: Cow<'static, str>,
    pub value: Value,
}

impl Attr {
    /// Create an attribute from any key and any supported value type.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One structured record, produced once per request.
///
/// Handed to the configured [`LogEmitter`](crate::LogEmitter) after the
/// handler chain completes and every filter has passed.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Level selected from the effective status code.
    pub level: tracing::Level,
    /// "Success", the status reason phrase, or the handler error's text.
    pub message: String,
    /// Ordered attributes; see [`Attr`].
    pub attributes: Vec<Attr>,
}

/// An error reported by a handler or downstream middleware.
///
/// Attach one to the response's extensions to have it reflected in the log
/// record:
///
/// ```rust
/// use axum::response::{IntoResponse, Response};
/// use axum::http::StatusCode;
/// use logbook::HandlerError;
///
/// async fn flaky() -> Response {
///     let mut response = StatusCode::BAD_GATEWAY.into_response();
///     response.extensions_mut().insert(HandlerError::Http {
///         status: StatusCode::BAD_GATEWAY,
///         message: "upstream unreachable".to_owned(),
///     });
///     response
/// }
/// ```
///
/// The `Http` variant overrides the logged status code and supplies the
/// message; the `Message` variant only supplies the message. The
/// client-visible response is never altered by either.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// A structured HTTP error carrying its own status code.
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    /// An unstructured error message.
    #[error("{0}")]
    Message(String),
}

/// Trace identifiers for the current request.
///
/// The middleware does not propagate trace context itself; it reads this
/// extension when a propagation layer earlier in the stack has inserted one,
/// and logs the IDs when configured to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}
