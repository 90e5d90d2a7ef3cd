//! # Logbook
//!
//! An axum middleware that records one structured log entry per
//! request/response cycle: timing, status, identity, and optionally bodies
//! and headers, with bounded body capture that never affects the bytes the
//! client receives.
//!
//! ## Features
//!
//! - **One record per request**: emitted after the handler chain completes,
//!   at a level selected from the status code (default / client error /
//!   server error)
//! - **Bounded body capture**: request and response bodies are mirrored into
//!   capped buffers for the log while the client-facing bytes pass through
//!   untouched
//! - **Sensitive-header redaction**: `authorization`, `cookie` and friends
//!   never reach the log, regardless of configuration
//! - **Extensible**: handlers attach custom attributes through
//!   [`LogContext`]; a custom [`LogEmitter`] replaces the `tracing` backend
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use logbook::{RequestLogConfig, RequestLogLayer};
//!
//! async fn hello() -> &'static str {
//!     "Hello, World!"
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt().init();
//!
//!     let layer = RequestLogLayer::new(RequestLogConfig {
//!         with_request_body: true,
//!         with_response_body: true,
//!         ..Default::default()
//!     });
//!
//!     let app = Router::new().route("/hello", get(hello)).layer(layer);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Custom attributes
//!
//! Handlers can enrich the record for their own request via the
//! [`LogContext`] extension:
//!
//! ```rust
//! use axum::Extension;
//! use logbook::{Attr, LogContext};
//!
//! async fn checkout(Extension(log): Extension<LogContext>) -> &'static str {
//!     log.record(Attr::new("cart.items", 3i64));
//!     "ok"
//! }
//! ```
//!
//! ## Custom emitters
//!
//! Implement [`LogEmitter`] to send records somewhere other than `tracing`:
//!
//! ```rust
//! use logbook::{LogEmitter, LogRecord};
//!
//! #[derive(Debug)]
//! struct StderrEmitter;
//!
//! impl LogEmitter for StderrEmitter {
//!     fn emit(&self, record: LogRecord) {
//!         eprintln!("{:?}", record);
//!     }
//! }
//! ```

use axum::extract::{ConnectInfo, MatchedPath, Request};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Instant, SystemTime};
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

pub mod body_capture;
pub use body_capture::{BodyCapture, DEFAULT_REQUEST_BODY_MAX_SIZE, DEFAULT_RESPONSE_BODY_MAX_SIZE};

pub mod types;
pub use types::{Attr, HandlerError, LogRecord, TraceContext, Value};

pub mod emitter;
pub use emitter::{LogEmitter, MultiEmitter, TracingEmitter};

pub mod context;
pub use context::LogContext;

use body_capture::{CaptureBody, Finalizer, snapshot_request_body};
use bytes::Bytes;

/// Request headers that are never logged, matched case-insensitively.
pub const HIDDEN_REQUEST_HEADERS: [&str; 6] = [
    "authorization",
    "cookie",
    "set-cookie",
    "x-auth-token",
    "x-csrf-token",
    "x-xsrf-token",
];

/// Response headers that are never logged, matched case-insensitively.
pub const HIDDEN_RESPONSE_HEADERS: [&str; 1] = ["set-cookie"];

const X_REQUEST_ID: &str = "x-request-id";

/// Borrowed view of a finished request, handed to filter predicates.
#[derive(Debug)]
pub struct FilterContext<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    /// Matched route pattern, when the router provided one.
    pub route: Option<&'a str>,
    /// Effective status: the handler error's status when it carries one,
    /// otherwise the response's.
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
}

/// A predicate deciding whether a request's log record is emitted at all.
///
/// Evaluated in configuration order after attribute assembly; the first
/// `false` suppresses the record entirely.
pub type Filter = Arc<dyn for<'a> Fn(&FilterContext<'a>) -> bool + Send + Sync>;

/// Configuration for the request logging middleware.
///
/// Immutable once the layer is built; shared read-only across all in-flight
/// requests.
///
/// # Examples
///
/// ```rust
/// use logbook::RequestLogConfig;
///
/// // Default configuration: INFO/WARN/ERROR levels, request IDs on,
/// // everything else off.
/// let config = RequestLogConfig::default();
///
/// let config = RequestLogConfig {
///     with_response_body: true,
///     response_body_max_size: 4 * 1024,
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct RequestLogConfig {
    /// Level for responses below 400.
    pub default_level: tracing::Level,
    /// Level for 4xx responses.
    pub client_error_level: tracing::Level,
    /// Level for 5xx responses.
    pub server_error_level: tracing::Level,

    /// Log a request ID, propagating the inbound header or generating one.
    pub with_request_id: bool,
    /// Snapshot the request body (capped at `request_body_max_size`).
    pub with_request_body: bool,
    /// Log request headers, minus [`HIDDEN_REQUEST_HEADERS`].
    pub with_request_header: bool,
    /// Capture the response body (capped at `response_body_max_size`).
    pub with_response_body: bool,
    /// Log response headers, minus [`HIDDEN_RESPONSE_HEADERS`].
    pub with_response_header: bool,
    /// Log the trace ID from an inbound [`TraceContext`] extension.
    pub with_trace_id: bool,
    /// Log the span ID from an inbound [`TraceContext`] extension.
    pub with_span_id: bool,

    /// Predicates that may suppress emission per request.
    pub filters: Vec<Filter>,

    /// Cap for request body snapshots, in bytes.
    pub request_body_max_size: usize,
    /// Cap for response body capture, in bytes.
    pub response_body_max_size: usize,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            default_level: tracing::Level::INFO,
            client_error_level: tracing::Level::WARN,
            server_error_level: tracing::Level::ERROR,

            with_request_id: true,
            with_request_body: false,
            with_request_header: false,
            with_response_body: false,
            with_response_header: false,
            with_trace_id: false,
            with_span_id: false,

            filters: Vec::new(),

            request_body_max_size: DEFAULT_REQUEST_BODY_MAX_SIZE,
            response_body_max_size: DEFAULT_RESPONSE_BODY_MAX_SIZE,
        }
    }
}

/// Tower layer for the request logging middleware.
///
/// The main entry point of the crate: build one with a [`RequestLogConfig`]
/// and layer it onto a router.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{routing::get, Router};
/// use logbook::{RequestLogConfig, RequestLogLayer};
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let layer = RequestLogLayer::new(RequestLogConfig::default());
/// let app = Router::new().route("/hello", get(hello)).layer(layer);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
/// axum::serve(listener, app).await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct RequestLogLayer {
    config: Arc<RequestLogConfig>,
    emitter: Arc<dyn LogEmitter>,
}

impl RequestLogLayer {
    /// Create a layer that emits through the default [`TracingEmitter`].
    pub fn new(config: RequestLogConfig) -> Self {
        Self::with_emitter(config, TracingEmitter)
    }

    /// Create a layer that emits through a custom [`LogEmitter`].
    pub fn with_emitter<E: LogEmitter>(config: RequestLogConfig, emitter: E) -> Self {
        Self {
            config: Arc::new(config),
            emitter: Arc::new(emitter),
        }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            config: self.config.clone(),
            emitter: self.emitter.clone(),
        }
    }
}

/// Tower service wrapping an inner service with the logging pipeline.
///
/// Created by [`RequestLogLayer`]; not used directly.
#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
    config: Arc<RequestLogConfig>,
    emitter: Arc<dyn LogEmitter>,
}

impl<S> Service<Request> for RequestLogService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let config = self.config.clone();
        let emitter = self.emitter.clone();

        // Take the service that was driven to readiness, leave the clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let start = Instant::now();
            let timestamp = SystemTime::now();

            let method = request.method().clone();
            let path = request.uri().path().to_owned();
            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map(|matched| matched.as_str().to_owned());
            let request_headers = request.headers().clone();
            let trace = request.extensions().get::<TraceContext>().cloned();
            let ip = client_ip(&request_headers, request.extensions());
            let user_agent = header_str(&request_headers, "user-agent").unwrap_or_default();

            debug!(method = %method, path = %path, "request entered logging pipeline");

            let inbound_request_id = header_str(&request_headers, X_REQUEST_ID);
            let log_context = LogContext::new(inbound_request_id.clone());
            request.extensions_mut().insert(log_context.clone());

            let request_body = if config.with_request_body {
                snapshot_request_body(&mut request, config.request_body_max_size).await
            } else {
                None
            };

            let mut response = inner.call(request).await?;

            let latency = start.elapsed();

            // A structured handler error overrides the logged status and
            // message; the client-visible response stays as the handler
            // built it.
            let handler_error = response.extensions().get::<HandlerError>().cloned();
            let mut status = response.status();
            let mut error_message = None;
            match &handler_error {
                Some(HandlerError::Http {
                    status: code,
                    message,
                }) => {
                    status = *code;
                    error_message = Some(message.clone());
                }
                Some(HandlerError::Message(message)) => error_message = Some(message.clone()),
                None => {}
            }

            // Inbound header first, then a header set further down the
            // stack, then a fresh ID. The response always carries the
            // resolved ID when the feature is on.
            let request_id = if config.with_request_id {
                let id = inbound_request_id
                    .or_else(|| header_str(response.headers(), X_REQUEST_ID))
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                if !response.headers().contains_key(X_REQUEST_ID)
                    && let Ok(value) = HeaderValue::from_str(&id)
                {
                    response.headers_mut().insert(X_REQUEST_ID, value);
                }
                Some(id)
            } else {
                None
            };

            let response_headers = response.headers().clone();

            let mut attributes = Vec::with_capacity(16);
            attributes.push(Attr::new("time", timestamp));
            attributes.push(Attr::new("latency", latency));
            attributes.push(Attr::new("method", method.to_string()));
            attributes.push(Attr::new("path", path.clone()));
            attributes.push(Attr::new(
                "route",
                route.clone().unwrap_or_else(|| path.clone()),
            ));
            attributes.push(Attr::new("status", status.as_u16()));
            attributes.push(Attr::new("ip", ip));
            attributes.push(Attr::new("user-agent", user_agent));

            if let Some(forwarded) = header_str(&request_headers, "x-forwarded-for") {
                let chain: Vec<String> = forwarded
                    .split(',')
                    .map(|entry| entry.trim().to_owned())
                    .collect();
                attributes.push(Attr::new("x-forwarded-for", chain));
            }

            if let Some(id) = request_id {
                attributes.push(Attr::new("request-id", id));
            }

            if let Some(trace) = &trace {
                if config.with_trace_id {
                    attributes.push(Attr::new("trace-id", trace.trace_id.clone()));
                }
                if config.with_span_id {
                    attributes.push(Attr::new("span-id", trace.span_id.clone()));
                }
            }

            if let Some(body) = &request_body {
                attributes.push(Attr::new(
                    "request.body",
                    String::from_utf8_lossy(body).into_owned(),
                ));
            }
            if config.with_request_header {
                header_attrs(
                    &request_headers,
                    "request.header.",
                    &HIDDEN_REQUEST_HEADERS,
                    &mut attributes,
                );
            }
            // Everything that follows the response body in the record.
            let mut trailing = Vec::new();
            if config.with_response_header {
                header_attrs(
                    &response_headers,
                    "response.header.",
                    &HIDDEN_RESPONSE_HEADERS,
                    &mut trailing,
                );
            }
            trailing.extend(log_context.take_attributes());

            let filter_context = FilterContext {
                method: &method,
                path: &path,
                route: route.as_deref(),
                status,
                headers: &request_headers,
            };
            if config.filters.iter().any(|filter| !filter(&filter_context)) {
                debug!(path = %path, "log record suppressed by filter");
                return Ok(response);
            }

            let (level, message) = if status.is_server_error() {
                (
                    config.server_error_level,
                    error_message.unwrap_or_else(|| reason_phrase(status)),
                )
            } else if status.is_client_error() {
                (
                    config.client_error_level,
                    error_message.unwrap_or_else(|| reason_phrase(status)),
                )
            } else {
                (config.default_level, "Success".to_owned())
            };

            if config.with_response_body {
                // Pass-through capture: chunks stream to the client as the
                // handler produces them, and the record is emitted once the
                // response body completes (or is dropped), mirrored bytes
                // included.
                let finalize: Finalizer = Box::new(move |captured: Bytes| {
                    let mut attributes = attributes;
                    attributes.push(Attr::new(
                        "response.body",
                        String::from_utf8_lossy(&captured).into_owned(),
                    ));
                    attributes.extend(trailing);
                    emitter.emit(LogRecord {
                        level,
                        message,
                        attributes,
                    });
                });
                let (parts, body) = response.into_parts();
                let body = CaptureBody::wrap(body, config.response_body_max_size, finalize);
                return Ok(Response::from_parts(parts, body));
            }

            attributes.extend(trailing);
            emitter.emit(LogRecord {
                level,
                message,
                attributes,
            });

            Ok(response)
        })
    }
}

/// Best-effort client IP: first forwarded-for entry, then `x-real-ip`, then
/// the peer address the server recorded.
fn client_ip(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for")
        && let Some(first) = forwarded.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_owned();
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip;
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_default()
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .filter(|value| !value.is_empty())
}

/// Append one `<prefix><name>` attribute per visible header, with all values
/// for that name in order.
fn header_attrs(headers: &HeaderMap, prefix: &str, hidden: &[&str], attrs: &mut Vec<Attr>) {
    for name in headers.keys() {
        if hidden
            .iter()
            .any(|h| name.as_str().eq_ignore_ascii_case(h))
        {
            continue;
        }
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        attrs.push(Attr::new(format!("{prefix}{name}"), values));
    }
}

fn reason_phrase(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_owned()
}
