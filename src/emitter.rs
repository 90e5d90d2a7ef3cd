//! Log record emission.
//!
//! The pipeline hands each finished [`LogRecord`] to a [`LogEmitter`]; the
//! emitter decides what a record looks like on the wire (text, JSON, a test
//! collector). [`TracingEmitter`] is the default backend and forwards records
//! to the `tracing` ecosystem at the record's level.

use crate::types::{Attr, LogRecord, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// The seam between the request pipeline and a structured-logging backend.
///
/// Emission is synchronous and happens exactly once per request, after the
/// handler chain completes. Implementations must not block for long; the
/// request is not returned to the client until `emit` does.
///
/// # Examples
///
/// ```rust
/// use logbook::{LogEmitter, LogRecord};
///
/// #[derive(Debug)]
/// struct StdoutEmitter;
///
/// impl LogEmitter for StdoutEmitter {
///     fn emit(&self, record: LogRecord) {
///         println!("{} {:?}", record.message, record.attributes);
///     }
/// }
/// ```
pub trait LogEmitter: Send + Sync + 'static {
    /// Deliver one finished record to the backend.
    fn emit(&self, record: LogRecord);
}

/// Default [`LogEmitter`] backed by the `tracing` crate.
///
/// Each record becomes one `tracing` event at the record's level, with the
/// ordered attributes rendered into a single `attributes` field. Install a
/// `tracing-subscriber` to control formatting and output.
#[derive(Debug, Clone, Default)]
pub struct TracingEmitter;

impl LogEmitter for TracingEmitter {
    fn emit(&self, record: LogRecord) {
        let attributes = Attrs(&record.attributes);
        // `tracing` event levels are static per call site, so one arm each.
        if record.level == tracing::Level::ERROR {
            error!(%attributes, "{}", record.message);
        } else if record.level == tracing::Level::WARN {
            warn!(%attributes, "{}", record.message);
        } else if record.level == tracing::Level::INFO {
            info!(%attributes, "{}", record.message);
        } else if record.level == tracing::Level::DEBUG {
            debug!(%attributes, "{}", record.message);
        } else {
            trace!(%attributes, "{}", record.message);
        }
    }
}

/// Renders an attribute list as `key=value` pairs, preserving order.
struct Attrs<'a>(&'a [Attr]);

impl fmt::Display for Attrs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, attr) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            match &attr.value {
                // Quote free-form text so bodies with spaces stay one token.
                Value::Str(s) => write!(f, "{}={s:?}", attr.key)?,
                other => write!(f, "{}={other}", attr.key)?,
            }
        }
        Ok(())
    }
}

/// An emitter that fans each record out to several inner emitters.
///
/// Emitters receive records in registration order. Useful for pairing the
/// default [`TracingEmitter`] with an audit sink or a test collector.
///
/// # Examples
///
/// ```rust
/// use logbook::{MultiEmitter, TracingEmitter};
///
/// let emitter = MultiEmitter::new().with(TracingEmitter);
/// assert_eq!(emitter.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MultiEmitter {
    emitters: Vec<Arc<dyn LogEmitter>>,
}

impl MultiEmitter {
    pub fn new() -> Self {
        Self {
            emitters: Vec::new(),
        }
    }

    /// Add an emitter to the chain. Returns self for builder-style use.
    pub fn with<E: LogEmitter>(mut self, emitter: E) -> Self {
        self.emitters.push(Arc::new(emitter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }
}

impl LogEmitter for MultiEmitter {
    fn emit(&self, record: LogRecord) {
        for emitter in &self.emitters {
            emitter.emit(record.clone());
        }
    }
}
