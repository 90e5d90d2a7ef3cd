//! Per-request logging context.
//!
//! The middleware inserts a [`LogContext`] into every request's extensions
//! before dispatch. Handlers extract it (for example with
//! `axum::Extension<LogContext>`) to attach custom attributes to the eventual
//! log record, or to read the inbound request ID.

use crate::types::Attr;
use std::sync::{Arc, Mutex, PoisonError};

/// Clonable handle to one request's logging state.
///
/// All clones share the same attribute list; the list is read exactly once,
/// when the log record is assembled after the handler completes. Attributes
/// are appended in registration order.
///
/// # Examples
///
/// ```rust
/// use axum::Extension;
/// use logbook::{Attr, LogContext};
///
/// async fn checkout(Extension(log): Extension<LogContext>) -> &'static str {
///     log.record(Attr::new("cart.items", 3i64));
///     "ok"
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    attributes: Arc<Mutex<Vec<Attr>>>,
    request_id: Option<String>,
}

impl LogContext {
    pub(crate) fn new(request_id: Option<String>) -> Self {
        Self {
            attributes: Arc::new(Mutex::new(Vec::new())),
            request_id,
        }
    }

    /// Append a custom attribute to this request's log record.
    pub fn record(&self, attr: Attr) {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(attr);
    }

    /// The request ID taken from the inbound `x-request-id` header, if the
    /// client sent one. IDs generated by the middleware itself are assigned
    /// after the handler runs and are not visible here.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Drain the registered attributes, in registration order.
    pub(crate) fn take_attributes(&self) -> Vec<Attr> {
        std::mem::take(
            &mut *self
                .attributes
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_preserves_registration_order() {
        let context = LogContext::new(None);
        context.record(Attr::new("first", 1i64));
        context.record(Attr::new("second", 2i64));

        let attrs = context.take_attributes();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].key, "first");
        assert_eq!(attrs[1].key, "second");
    }

    #[test]
    fn clones_share_the_attribute_list() {
        let context = LogContext::new(None);
        let clone = context.clone();
        clone.record(Attr::new("from-clone", true));

        assert_eq!(context.take_attributes().len(), 1);
        // A second drain sees nothing.
        assert!(context.take_attributes().is_empty());
    }

    #[test]
    fn request_id_reflects_inbound_header() {
        let context = LogContext::new(Some("req-123".to_owned()));
        assert_eq!(context.request_id(), Some("req-123"));
        assert_eq!(LogContext::new(None).request_id(), None);
    }
}
