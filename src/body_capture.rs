//! Bounded body capture.
//!
//! [`BodyCapture`] is a capped mirror buffer placed beside the real body
//! path: every chunk is forwarded to its destination untouched, while a copy
//! of at most `max_size` bytes is kept for the eventual log record. Hitting
//! the cap truncates the *mirror* only, silently; the client-facing bytes are
//! never affected.
//!
//! [`CaptureBody`] applies the mirror to a live response stream: chunks flow
//! to the client the moment the inner body produces them, and the pending log
//! record is finished when the stream ends, errors, or is dropped.

use axum::body::{Body, BodyDataStream};
use axum::extract::Request;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::Frame;
use http_body_util::BodyExt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

/// Default cap for request body snapshots (64 KiB).
pub const DEFAULT_REQUEST_BODY_MAX_SIZE: usize = 64 * 1024;
/// Default cap for response body capture (64 KiB).
pub const DEFAULT_RESPONSE_BODY_MAX_SIZE: usize = 64 * 1024;

/// A growable byte buffer bounded at a fixed capacity.
///
/// Owned exclusively by one in-flight request: created at entry, fed during
/// handler execution, read once when the log record is assembled.
#[derive(Debug)]
pub struct BodyCapture {
    buf: BytesMut,
    max_size: usize,
}

impl BodyCapture {
    pub fn new(max_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_size,
        }
    }

    /// Mirror a chunk into the buffer, truncated to the remaining capacity.
    ///
    /// Bytes beyond the cap are dropped from the buffer without any signal to
    /// the caller; the chunk itself always continues down the real path.
    pub fn push(&mut self, chunk: &[u8]) {
        let remaining = self.max_size.saturating_sub(self.buf.len());
        let take = remaining.min(chunk.len());
        if take > 0 {
            self.buf.extend_from_slice(&chunk[..take]);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the capture and return the mirrored bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Buffer the request body, hand back an equivalent body for the handler,
/// and return a capped snapshot for the log record.
///
/// A read failure is tolerated: the snapshot is dropped and the handler sees
/// an empty body, but the request proceeds.
pub(crate) async fn snapshot_request_body(request: &mut Request, max_size: usize) -> Option<Bytes> {
    let body = std::mem::replace(request.body_mut(), Body::empty());
    match body.collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let mut capture = BodyCapture::new(max_size);
            capture.push(&bytes);
            *request.body_mut() = Body::from(bytes);
            Some(capture.into_bytes())
        }
        Err(error) => {
            debug!(%error, "failed to read request body, skipping snapshot");
            None
        }
    }
}

/// Called exactly once with the mirrored bytes when the response body is
/// done, whether it ended cleanly, errored, or was dropped mid-stream.
pub(crate) type Finalizer = Box<dyn FnOnce(Bytes) + Send + 'static>;

/// Pass-through wrapper on a response body stream.
///
/// Each data frame the inner body yields is mirrored into a capped
/// [`BodyCapture`] and handed onward immediately, so the client observes the
/// same headers, bytes, timing, and errors it would without capture. The
/// finalizer fires once the stream completes (or the body is dropped, e.g.
/// on client disconnect), carrying the mirrored prefix.
pub(crate) struct CaptureBody {
    stream: BodyDataStream,
    capture: BodyCapture,
    finalize: Option<Finalizer>,
}

impl CaptureBody {
    /// Wrap a response body, mirroring at most `max_size` bytes.
    pub(crate) fn wrap(body: Body, max_size: usize, finalize: Finalizer) -> Body {
        Body::new(Self {
            stream: body.into_data_stream(),
            capture: BodyCapture::new(max_size),
            finalize: Some(finalize),
        })
    }

    fn finish(&mut self) {
        if let Some(finalize) = self.finalize.take() {
            let capture = std::mem::replace(&mut self.capture, BodyCapture::new(0));
            finalize(capture.into_bytes());
        }
    }
}

impl http_body::Body for CaptureBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.stream).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.capture.push(&chunk);
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
            Poll::Ready(Some(Err(error))) => {
                // Log what was mirrored so far; the client gets the error.
                this.finish();
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for CaptureBody {
    fn drop(&mut self) {
        self.finish();
    }
}
