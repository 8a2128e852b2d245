//! Long-lived telemetry stream over chunked HTTP.
//!
//! [`open`] issues one authenticated `GET`, then pumps the response body
//! chunk by chunk into a caller-supplied callback on a background task.
//! Chunks are forwarded as text, exactly as they arrive; aligning them to
//! frames is the job of [`FrameDecoder`](crate::sse::FrameDecoder).
//!
//! There is no reconnection. The task ends on natural end of stream
//! (silently), on the first error (reported once), or when the returned
//! [`StreamHandle`] is cancelled or dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use emitwatch_api::{stream, BearerToken, FrameDecoder};
//!
//! let mut decoder = FrameDecoder::new();
//! let handle = stream::open(
//!     http,
//!     endpoint,
//!     &BearerToken::anonymous(),
//!     move |text| {
//!         for frame in decoder.feed(text) {
//!             println!("{}", frame.payload);
//!         }
//!     },
//!     |err| eprintln!("stream failed: {err}"),
//! );
//!
//! handle.cancel();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use url::Url;

use crate::auth::BearerToken;
use crate::error::Error;

const EVENT_STREAM: &str = "text/event-stream";

// ── StreamHandle ─────────────────────────────────────────────────────

/// Handle to one open stream attempt.
///
/// Cancelling marks the handle closed (so a late error is never
/// reported) and aborts the in-flight read, releasing the connection.
/// Dropping the handle cancels it as well.
pub struct StreamHandle {
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Stop the stream. Safe to call any number of times.
    pub fn cancel(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("cancelling telemetry stream");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// `true` once the background read task has exited for any reason.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// The token the read loop watches. Callers can use it to gate their
    /// own dispatch on the same cancellation.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── open ─────────────────────────────────────────────────────────────

/// Open the stream at `endpoint` and spawn the read loop.
///
/// `on_chunk` receives every body chunk as text, in arrival order.
/// `on_error` is called at most once, only if the handle has not been
/// cancelled, for a non-success status or a mid-stream failure.
/// Must be called from within a tokio runtime.
pub fn open<C, E>(
    http: &reqwest::Client,
    endpoint: Url,
    token: &BearerToken,
    on_chunk: C,
    on_error: E,
) -> StreamHandle
where
    C: FnMut(&str) + Send + 'static,
    E: FnOnce(Error) + Send + 'static,
{
    info!(url = %endpoint, "opening telemetry stream");

    let request = http
        .get(endpoint)
        .header(ACCEPT, EVENT_STREAM)
        .header(AUTHORIZATION, token.header_value());

    let cancel = CancellationToken::new();
    let closed = Arc::new(AtomicBool::new(false));

    let task = tokio::spawn(stream_task(
        request,
        on_chunk,
        on_error,
        cancel.clone(),
        Arc::clone(&closed),
    ));

    StreamHandle {
        cancel,
        closed,
        task,
    }
}

// ── Background read loop ─────────────────────────────────────────────

async fn stream_task<C, E>(
    request: reqwest::RequestBuilder,
    mut on_chunk: C,
    on_error: E,
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
) where
    C: FnMut(&str) + Send,
    E: FnOnce(Error),
{
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!("telemetry stream cancelled");
            return;
        }
        result = read_body(request, &mut on_chunk, &cancel) => result,
    };

    match result {
        Ok(()) => debug!("telemetry stream ended"),
        Err(e) if closed.load(Ordering::SeqCst) || cancel.is_cancelled() => {
            debug!(error = %e, "suppressing error from cancelled stream");
        }
        Err(e) => on_error(e),
    }
}

/// Send the request, check the status, then forward body chunks until
/// the body ends or fails.
async fn read_body<C>(
    request: reqwest::RequestBuilder,
    on_chunk: &mut C,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    C: FnMut(&str) + Send,
{
    let response = request.send().await?;
    let status = response.status();
    info!(status = status.as_u16(), "telemetry stream response");

    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication {
            message: "stream request rejected (HTTP 401)".into(),
        });
    }
    if !status.is_success() {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
        });
    }

    let mut body = response.bytes_stream();
    let mut text = Utf8ChunkDecoder::default();

    while let Some(chunk) = body.next().await {
        let bytes = chunk.map_err(|e| Error::StreamRead(e.to_string()))?;
        trace!(len = bytes.len(), "stream chunk");

        let decoded = text.decode(&bytes);
        if decoded.is_empty() {
            continue;
        }
        if cancel.is_cancelled() {
            return Ok(());
        }
        on_chunk(&decoded);
    }

    Ok(())
}

// ── Incremental UTF-8 ────────────────────────────────────────────────

/// Decodes byte chunks to text, carrying a multi-byte character that was
/// split across reads over to the next chunk. Invalid sequences become
/// U+FFFD.
#[derive(Debug, Default)]
struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + bad);
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid_up_to);
                            break;
                        }
                    }
                }
            }
        }

        out
    }
}

// ── Tests ────────────────────────────────────────────────────────────
