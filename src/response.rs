//! The response sink handlers write through.
//!
//! [`ResponseWriter`] is the baseline contract: headers, a status, body
//! bytes. Two capabilities are optional and probed at runtime, because many
//! sinks legitimately lack them:
//!
//! | Capability | Probe | Without it |
//! |---|---|---|
//! | [`Flusher`] | `w.flusher()` | nothing to flush, buffered bytes go out at the end |
//! | [`Hijacker`] | `w.hijacker()` | the connection cannot be taken over |
//!
//! The server's own sink streams: it buffers up to [`CHUNK_SIZE`] bytes,
//! sends the response head on the first flush (or chunk, or when the handler
//! returns), and supports both capabilities.

use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use hyper::body::{Body, Frame};
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::request::CancelOnDrop;

/// Buffered body bytes are sent as a chunk once they reach this size.
pub const CHUNK_SIZE: usize = 4096;

/// Chunks queued for the client before a writer has to wait for it.
pub(crate) const BODY_CHUNKS: usize = 8;

// ── Capability contracts ──────────────────────────────────────────────────────

/// The sink a handler emits its response through.
pub trait ResponseWriter: Send {
    /// Response headers. Changes after the head has been sent have no effect.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Announces the status code. Writing body bytes first implies `200`.
    fn write_header(&mut self, status: u16);

    /// Appends body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Probe for the explicit-flush capability.
    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    /// Probe for the connection-takeover capability.
    fn hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }
}

/// Sends buffered response data to the client now.
pub trait Flusher {
    fn flush(&mut self);
}

/// Takes over the underlying connection.
///
/// After a successful hijack the sink no longer owns the connection: further
/// writes through it fail.
pub trait Hijacker {
    fn hijack(&mut self) -> Result<Hijacked, Error>;
}

/// A connection handed over by [`Hijacker::hijack`].
///
/// The protocol switch completes once the response head (normally
/// `101 Switching Protocols`) has reached the client; [`connection`](Self::connection)
/// waits for that.
pub struct Hijacked {
    upgrade: OnUpgrade,
}

impl Hijacked {
    pub fn new(upgrade: OnUpgrade) -> Self {
        Self { upgrade }
    }

    /// Waits for the switch and returns the raw connection. Bytes the client
    /// sent ahead of the switch are replayed first by the returned IO.
    pub async fn connection(self) -> Result<TokioIo<Upgraded>, Error> {
        let upgraded = self.upgrade.await?;
        Ok(TokioIo::new(upgraded))
    }
}

// ── Server sink ───────────────────────────────────────────────────────────────

pub(crate) type Head = (StatusCode, HeaderMap);

/// The streaming sink the server hands to every handler.
///
/// The head travels over a oneshot so the server can answer hyper as soon as
/// the handler commits to a status; body chunks follow over a channel of
/// [`BODY_CHUNKS`] that feeds [`ChannelBody`].
///
/// When the client reads slower than the handler writes, the channel fills
/// up. On the multi-threaded runtime the writer then blocks its worker until
/// the client catches up. Elsewhere blocking would stall the reader too, so
/// the bytes stay buffered and go out on the next send or in [`finish`](Self::finish).
pub(crate) struct StreamWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    head: Option<oneshot::Sender<Head>>,
    body: Option<mpsc::Sender<Bytes>>,
    buf: BytesMut,
    upgrade: Option<OnUpgrade>,
    hijacked: bool,
}

impl StreamWriter {
    pub(crate) fn new(
        head: oneshot::Sender<Head>,
        body: mpsc::Sender<Bytes>,
        upgrade: Option<OnUpgrade>,
    ) -> Self {
        Self {
            headers: HeaderMap::new(),
            status: None,
            head: Some(head),
            body: Some(body),
            buf: BytesMut::new(),
            upgrade,
            hijacked: false,
        }
    }

    /// Called once the handler returned: sends whatever is still pending.
    ///
    /// Not called when the handler panics, so the server can tell a panic
    /// (head sender dropped) from a normal empty `200`.
    pub(crate) fn finish(mut self) {
        if self.hijacked {
            return;
        }
        let _ = self.send_chunk();
        if self.buf.is_empty() {
            return;
        }
        // Still full: hand the tail to a task that can wait for the client.
        if let (Some(tx), Ok(rt)) = (self.body.take(), Handle::try_current()) {
            let rest = self.buf.split().freeze();
            rt.spawn(async move {
                let _ = tx.send(rest).await;
            });
        }
    }

    fn send_head(&mut self) {
        if let Some(tx) = self.head.take() {
            let status = *self.status.get_or_insert(StatusCode::OK);
            // The receiver is gone only if the client went away first.
            let _ = tx.send((status, self.headers.clone()));
        }
    }

    fn send_chunk(&mut self) -> io::Result<()> {
        self.send_head();
        if self.buf.is_empty() {
            return Ok(());
        }
        let Some(tx) = self.body.as_ref() else {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"));
        };
        let chunk = self.buf.split().freeze();
        let open = match tx.try_send(chunk) {
            Ok(()) => true,
            Err(TrySendError::Full(chunk)) if can_block() => {
                tokio::task::block_in_place(|| tx.blocking_send(chunk)).is_ok()
            }
            Err(TrySendError::Full(chunk)) => {
                self.buf.extend_from_slice(&chunk);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        };
        if open {
            return Ok(());
        }
        self.body = None;
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
    }
}

/// Whether the current thread may block on a full body channel.
fn can_block() -> bool {
    Handle::try_current().is_ok_and(|rt| rt.runtime_flavor() == RuntimeFlavor::MultiThread)
}

impl ResponseWriter for StreamWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: u16) {
        if self.status.is_some() || self.hijacked {
            warn!(status, "superfluous write_header call");
            return;
        }
        let status = StatusCode::from_u16(status).unwrap_or_else(|_| {
            error!(status, "invalid status code, responding 500");
            StatusCode::INTERNAL_SERVER_ERROR
        });
        self.status = Some(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.hijacked {
            return Err(io::Error::other(Error::Hijacked));
        }
        if self.status.is_none() {
            self.write_header(StatusCode::OK.as_u16());
        }
        if self.body.is_none() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"));
        }
        self.buf.extend_from_slice(buf);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_chunk()?;
        }
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }

    /// Offered only for requests that asked to switch protocols.
    fn hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        if self.upgrade.is_some() || self.hijacked { Some(self) } else { None }
    }
}

impl Flusher for StreamWriter {
    fn flush(&mut self) {
        if self.hijacked {
            return;
        }
        if let Err(e) = self.send_chunk() {
            debug!("flush dropped: {e}");
        }
    }
}

impl Hijacker for StreamWriter {
    fn hijack(&mut self) -> Result<Hijacked, Error> {
        if self.hijacked {
            return Err(Error::Hijacked);
        }
        if self.head.is_none() {
            return Err(Error::HeadersSent);
        }
        let upgrade = self.upgrade.take().ok_or_else(|| {
            Error::CapabilityUnsupported("connection does not support upgrades".to_owned())
        })?;

        self.status.get_or_insert(StatusCode::SWITCHING_PROTOCOLS);
        self.send_head();
        self.buf.clear();
        self.body = None;
        self.hijacked = true;
        Ok(Hijacked::new(upgrade))
    }
}

// ── Response body ─────────────────────────────────────────────────────────────

/// The body hyper streams to the client, fed by a [`StreamWriter`].
///
/// Holds the request's cancellation guard: when hyper drops the body (because
/// it finished or the client went away) the request's
/// [`Context`](crate::Context) is cancelled.
pub(crate) struct ChannelBody {
    rx: Option<mpsc::Receiver<Bytes>>,
    _cancel: Arc<CancelOnDrop>,
}

impl ChannelBody {
    pub(crate) fn new(rx: mpsc::Receiver<Bytes>, cancel: Arc<CancelOnDrop>) -> Self {
        Self { rx: Some(rx), _cancel: cancel }
    }

    pub(crate) fn empty(cancel: Arc<CancelOnDrop>) -> Self {
        Self { rx: None, _cancel: cancel }
    }
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        match self.rx.as_mut() {
            Some(rx) => rx.poll_recv(cx).map(|chunk| chunk.map(|b| Ok(Frame::data(b)))),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.rx.is_none()
    }
}
