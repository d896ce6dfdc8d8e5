//! In-memory response sink for exercising handlers without a server.
//!
//! ```rust
//! use astor_metrics::testing::ResponseRecorder;
//! use astor_metrics::{Flusher, ResponseWriter};
//!
//! let mut rec = ResponseRecorder::new().with_flush();
//! rec.write(b"hi").unwrap();
//! rec.flusher().unwrap().flush();
//!
//! assert_eq!(rec.status(), 200);
//! assert_eq!(rec.body(), b"hi");
//! assert_eq!(rec.flushes(), 1);
//! ```

use std::io;

use http::HeaderMap;

use crate::error::Error;
use crate::response::{Flusher, Hijacked, Hijacker, ResponseWriter};

/// Records everything written through it.
///
/// By default it supports neither optional capability; switch them on with
/// [`with_flush`](Self::with_flush) and [`with_hijack`](Self::with_hijack).
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    headers: HeaderMap,
    status: Option<u16>,
    status_calls: Vec<u16>,
    body: Vec<u8>,
    fail_writes: bool,
    flush: bool,
    flushes: usize,
    hijack: bool,
    hijacked: bool,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise the [`Flusher`] capability.
    pub fn with_flush(mut self) -> Self {
        self.flush = true;
        self
    }

    /// Advertise the [`Hijacker`] capability.
    ///
    /// The handed-over connection never completes its upgrade; awaiting
    /// [`Hijacked::connection`] fails.
    pub fn with_hijack(mut self) -> Self {
        self.hijack = true;
        self
    }

    /// Make every `write` fail after it has been recorded as attempted.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// The first announced status, or `200` if none was.
    pub fn status(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    /// Every status passed to `write_header`, in order.
    pub fn status_calls(&self) -> &[u16] { &self.status_calls }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn flushes(&self) -> usize { self.flushes }
    pub fn hijacked(&self) -> bool { self.hijacked }
}

impl ResponseWriter for ResponseRecorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: u16) {
        self.status_calls.push(status);
        self.status.get_or_insert(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "recorder rejects writes"));
        }
        if self.hijacked {
            return Err(io::Error::other(Error::Hijacked));
        }
        self.status.get_or_insert(200);
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        if self.flush { Some(self) } else { None }
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        if self.hijack { Some(self) } else { None }
    }
}

impl Flusher for ResponseRecorder {
    fn flush(&mut self) {
        self.flushes += 1;
    }
}

impl Hijacker for ResponseRecorder {
    fn hijack(&mut self) -> Result<Hijacked, Error> {
        if self.hijacked {
            return Err(Error::Hijacked);
        }
        self.hijacked = true;
        Ok(Hijacked::new(hyper::upgrade::on(http::Request::new(()))))
    }
}
