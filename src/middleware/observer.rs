//! A response writer that watches what goes through it.

use std::io;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use http::HeaderMap;

use crate::error::Error;
use crate::response::{Flusher, Hijacked, Hijacker, ResponseWriter};

/// The numbers a [`ResponseObserver`] collects for one request.
///
/// Written by the observer, read by the reporter while the handler is still
/// running, hence atomics. Never shared across requests.
#[derive(Debug)]
pub struct ResponseStats {
    status: AtomicU16,
    bytes: AtomicU64,
}

impl ResponseStats {
    /// Status starts at `200`, the implicit status of a response that never
    /// announces one.
    pub fn new() -> Self {
        Self { status: AtomicU16::new(200), bytes: AtomicU64::new(0) }
    }

    pub fn status_code(&self) -> u16 {
        self.status.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl Default for ResponseStats {
    fn default() -> Self { Self::new() }
}

/// Wraps a [`ResponseWriter`], recording the status and byte count while
/// forwarding every call unchanged.
///
/// The observer always offers both optional capabilities. Flushing an inner
/// writer that cannot flush does nothing; hijacking one that cannot hijack
/// fails with [`Error::CapabilityUnsupported`].
pub struct ResponseObserver<'a> {
    inner: &'a mut dyn ResponseWriter,
    stats: &'a ResponseStats,
}

impl<'a> ResponseObserver<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter, stats: &'a ResponseStats) -> Self {
        Self { inner, stats }
    }

    pub fn status_code(&self) -> u16 { self.stats.status_code() }
    pub fn bytes_written(&self) -> u64 { self.stats.bytes_written() }
}

impl ResponseWriter for ResponseObserver<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// Records the latest status verbatim, whatever the inner writer makes of it.
    fn write_header(&mut self, status: u16) {
        self.stats.status.store(status, Ordering::Relaxed);
        self.inner.write_header(status);
    }

    /// Counts the attempt before delegating, so failed writes still count.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stats.bytes.fetch_add(buf.len() as u64, Ordering::Relaxed);
        self.inner.write(buf)
    }

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        Some(self)
    }
}

impl Flusher for ResponseObserver<'_> {
    fn flush(&mut self) {
        if let Some(f) = self.inner.flusher() {
            f.flush();
        }
    }
}

impl Hijacker for ResponseObserver<'_> {
    fn hijack(&mut self) -> Result<Hijacked, Error> {
        match self.inner.hijacker() {
            Some(h) => h.hijack(),
            None => Err(Error::CapabilityUnsupported(
                "response writer does not support hijacking".to_owned(),
            )),
        }
    }
}
