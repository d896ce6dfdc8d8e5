//! Incoming HTTP request type and its per-request context.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri, Version};
use tokio::sync::watch;

/// An incoming HTTP request with its body fully read.
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    context: Context,
}

impl Request {
    pub(crate) fn new(
        parts: http::request::Parts,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
        context: Context,
    ) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            body,
            remote_addr,
            context,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Peer address, when the request came through the [`Server`](crate::Server).
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Cancellation and routing metadata for this request.
    pub fn context(&self) -> &Context { &self.context }

    /// Case-insensitive header lookup. Non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    /// Always `None` until a [`Router`](crate::Router) has matched the request.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.context.route().param(key)
    }
}

/// Builds a request with a context that is never cancelled.
///
/// Handy for driving handlers directly in tests.
impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body, None, Context::background())
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Per-request context: a cancellation signal plus the routing metadata the
/// router attached while matching.
///
/// Cheap to clone; clones observe the same cancellation and route.
#[derive(Clone, Debug)]
pub struct Context {
    cancel: Option<watch::Receiver<bool>>,
    route: Arc<RouteContext>,
}

impl Context {
    /// A context that is never cancelled and has no route yet.
    pub fn background() -> Self {
        Self { cancel: None, route: Arc::default() }
    }

    /// Returns a context cancelled when the returned [`CancelOnDrop`] drops.
    pub(crate) fn with_cancel() -> (Self, CancelOnDrop) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self { cancel: Some(rx), route: Arc::default() };
        (ctx, CancelOnDrop(tx))
    }

    /// `true` once the request is finished or the client went away.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves when the context is cancelled. Never resolves for
    /// [`Context::background`].
    pub async fn cancelled(&self) {
        let Some(rx) = &self.cancel else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        // A closed channel means the canceller is gone with the request.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Routing metadata for this request.
    pub fn route(&self) -> &RouteContext { &self.route }
}

/// Cancels the paired [`Context`] when dropped.
pub(crate) struct CancelOnDrop(watch::Sender<bool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

// ── RouteContext ──────────────────────────────────────────────────────────────

/// What the router learned about a request: the matched route template and
/// its parameters.
///
/// Filled in at most once, during routing. Middleware wrapping the router
/// sees it populated after the wrapped handler returns.
#[derive(Debug, Default)]
pub struct RouteContext {
    matched: OnceLock<RouteMatch>,
}

#[derive(Debug)]
struct RouteMatch {
    pattern: String,
    params: Vec<(String, String)>,
}

impl RouteContext {
    /// The normalized route template, e.g. `/users/{id}`.
    ///
    /// Empty when no route matched (or no router ran).
    pub fn pattern(&self) -> &str {
        self.matched.get().map_or("", |m| m.pattern.as_str())
    }

    pub fn is_matched(&self) -> bool {
        self.matched.get().is_some()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.matched
            .get()?
            .params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First match wins; later calls are ignored.
    pub(crate) fn set(&self, pattern: &str, params: Vec<(String, String)>) {
        let _ = self.matched.set(RouteMatch { pattern: pattern.to_owned(), params });
    }
}
