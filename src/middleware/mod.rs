//! Middleware layer.
//!
//! A middleware takes a handler and returns one that wraps it. This is the
//! right place for cross-cutting concerns: metrics, tracing, request ids.
//!
//! Built in:
//! - [`measure`]: reports method, route, status and size of every request to
//!   a [`Measure`](crate::metrics::Measure) engine.

pub mod measure;
pub mod observer;
pub mod reporter;

use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};

pub use observer::{ResponseObserver, ResponseStats};
pub use reporter::{RequestReporter, RouteLabel};

/// A handler-wrapping-handler, as stored by [`Chain`].
pub type Middleware = Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>;

/// An ordered list of middleware.
///
/// The first middleware added is the outermost: it sees the request first
/// and the finished response last.
///
/// ```rust
/// # use astor_metrics::middleware::Chain;
/// # use astor_metrics::{handler_fn, BoxedHandler};
/// # let logging = |next: BoxedHandler| next;
/// # let auth = |next: BoxedHandler| next;
/// # let app = handler_fn(|_, _| Box::pin(async {}));
/// // logging(auth(app))
/// let handler = Chain::new().with(logging).with(auth).then(app);
/// # let _ = handler;
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    layers: Vec<Middleware>,
}

impl Chain {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn with(
        mut self,
        middleware: impl Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    ) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize { self.layers.len() }
    pub fn is_empty(&self) -> bool { self.layers.is_empty() }

    /// Wraps `handler` in every middleware, innermost last-added.
    pub fn then(&self, handler: impl Handler) -> BoxedHandler {
        let handler: BoxedHandler = Arc::new(handler);
        self.layers.iter().rev().fold(handler, |next, layer| layer(next))
    }
}
