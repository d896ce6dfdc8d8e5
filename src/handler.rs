//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The router, the server and every middleware hold handlers of *different*
//! concrete types. We hide them behind one trait object (`dyn Handler`) and
//! share it with an `Arc`, so the server can hand the same handler to many
//! concurrent request tasks.
//!
//! ```text
//! struct Hello;  impl Handler for Hello { … }      ← user writes this
//!        ↓ router.get("/", Hello)
//! Arc::new(Hello)                                  ← BoxedHandler
//!        ↓  wrapped by middleware: Arc::new(Measured { next, … })
//! handler.serve(&mut writer, &req)  per request    ← one vtable dispatch
//!        ↓
//! Box::pin(async move { … })                       ← BoxFuture<'a>
//! ```
//!
//! The future borrows both the writer and the request for `'a`. That is what
//! lets a middleware substitute its own writer for the real one: it lends the
//! wrapped handler a `&mut` to a wrapper living in its own future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::ResponseWriter;

/// A heap-allocated, type-erased future borrowing the writer and request.
///
/// `Send` lets tokio move the request task across worker threads.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A request handler.
///
/// A handler produces side effects only: it sets a status, writes body bytes,
/// maybe flushes or takes over the connection. There is no return value; the
/// response is whatever went through `w`.
///
/// ```rust
/// use astor_metrics::{BoxFuture, Handler, Request, ResponseWriter};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     fn serve<'a>(&'a self, w: &'a mut dyn ResponseWriter, _req: &'a Request) -> BoxFuture<'a> {
///         Box::pin(async move {
///             let _ = w.write(b"hello");
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn serve<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: &'a Request) -> BoxFuture<'a>;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

impl Handler for BoxedHandler {
    fn serve<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: &'a Request) -> BoxFuture<'a> {
        (**self).serve(w, req)
    }
}

// ── Closures ──────────────────────────────────────────────────────────────────

/// Builds a [`Handler`] from a closure.
///
/// Because the future borrows its arguments, the closure returns a pinned box
/// rather than being an `async fn`:
///
/// ```rust
/// use astor_metrics::{handler_fn, Router};
///
/// let app = Router::new().get("/ping", handler_fn(|w, _req| Box::pin(async move {
///     let _ = w.write(b"pong");
/// })));
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut dyn ResponseWriter, &'a Request) -> BoxFuture<'a> + Send + Sync + 'static,
{
    HandlerFn(f)
}

/// Newtype wrapper returned by [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F>(F);

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut dyn ResponseWriter, &'a Request) -> BoxFuture<'a> + Send + Sync + 'static,
{
    fn serve<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: &'a Request) -> BoxFuture<'a> {
        (self.0)(w, req)
    }
}
