//! The measuring middleware.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use astor_metrics::metrics::{Config, Measure, Metrics};
//! use astor_metrics::middleware::{measure, Chain};
//! use astor_metrics::{handler_fn, Router};
//!
//! let metrics: Arc<dyn Measure> = Arc::new(Metrics::new(Config {
//!     use_route_pattern: true,
//!     ..Config::default()
//! }));
//!
//! let router = Router::new().get("/users/{id}", handler_fn(|w, _| Box::pin(async move {
//!     let _ = w.write(b"{}");
//! })));
//!
//! // Every request is labelled `/users/{id}`, not `/users/42`.
//! let app = Chain::new()
//!     .with(measure::handler_provider("", metrics))
//!     .then(router);
//! # let _ = app;
//! ```

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::metrics::Measure;
use crate::middleware::observer::{ResponseObserver, ResponseStats};
use crate::middleware::reporter::{RequestReporter, RouteLabel};
use crate::request::Request;
use crate::response::ResponseWriter;

/// Wraps `next` so every request through it is measured by `measure` under
/// `handler_id`.
///
/// An empty `handler_id` lets the engine label requests by their route
/// identifier instead.
pub fn handler(
    handler_id: impl Into<String>,
    measure: Arc<dyn Measure>,
    next: impl Handler,
) -> MeasuredHandler {
    MeasuredHandler {
        handler_id: handler_id.into(),
        measure,
        next: Arc::new(next),
    }
}

/// [`handler`] with the id and engine fixed, in the handler-wrapping-handler
/// shape middleware chains expect.
pub fn handler_provider(
    handler_id: impl Into<String>,
    measure: Arc<dyn Measure>,
) -> impl Fn(BoxedHandler) -> BoxedHandler + Clone + Send + Sync + 'static {
    let handler_id: Arc<str> = Arc::from(handler_id.into());
    move |next: BoxedHandler| -> BoxedHandler {
        Arc::new(handler(handler_id.as_ref(), Arc::clone(&measure), next))
    }
}

/// A handler whose requests are reported to a measurement engine.
pub struct MeasuredHandler {
    handler_id: String,
    measure: Arc<dyn Measure>,
    next: BoxedHandler,
}

impl Handler for MeasuredHandler {
    fn serve<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: &'a Request) -> BoxFuture<'a> {
        Box::pin(async move {
            let stats = ResponseStats::new();
            let label = RouteLabel::from_config(self.measure.config().use_route_pattern);
            let reporter = RequestReporter::new(req, &stats, label);
            let mut observer = ResponseObserver::new(w, &stats);

            let next = &self.next;
            let call = Box::pin(async move { next.serve(&mut observer, req).await });

            self.measure.measure(&self.handler_id, &reporter, call).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::handler::handler_fn;
    use crate::metrics::{Config, Reporter};
    use crate::response::{Flusher, Hijacker};
    use crate::router::Router;
    use crate::testing::ResponseRecorder;

    #[derive(Debug, PartialEq)]
    struct Seen {
        handler_id: String,
        method: String,
        path: String,
        status: u16,
        bytes: u64,
    }

    /// Records what the reporter says once the wrapped handler has run.
    #[derive(Default)]
    struct Probe {
        config: Config,
        seen: Mutex<Vec<Seen>>,
    }

    impl Measure for Probe {
        fn config(&self) -> &Config { &self.config }

        fn measure<'a>(
            &'a self,
            handler_id: &'a str,
            reporter: &'a dyn Reporter,
            next: BoxFuture<'a>,
        ) -> BoxFuture<'a> {
            Box::pin(async move {
                next.await;
                self.seen.lock().unwrap().push(Seen {
                    handler_id: handler_id.to_owned(),
                    method: reporter.method().to_owned(),
                    path: reporter.url_path().to_owned(),
                    status: reporter.status_code(),
                    bytes: reporter.bytes_written(),
                });
            })
        }
    }

    fn probe(use_route_pattern: bool) -> Arc<Probe> {
        Arc::new(Probe {
            config: Config { use_route_pattern, ..Config::default() },
            ..Probe::default()
        })
    }

    fn request(method: &str, path: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    fn ten_bytes() -> impl Handler {
        handler_fn(|w, _| Box::pin(async move {
            let _ = w.write(b"0123456789");
        }))
    }

    #[tokio::test]
    async fn reports_default_status_and_body_size() {
        let probe = probe(false);
        let measured = handler("users", probe.clone(), ten_bytes());
        let req = request("GET", "/users/42");
        let mut rec = ResponseRecorder::new();

        measured.serve(&mut rec, &req).await;

        assert_eq!(rec.body(), b"0123456789");
        assert_eq!(*probe.seen.lock().unwrap(), vec![Seen {
            handler_id: "users".into(),
            method: "GET".into(),
            path: "/users/42".into(),
            status: 200,
            bytes: 10,
        }]);
    }

    #[tokio::test]
    async fn reports_explicit_status() {
        let probe = probe(false);
        let measured = handler("", probe.clone(), handler_fn(|w, _| Box::pin(async move {
            w.write_header(204);
        })));
        let mut rec = ResponseRecorder::new();

        measured.serve(&mut rec, &request("DELETE", "/users/42")).await;

        let seen = probe.seen.lock().unwrap();
        assert_eq!((seen[0].status, seen[0].bytes), (204, 0));
        assert_eq!(rec.status(), 204);
    }

    #[tokio::test]
    async fn pattern_label_sees_the_route_matched_inside() {
        let probe = probe(true);
        let router = Router::new().get("/users/{id}", ten_bytes());
        let router: BoxedHandler = Arc::new(router);
        let app = handler_provider("", probe.clone())(router);
        let mut rec = ResponseRecorder::new();

        app.serve(&mut rec, &request("GET", "/users/42")).await;
        app.serve(&mut rec, &request("GET", "/missing")).await;

        let seen = probe.seen.lock().unwrap();
        assert_eq!(seen[0].path, "/users/{id}");
        assert_eq!(seen[1].path, "");
        assert_eq!(seen[1].status, 404);
    }

    #[tokio::test]
    async fn wrapped_handler_can_flush_and_hijack_through_the_observer() {
        let probe = probe(false);
        let measured = handler("ws", probe.clone(), handler_fn(|w, _| Box::pin(async move {
            if let Some(f) = w.flusher() {
                f.flush();
            }
            let hijacked = w.hijacker().map(|h| h.hijack().is_ok());
            assert_eq!(hijacked, Some(true));
        })));
        let mut rec = ResponseRecorder::new().with_flush().with_hijack();

        measured.serve(&mut rec, &request("GET", "/ws")).await;

        assert_eq!(rec.flushes(), 1);
        assert!(rec.hijacked());
    }
}
