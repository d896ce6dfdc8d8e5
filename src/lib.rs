//! # astor-metrics
//!
//! A minimal streaming HTTP toolkit for services behind a reverse proxy, and
//! a middleware that measures every request going through it.
//!
//! ## The handler model
//!
//! A handler writes its response through a [`ResponseWriter`]: set a status,
//! write body bytes, optionally flush or take over the connection. That
//! sink is what makes measurement possible without touching the handler: a
//! middleware slips a [`ResponseObserver`](middleware::ResponseObserver) in
//! between, counts what passes, and forwards everything unchanged.
//!
//! - Radix-tree routing via [`matchit`]; the matched template (`/users/{id}`)
//!   is recorded on the request
//! - hyper underneath: HTTP/1.1, HTTP/2, upgrades
//! - Graceful shutdown: SIGTERM / Ctrl-C, drains in-flight requests
//! - [`middleware::measure`]: method, route, status, bytes and latency of
//!   every request, reported to a [`metrics::Measure`] engine
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use astor_metrics::metrics::{Config, Measure, Metrics};
//! use astor_metrics::middleware::{measure, Chain};
//! use astor_metrics::{handler_fn, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let metrics: Arc<dyn Measure> = Arc::new(Metrics::new(Config {
//!         use_route_pattern: true,
//!         ..Config::default()
//!     }));
//!
//!     let router = Router::new()
//!         .get("/users/{id}", handler_fn(|w, req| Box::pin(async move {
//!             let body = format!(r#"{{"id":"{}"}}"#, req.param("id").unwrap_or("unknown"));
//!             let _ = w.write(body.as_bytes());
//!         })));
//!
//!     let app = Chain::new()
//!         .with(measure::handler_provider("", metrics))
//!         .then(router);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod metrics;
pub mod middleware;
pub mod testing;

pub use error::Error;
pub use handler::{handler_fn, BoxFuture, BoxedHandler, Handler, HandlerFn};
pub use request::{Context, Request, RouteContext};
pub use response::{Flusher, Hijacked, Hijacker, ResponseWriter, CHUNK_SIZE};
pub use router::Router;
pub use server::{serve_with_shutdown, shutdown_signal, Server};
