//! Measured JSON endpoints, with observations printed through `tracing`.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X DELETE http://localhost:3000/users/42
//!   curl http://localhost:3000/events
//!   curl http://localhost:3000/healthz

use std::sync::Arc;
use std::time::Duration;

use astor_metrics::metrics::{Config, HttpProperties, HttpReqProperties, Measure, Metrics, Recorder};
use astor_metrics::middleware::{measure, Chain};
use astor_metrics::{handler_fn, Context, Router, Server};
use tracing::info;

const CONFIG: &str = r#"
service: users
ignored_paths: ["/healthz"]
use_route_pattern: true
"#;

/// Prints every observation instead of exporting it.
struct LogRecorder;

impl Recorder for LogRecorder {
    fn observe_http_request_duration(&self, _: &Context, p: &HttpReqProperties, d: Duration) {
        info!(service = %p.service, id = %p.id, method = %p.method, code = %p.code, ?d, "duration");
    }

    fn observe_http_response_size(&self, _: &Context, p: &HttpReqProperties, size: u64) {
        info!(service = %p.service, id = %p.id, method = %p.method, code = %p.code, size, "size");
    }

    fn add_inflight_requests(&self, _: &Context, p: &HttpProperties, quantity: i64) {
        info!(service = %p.service, id = %p.id, quantity, "inflight");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_yaml_str(CONFIG).expect("invalid config");
    let metrics: Arc<dyn Measure> = Arc::new(Metrics::new(config).with_recorder(Arc::new(LogRecorder)));

    let router = Router::new()
        .get("/users/{id}", handler_fn(|w, req| Box::pin(async move {
            let id = req.param("id").unwrap_or("unknown");
            w.headers_mut().insert("content-type", "application/json".parse().unwrap());
            let _ = w.write(format!(r#"{{"id":"{id}","name":"alice"}}"#).as_bytes());
        })))
        .delete("/users/{id}", handler_fn(|w, _| Box::pin(async move {
            w.write_header(204);
        })))
        // Flushed chunks reach the client as they are written.
        .get("/events", handler_fn(|w, _| Box::pin(async move {
            for n in 0..3 {
                let _ = w.write(format!("event {n}\n").as_bytes());
                if let Some(f) = w.flusher() {
                    f.flush();
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })))
        .get("/healthz", handler_fn(|w, _| Box::pin(async move {
            let _ = w.write(b"ok");
        })));

    let app = Chain::new()
        .with(measure::handler_provider("", metrics))
        .then(router);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}
