//! The measurement engine contract and its default implementation.
//!
//! A measuring middleware hands the engine three things per request: a
//! handler id, a [`Reporter`] exposing what the request looks like, and the
//! wrapped handler as a future. The engine times the future, then reads the
//! reporter again (status and size only exist once the handler ran) and
//! hands the observation to a [`Recorder`].

mod config;
mod recorder;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::handler::BoxFuture;
use crate::request::Context;

pub use config::Config;
pub use recorder::{DummyRecorder, HttpProperties, HttpReqProperties, Recorder};

/// Read-only view of one request, as seen by the engine.
///
/// Values are computed on each call; status and size change while the
/// wrapped handler runs.
pub trait Reporter: Send + Sync {
    fn method(&self) -> &str;
    fn context(&self) -> &Context;
    /// Route identifier: raw path or route template, depending on the reporter.
    fn url_path(&self) -> &str;
    fn status_code(&self) -> u16;
    fn bytes_written(&self) -> u64;
}

/// A measurement engine.
///
/// Shared by every request, so implementations must be safe for concurrent
/// use.
pub trait Measure: Send + Sync + 'static {
    fn config(&self) -> &Config;

    /// Measures `next`, which runs the wrapped handler.
    ///
    /// Implementations must await `next` exactly once.
    fn measure<'a>(
        &'a self,
        handler_id: &'a str,
        reporter: &'a dyn Reporter,
        next: BoxFuture<'a>,
    ) -> BoxFuture<'a>;
}

// ── Metrics ───────────────────────────────────────────────────────────────────

/// The default engine: inflight gauge, request duration and response size,
/// forwarded to a [`Recorder`].
#[derive(Clone)]
pub struct Metrics {
    config: Config,
    recorder: Arc<dyn Recorder>,
}

impl Metrics {
    /// An engine that records into [`DummyRecorder`] until
    /// [`with_recorder`](Self::with_recorder) is called.
    pub fn new(config: Config) -> Self {
        debug!("no metrics recorder configured, observations are discarded");
        Self { config, recorder: Arc::new(DummyRecorder) }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    fn status_label(&self, code: u16) -> String {
        if self.config.grouped_status {
            format!("{}xx", code / 100)
        } else {
            code.to_string()
        }
    }

    fn record(&self, ctx: &Context, props: &HttpReqProperties, duration: Duration, size: u64) {
        trace!(
            service = %props.service,
            id = %props.id,
            method = %props.method,
            code = %props.code,
            duration_ms = duration.as_secs_f64() * 1000.0,
            size,
            "request measured"
        );
        self.recorder.observe_http_request_duration(ctx, props, duration);
        if !self.config.disable_measure_size {
            self.recorder.observe_http_response_size(ctx, props, size);
        }
    }
}

impl Measure for Metrics {
    fn config(&self) -> &Config {
        &self.config
    }

    fn measure<'a>(
        &'a self,
        handler_id: &'a str,
        reporter: &'a dyn Reporter,
        next: BoxFuture<'a>,
    ) -> BoxFuture<'a> {
        Box::pin(async move {
            let ctx = reporter.context();
            let id = if handler_id.is_empty() { reporter.url_path() } else { handler_id };

            if self.config.ignored_paths.contains(id) {
                next.await;
                return;
            }

            let _inflight = (!self.config.disable_measure_inflight).then(|| {
                let props = HttpProperties {
                    service: self.config.service.clone(),
                    id: id.to_owned(),
                };
                Inflight::start(self.recorder.as_ref(), ctx, props)
            });

            let start = Instant::now();
            next.await;
            let duration = start.elapsed();

            // A route template is only known once routing ran inside `next`.
            let id = if handler_id.is_empty() { reporter.url_path() } else { handler_id };
            if self.config.ignored_paths.contains(id) {
                return;
            }
            let props = HttpReqProperties {
                service: self.config.service.clone(),
                id: id.to_owned(),
                method: reporter.method().to_owned(),
                code: self.status_label(reporter.status_code()),
            };
            self.record(ctx, &props, duration, reporter.bytes_written());
        })
    }
}

/// Keeps a request counted as inflight until dropped, including when the
/// measured future is cancelled or unwinds.
struct Inflight<'a> {
    recorder: &'a dyn Recorder,
    ctx: &'a Context,
    props: HttpProperties,
}

impl<'a> Inflight<'a> {
    fn start(recorder: &'a dyn Recorder, ctx: &'a Context, props: HttpProperties) -> Self {
        recorder.add_inflight_requests(ctx, &props, 1);
        Self { recorder, ctx, props }
    }
}

impl Drop for Inflight<'_> {
    fn drop(&mut self) {
        self.recorder.add_inflight_requests(self.ctx, &self.props, -1);
    }
}
