//! Where observations go.
//!
//! The engine decides *what* to observe; a [`Recorder`] decides how to store
//! or export it. Backends (Prometheus, OpenTelemetry, StatsD…) live outside
//! this crate and implement the trait.

use std::time::Duration;

use crate::request::Context;

/// Labels shared by every observation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HttpProperties {
    pub service: String,
    /// Handler id, or the route identifier when no id was given.
    pub id: String,
}

/// Labels of a finished request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HttpReqProperties {
    pub service: String,
    pub id: String,
    pub method: String,
    /// `"200"`, or `"2xx"` with grouped status codes.
    pub code: String,
}

/// Storage backend for request observations.
///
/// Called concurrently from every in-flight request.
pub trait Recorder: Send + Sync {
    fn observe_http_request_duration(&self, ctx: &Context, props: &HttpReqProperties, duration: Duration);
    fn observe_http_response_size(&self, ctx: &Context, props: &HttpReqProperties, size: u64);
    fn add_inflight_requests(&self, ctx: &Context, props: &HttpProperties, quantity: i64);
}

/// Discards everything. The default when no recorder is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DummyRecorder;

impl Recorder for DummyRecorder {
    fn observe_http_request_duration(&self, _: &Context, _: &HttpReqProperties, _: Duration) {}
    fn observe_http_response_size(&self, _: &Context, _: &HttpReqProperties, _: u64) {}
    fn add_inflight_requests(&self, _: &Context, _: &HttpProperties, _: i64) {}
}
