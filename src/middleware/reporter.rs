//! Request reporters: what the measurement engine sees of a request.

use crate::metrics::Reporter;
use crate::middleware::observer::ResponseStats;
use crate::request::{Context, Request};

/// How a reporter labels the route of a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RouteLabel {
    /// The literal request path: `/users/123` and `/users/456` differ.
    #[default]
    Path,
    /// The route template the router matched, e.g. `/users/{id}`.
    /// Empty when nothing matched.
    Pattern,
}

impl RouteLabel {
    pub fn from_config(use_route_pattern: bool) -> Self {
        if use_route_pattern { Self::Pattern } else { Self::Path }
    }
}

/// A [`Reporter`] over one request and its [`ResponseStats`].
///
/// Nothing is cached: each accessor reads the request or the stats at call
/// time, so the engine sees the status and size as of the moment it asks.
pub struct RequestReporter<'a> {
    req: &'a Request,
    stats: &'a ResponseStats,
    label: RouteLabel,
}

impl<'a> RequestReporter<'a> {
    pub fn new(req: &'a Request, stats: &'a ResponseStats, label: RouteLabel) -> Self {
        Self { req, stats, label }
    }

    pub fn label(&self) -> RouteLabel { self.label }
}

impl Reporter for RequestReporter<'_> {
    fn method(&self) -> &str { self.req.method().as_str() }
    fn context(&self) -> &Context { self.req.context() }

    fn url_path(&self) -> &str {
        match self.label {
            RouteLabel::Path    => self.req.path(),
            RouteLabel::Pattern => self.req.context().route().pattern(),
        }
    }

    fn status_code(&self) -> u16 { self.stats.status_code() }
    fn bytes_written(&self) -> u64 { self.stats.bytes_written() }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::middleware::observer::ResponseObserver;
    use crate::response::ResponseWriter;
    use crate::testing::ResponseRecorder;

    fn request(path: &str) -> Request {
        http::Request::builder()
            .method("PATCH")
            .uri(path)
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    #[test]
    fn path_label_is_the_raw_path() {
        let req = request("/users/42");
        let stats = ResponseStats::new();
        req.context().route().set("/users/{id}", Vec::new());

        let reporter = RequestReporter::new(&req, &stats, RouteLabel::Path);

        assert_eq!(reporter.url_path(), "/users/42");
        assert_eq!(reporter.method(), "PATCH");
    }

    #[test]
    fn pattern_label_is_the_template() {
        let req = request("/users/42");
        let stats = ResponseStats::new();
        let reporter = RequestReporter::new(&req, &stats, RouteLabel::Pattern);

        req.context().route().set("/users/{id}", vec![("id".into(), "42".into())]);

        assert_eq!(reporter.url_path(), "/users/{id}");
    }

    #[test]
    fn pattern_label_without_route_is_empty() {
        let req = request("/users/42");
        let stats = ResponseStats::new();
        let reporter = RequestReporter::new(&req, &stats, RouteLabel::Pattern);

        assert_eq!(reporter.url_path(), "");
    }

    #[test]
    fn reads_stats_as_they_change() {
        let req = request("/");
        let stats = ResponseStats::new();
        let reporter = RequestReporter::new(&req, &stats, RouteLabel::Path);
        let mut rec = ResponseRecorder::new();
        let mut obs = ResponseObserver::new(&mut rec, &stats);

        assert_eq!((reporter.status_code(), reporter.bytes_written()), (200, 0));

        obs.write_header(418);
        obs.write(b"short and stout").unwrap();

        assert_eq!((reporter.status_code(), reporter.bytes_written()), (418, 15));
    }

    #[test]
    fn label_follows_config_flag() {
        assert_eq!(RouteLabel::from_config(true), RouteLabel::Pattern);
        assert_eq!(RouteLabel::from_config(false), RouteLabel::Path);
    }
}
