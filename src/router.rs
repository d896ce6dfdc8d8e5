//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. You register a path, you
//! get a handler, and the request learns which route template it matched.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::ALLOW;
use http::{HeaderValue, Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::request::Request;
use crate::response::ResponseWriter;

/// A registered route: its template and the handler behind it.
struct Route {
    pattern: Arc<str>,
    handler: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup. The router is itself a [`Handler`], so it can be
/// served directly or wrapped by middleware first. Each registration returns
/// `self` so calls chain naturally.
///
/// On a match the route template (`/users/{id}`) and parameters are recorded
/// in the request's [`RouteContext`](crate::RouteContext). Middleware wrapping
/// the router reads them once the router returns.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust
    /// # use astor_metrics::{handler_fn, Router};
    /// # use http::Method;
    /// # let noop = || handler_fn(|_, _| Box::pin(async {}));
    /// Router::new()
    ///     .on(Method::DELETE, "/users/{id}", noop())
    ///     .on(Method::GET,    "/users/{id}", noop())
    ///     .on(Method::POST,   "/users",      noop());
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`. Routes are fixed at startup, so this is a
    /// programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let route = Route { pattern: Arc::from(path), handler: Arc::new(handler) };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Finds the route for `method` + `path`, returning its template, its
    /// handler and the extracted parameters.
    fn lookup(&self, method: &Method, path: &str) -> Option<(&Route, Vec<(String, String)>)> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }

    /// Methods that have a route for `path`, sorted for a stable `Allow` header.
    fn allowed(&self, path: &str) -> Vec<&str> {
        let mut methods: Vec<&str> = self.routes.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(method, _)| method.as_str())
            .collect();
        methods.sort_unstable();
        methods
    }
}

impl Handler for Router {
    fn serve<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: &'a Request) -> BoxFuture<'a> {
        if let Some((route, params)) = self.lookup(req.method(), req.path()) {
            req.context().route().set(&route.pattern, params);
            return route.handler.serve(w, req);
        }

        Box::pin(async move {
            let allowed = self.allowed(req.path());
            if allowed.is_empty() {
                debug!(method = %req.method(), path = req.path(), "no route");
                w.write_header(StatusCode::NOT_FOUND.as_u16());
                let _ = w.write(b"Not Found");
                return;
            }

            debug!(method = %req.method(), path = req.path(), "method not allowed");
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                w.headers_mut().insert(ALLOW, value);
            }
            w.write_header(StatusCode::METHOD_NOT_ALLOWED.as_u16());
            let _ = w.write(b"Method Not Allowed");
        })
    }
}
