//! Method-aware request router.
//!
//! # Responsibilities
//! - Map URL patterns to a per-pattern verb table
//! - Prepend the surface's context path to every registered pattern
//! - Answer 404 for unknown paths and 405 for known paths with unknown verbs
//!
//! # Design Decisions
//! - Patterns ending in `/` match their whole subtree; the longest match wins.
//!   Other patterns match exactly.
//! - Registering the same (pattern, verb) twice is an error, never an overwrite
//! - A path without its trailing slash is redirected (301) to the subtree
//!   registered under `path + "/"`
//! - The table is swapped copy-on-write through `ArcSwap`, so request-path
//!   reads take no lock. Registrations are read-copy-update, so concurrent
//!   `handle` calls on clones never lose a route.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use tower::Service;

use crate::http::handler::BoxHandler;

/// Route registration failures. These are programming mistakes and must not
/// be ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("multiple registrations for {method} {pattern}")]
    Duplicate { method: Method, pattern: String },

    #[error("invalid route pattern {0:?}")]
    InvalidPattern(String),
}

/// Handlers registered under one pattern, keyed by verb.
#[derive(Clone, Default)]
struct VerbNode {
    handlers: HashMap<Method, BoxHandler>,
}

impl VerbNode {
    fn allow_header(&self) -> String {
        let mut verbs: Vec<&str> = self.handlers.keys().map(Method::as_str).collect();
        verbs.sort_unstable();
        verbs.join(", ")
    }
}

#[derive(Clone, Default)]
struct RouteTable {
    routes: BTreeMap<String, VerbNode>,
    /// Subtree patterns, longest first.
    subtrees: Vec<String>,
}

impl RouteTable {
    fn insert(&mut self, pattern: String, method: Method, handler: BoxHandler) {
        if !self.routes.contains_key(&pattern) && pattern.ends_with('/') {
            self.subtrees.push(pattern.clone());
            self.subtrees.sort_by(|a, b| b.len().cmp(&a.len()));
        }
        self.routes
            .entry(pattern)
            .or_default()
            .handlers
            .insert(method, handler);
    }

    fn contains(&self, pattern: &str, method: &Method) -> bool {
        self.routes
            .get(pattern)
            .is_some_and(|node| node.handlers.contains_key(method))
    }

    fn lookup(&self, path: &str) -> Lookup<'_> {
        if let Some(node) = self.routes.get(path) {
            return Lookup::Found(node);
        }
        if !path.ends_with('/') {
            let with_slash = format!("{path}/");
            if self.routes.contains_key(&with_slash) {
                return Lookup::Redirect(with_slash);
            }
        }
        self.subtrees
            .iter()
            .find(|pattern| path.starts_with(pattern.as_str()))
            .and_then(|pattern| self.routes.get(pattern))
            .map_or(Lookup::NotFound, Lookup::Found)
    }
}

enum Lookup<'a> {
    Found(&'a VerbNode),
    Redirect(String),
    NotFound,
}

/// Multiplexes requests by path, then by HTTP verb.
///
/// Clones share the same route table.
#[derive(Clone)]
pub struct MethodRouter {
    prefix: Arc<str>,
    table: Arc<ArcSwap<RouteTable>>,
}

impl MethodRouter {
    /// Create a router whose patterns are all relative to `prefix`.
    /// A trailing slash on the prefix is dropped.
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
        Self {
            prefix: Arc::from(prefix),
            table: Arc::new(ArcSwap::from_pointee(RouteTable::default())),
        }
    }

    /// Context path with any trailing slash stripped.
    pub fn path_prefix(&self) -> &str {
        &self.prefix
    }

    /// Register `handler` for `method` on `prefix + pattern`.
    pub fn handle(&self, method: Method, pattern: &str, handler: BoxHandler) -> Result<(), RouteError> {
        if pattern.is_empty() {
            return Err(RouteError::InvalidPattern(pattern.to_string()));
        }
        let full = format!("{}{}", self.prefix, pattern);

        let mut duplicate = false;
        self.table.rcu(|current| {
            duplicate = current.contains(&full, &method);
            if duplicate {
                return Arc::clone(current);
            }
            let mut next = RouteTable::clone(current);
            next.insert(full.clone(), method.clone(), handler.clone());
            Arc::new(next)
        });

        if duplicate {
            return Err(RouteError::Duplicate { method, pattern: full });
        }
        Ok(())
    }

    /// Every registered (verb, full pattern) pair, sorted by pattern.
    pub fn routes(&self) -> Vec<(Method, String)> {
        let table = self.table.load();
        let mut routes = Vec::new();
        for (pattern, node) in &table.routes {
            let mut verbs: Vec<&Method> = node.handlers.keys().collect();
            verbs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            routes.extend(verbs.into_iter().map(|m| (m.clone(), pattern.clone())));
        }
        routes
    }

    /// Dispatch a request to the handler registered for its path and verb.
    pub async fn serve(&self, request: Request<Body>) -> Response {
        let table = self.table.load_full();
        let node = match table.lookup(request.uri().path()) {
            Lookup::Found(node) => node,
            Lookup::Redirect(location) => return moved_permanently(location, request.uri().query()),
            Lookup::NotFound => return not_found(),
        };

        match node.handlers.get(request.method()) {
            Some(handler) => handler.call(request).await,
            None => method_not_allowed(node),
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
}

fn moved_permanently(mut location: String, query: Option<&str>) -> Response {
    if let Some(query) = query {
        location.push('?');
        location.push_str(query);
    }
    match HeaderValue::from_str(&location) {
        Ok(location) => (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, location)],
            "301 moved permanently\n",
        )
            .into_response(),
        Err(_) => not_found(),
    }
}

fn method_not_allowed(node: &VerbNode) -> Response {
    let mut response =
        (StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed\n").into_response();
    if let Ok(allow) = HeaderValue::from_str(&node.allow_header()) {
        response.headers_mut().insert(header::ALLOW, allow);
    }
    response
}

impl std::fmt::Debug for MethodRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRouter")
            .field("prefix", &self.prefix)
            .field("routes", &self.routes())
            .finish()
    }
}

impl Service<Request<Body>> for MethodRouter {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.serve(request).await) })
    }
}
