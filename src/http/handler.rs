//! Request handler abstraction.
//!
//! Any `Fn(Request<Body>) -> impl Future<Output = impl IntoResponse>` that is
//! `Send + Sync + 'static` is a [`Handler`].

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

/// Future returned by a handler.
pub type HandlerFuture = BoxFuture<'static, Response>;

/// Something that turns a request into a response.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request<Body>) -> HandlerFuture;
}

/// Shared, type-erased handler as stored in the route table.
pub type BoxHandler = Arc<dyn Handler>;

impl<F, Fut, R> Handler for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, request: Request<Body>) -> HandlerFuture {
        let fut = self(request);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Box a handler for registration.
pub fn boxed<H: Handler>(handler: H) -> BoxHandler {
    Arc::new(handler)
}
