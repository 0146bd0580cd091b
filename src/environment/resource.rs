//! HTTP resources and the handler that routes them.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};

use crate::environment::component::{Component, EndpointLog};
use crate::environment::dispatcher::ResourceHandler;
use crate::http::{boxed, BoxHandler, Handler, HandlerFuture, MethodRouter, RouteError};

/// A component served over HTTP at one verb and path.
pub trait Resource: Send + Sync {
    fn method(&self) -> Method;

    /// Path relative to the surface's context path.
    fn path(&self) -> &str;

    fn serve(&self, request: Request<Body>) -> HandlerFuture;
}

/// A resource built from a handler function.
pub struct Route {
    method: Method,
    path: String,
    handler: BoxHandler,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler: boxed(handler),
        }
    }

    pub fn get(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::GET, path, handler)
    }

    pub fn post(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::POST, path, handler)
    }
}

impl Resource for Route {
    fn method(&self) -> Method {
        self.method.clone()
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn serve(&self, request: Request<Body>) -> HandlerFuture {
        self.handler.call(request)
    }
}

impl Component for Route {
    fn as_resource(self: Arc<Self>) -> Option<Arc<dyn Resource>> {
        Some(self)
    }
}

/// Claims resources and registers them on a router.
pub struct HttpResourceHandler {
    router: MethodRouter,
}

impl HttpResourceHandler {
    pub fn new(router: MethodRouter) -> Self {
        Self { router }
    }
}

impl ResourceHandler for HttpResourceHandler {
    fn try_claim(
        &self,
        component: &Arc<dyn Component>,
        endpoints: &mut EndpointLog,
    ) -> Result<bool, RouteError> {
        let Some(resource) = component.clone().as_resource() else {
            return Ok(false);
        };

        let method = resource.method();
        let path = resource.path().to_string();
        let target = Arc::clone(&resource);
        self.router.handle(
            method.clone(),
            &path,
            boxed(move |request: Request<Body>| target.serve(request)),
        )?;

        endpoints.log_endpoint(
            method,
            format!("{}{}", self.router.path_prefix(), path),
            component.type_name(),
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};

    use super::*;

    struct Users;

    impl Resource for Users {
        fn method(&self) -> Method {
            Method::GET
        }

        fn path(&self) -> &str {
            "/users"
        }

        fn serve(&self, _request: Request<Body>) -> HandlerFuture {
            Box::pin(async { "alice,bob".into_response() })
        }
    }

    impl Component for Users {
        fn as_resource(self: Arc<Self>) -> Option<Arc<dyn Resource>> {
            Some(self)
        }
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn claims_resources_and_logs_full_path() {
        let router = MethodRouter::new("/api/");
        let handler = HttpResourceHandler::new(router.clone());
        let mut endpoints = EndpointLog::default();

        let users: Arc<dyn Component> = Arc::new(Users);
        assert!(handler.try_claim(&users, &mut endpoints).unwrap());

        let entry = &endpoints.entries()[0];
        assert_eq!(entry.method, Method::GET);
        assert_eq!(entry.path, "/api/users");
        assert!(entry.type_name.ends_with("Users"));

        let request = Request::get("/api/users").body(Body::empty()).unwrap();
        let response = router.serve(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, "alice,bob");
    }

    #[test]
    fn declines_non_resources() {
        struct Plain;
        impl Component for Plain {}

        let handler = HttpResourceHandler::new(MethodRouter::new("/"));
        let mut endpoints = EndpointLog::default();
        let plain: Arc<dyn Component> = Arc::new(Plain);
        assert!(!handler.try_claim(&plain, &mut endpoints).unwrap());
        assert!(endpoints.is_empty());
    }

    #[test]
    fn duplicate_resource_is_an_error() {
        let handler = HttpResourceHandler::new(MethodRouter::new("/"));
        let mut endpoints = EndpointLog::default();
        let first: Arc<dyn Component> = Arc::new(Route::get("/x", |_req: Request<Body>| async { "1" }));
        let second: Arc<dyn Component> = Arc::new(Route::get("/x", |_req: Request<Body>| async { "2" }));

        assert!(handler.try_claim(&first, &mut endpoints).unwrap());
        assert!(matches!(
            handler.try_claim(&second, &mut endpoints),
            Err(RouteError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn route_serves_its_handler() {
        let route = Route::post("/echo", |request: Request<Body>| async move {
            axum::body::to_bytes(request.into_body(), 1024)
                .await
                .map(|b| b.to_vec())
                .unwrap_or_default()
        });
        assert_eq!(route.method(), Method::POST);
        assert_eq!(route.path(), "/echo");

        let request = Request::post("/echo").body(Body::from("hi")).unwrap();
        assert_eq!(body(route.serve(request).await).await, "hi");
    }
}
