use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::admin::tasks::{parse_params, TaskParams, TaskRegistry};
use crate::health::HealthCheckRegistry;
use crate::http::Handler;

/// Largest form body accepted by the task endpoint.
const MAX_FORM_BYTES: usize = 64 * 1024;

pub async fn ping(_request: Request<Body>) -> &'static str {
    "pong\n"
}

pub fn healthcheck(registry: HealthCheckRegistry) -> impl Handler {
    move |_request: Request<Body>| {
        let registry = registry.clone();
        async move {
            match tokio::task::spawn_blocking(move || registry.run_all()).await {
                Ok(results) => {
                    let status = if results.values().all(|r| r.healthy) {
                        StatusCode::OK
                    } else {
                        StatusCode::INTERNAL_SERVER_ERROR
                    };
                    (status, Json(results)).into_response()
                }
                Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response(),
            }
        }
    }
}

/// Runs the task named by the path segment after `prefix`.
pub fn run_task(registry: TaskRegistry, prefix: String) -> impl Handler {
    move |request: Request<Body>| {
        let registry = registry.clone();
        let prefix = prefix.clone();
        async move { execute_task(&registry, &prefix, request).await }
    }
}

async fn execute_task(registry: &TaskRegistry, prefix: &str, request: Request<Body>) -> Response {
    let name = request
        .uri()
        .path()
        .strip_prefix(prefix)
        .unwrap_or_default()
        .to_string();
    let Some(task) = registry.get(&name) else {
        return (StatusCode::NOT_FOUND, format!("no such task: {:?}\n", name)).into_response();
    };

    let mut params = TaskParams::new();
    if let Some(query) = request.uri().query() {
        parse_params(&mut params, query.as_bytes());
    }
    if is_form(&request) {
        match axum::body::to_bytes(request.into_body(), MAX_FORM_BYTES).await {
            Ok(body) => parse_params(&mut params, &body),
            Err(e) => return (StatusCode::BAD_REQUEST, format!("{}\n", e)).into_response(),
        }
    }

    tracing::info!(task = %name, "Running task");
    match tokio::task::spawn_blocking(move || task.execute(&params)).await {
        Ok(Ok(output)) => (StatusCode::OK, output).into_response(),
        Ok(Err(e)) => {
            tracing::error!(task = %name, error = %e, "Task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response(),
    }
}

fn is_form(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}
