//! Demo application.
//!
//! ```text
//! server-harness server config.toml
//!
//! GET  {app}/hello?name=...      → greeting
//! GET  {admin}/ping              → pong
//! GET  {admin}/healthcheck       → greeting counter check
//! POST {admin}/tasks/reset       → reset the counter
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use serde::Deserialize;

use server_harness::admin::tasks::{Task, TaskParams};
use server_harness::health::{HealthCheck, HealthResult};
use server_harness::{Application, BoxError, Component, Configuration, Environment, Route};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HelloSettings {
    greeting: String,
    max_greetings: u64,
}

impl Default for HelloSettings {
    fn default() -> Self {
        Self {
            greeting: "Hello".to_string(),
            max_greetings: 1_000_000,
        }
    }
}

/// Counts greetings served.
struct Counter {
    served: AtomicU64,
    max: u64,
}

impl HealthCheck for Counter {
    fn name(&self) -> &str {
        "greetings"
    }

    fn check(&self) -> HealthResult {
        let served = self.served.load(Ordering::Relaxed);
        if served < self.max {
            HealthResult::healthy_with(format!("{} served", served))
        } else {
            HealthResult::unhealthy(format!("{} served, limit is {}", served, self.max))
        }
    }
}

impl Component for Counter {
    fn as_health_check(self: Arc<Self>) -> Option<Arc<dyn HealthCheck>> {
        Some(self)
    }
}

struct ResetCounter(Arc<Counter>);

impl Task for ResetCounter {
    fn name(&self) -> &str {
        "reset"
    }

    fn execute(&self, _params: &TaskParams) -> Result<String, BoxError> {
        let previous = self.0.served.swap(0, Ordering::Relaxed);
        Ok(format!("reset after {} greetings\n", previous))
    }
}

impl Component for ResetCounter {
    fn as_task(self: Arc<Self>) -> Option<Arc<dyn Task>> {
        Some(self)
    }
}

struct HelloApplication;

impl Application for HelloApplication {
    fn name(&self) -> &str {
        "hello"
    }

    fn run(&self, configuration: &Configuration, environment: &mut Environment) -> server_harness::Result<()> {
        let settings: HelloSettings = configuration.application_section()?;

        let counter = Arc::new(Counter {
            served: AtomicU64::new(0),
            max: settings.max_greetings,
        });
        let greeting = Arc::new(settings.greeting);

        let hits = Arc::clone(&counter);
        environment.server().register(Route::get("/hello", move |request: Request<Body>| {
            let greeting = Arc::clone(&greeting);
            hits.served.fetch_add(1, Ordering::Relaxed);
            async move {
                let name = request
                    .uri()
                    .query()
                    .and_then(|q| {
                        url::form_urlencoded::parse(q.as_bytes())
                            .find(|(k, _)| k == "name")
                            .map(|(_, v)| v.into_owned())
                    })
                    .unwrap_or_else(|| "stranger".to_string());
                format!("{}, {}!\n", greeting, name)
            }
        }));
        environment.server().register_shared(counter.clone());
        environment.server().register(ResetCounter(counter));
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = server_harness::cli::run(HelloApplication).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
