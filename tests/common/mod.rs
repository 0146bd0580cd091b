//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use server_harness::admin::tasks::{Task, TaskParams};
use server_harness::config::{ConnectorSpec, ServerConfig};
use server_harness::lifecycle::Managed;
use server_harness::net::Connector;
use server_harness::server::{DefaultServerFactory, ManagedServer, ServerError, ServerFactory};
use server_harness::{BoxError, Component, Configuration, Environment};

/// Ordered record of lifecycle events.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Configuration with `app` application and `admin` admin connectors on
/// ephemeral local ports.
pub fn local_config(app: usize, admin: usize) -> Configuration {
    let mut config = Configuration::default();
    config.server.application_connectors = (0..app).map(|_| ConnectorSpec::http("127.0.0.1:0")).collect();
    config.server.admin_connectors = (0..admin).map(|_| ConnectorSpec::http("127.0.0.1:0")).collect();
    config
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Server factory that keeps a handle on every connector it builds.
#[derive(Clone, Default)]
pub struct RecordingFactory {
    connectors: Arc<Mutex<Vec<Arc<Connector>>>>,
}

impl RecordingFactory {
    /// Wait for `count` connectors to exist and be bound; addresses are
    /// returned application connectors first.
    pub async fn bound(&self, count: usize) -> Vec<SocketAddr> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let connectors = self.connectors.lock().unwrap().clone();
                if connectors.len() >= count {
                    let mut addrs = Vec::with_capacity(count);
                    for connector in connectors.iter().take(count) {
                        addrs.push(connector.wait_until_bound().await.unwrap());
                    }
                    return addrs;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connectors were not bound in time")
    }

    pub fn connectors(&self) -> Vec<Arc<Connector>> {
        self.connectors.lock().unwrap().clone()
    }
}

impl ServerFactory for RecordingFactory {
    fn build_server(
        &self,
        config: &ServerConfig,
        environment: &mut Environment,
    ) -> Result<ManagedServer, ServerError> {
        let server = DefaultServerFactory.build_server(config, environment)?;
        self.connectors
            .lock()
            .unwrap()
            .extend(server.connectors().iter().cloned());
        Ok(server)
    }
}

/// Managed object that journals its start and stop.
pub struct Recorder {
    pub name: &'static str,
    pub journal: Journal,
    pub fail_start: bool,
}

impl Recorder {
    pub fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            fail_start: false,
        }
    }
}

impl Managed for Recorder {
    fn start(&self) -> Result<(), BoxError> {
        if self.fail_start {
            return Err(format!("{} cannot start", self.name).into());
        }
        self.journal.lock().unwrap().push(format!("start {}", self.name));
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        self.journal.lock().unwrap().push(format!("stop {}", self.name));
        Ok(())
    }
}

impl Component for Recorder {
    fn as_managed(self: Arc<Self>) -> Option<Arc<dyn Managed>> {
        Some(self)
    }
}

/// Task echoing its `msg` parameters.
pub struct Echo;

impl Task for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn execute(&self, params: &TaskParams) -> Result<String, BoxError> {
        match params.get("msg") {
            Some(msg) => Ok(msg.join(",")),
            None => Err("msg is required".into()),
        }
    }
}

impl Component for Echo {
    fn as_task(self: Arc<Self>) -> Option<Arc<dyn Task>> {
        Some(self)
    }
}
