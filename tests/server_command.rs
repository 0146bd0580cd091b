//! End-to-end tests for the server command.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use server_harness::config::ConnectorSpec;
use server_harness::health::{HealthCheck, HealthResult};
use server_harness::http::RouteError;
use server_harness::lifecycle::ServerCommand;
use server_harness::net::{ConnectorError, TlsError};
use server_harness::server::ServerError;
use server_harness::{Bootstrap, Component, Configuration, Environment, Error, Route, Shutdown};

mod common;

use common::{entries, Echo, Journal, Recorder, RecordingFactory};

struct TestApp {
    journal: Journal,
    register: fn(&mut Environment, &Journal) -> server_harness::Result<()>,
}

impl server_harness::Application for TestApp {
    fn name(&self) -> &str {
        "test-app"
    }

    fn run(&self, _: &Configuration, environment: &mut Environment) -> server_harness::Result<()> {
        (self.register)(environment, &self.journal)
    }
}

struct AlwaysUp;

impl HealthCheck for AlwaysUp {
    fn name(&self) -> &str {
        "always-up"
    }

    fn check(&self) -> HealthResult {
        HealthResult::healthy()
    }
}

impl Component for AlwaysUp {
    fn as_health_check(self: std::sync::Arc<Self>) -> Option<std::sync::Arc<dyn HealthCheck>> {
        Some(self)
    }
}

fn full_app(environment: &mut Environment, journal: &Journal) -> server_harness::Result<()> {
    let server = environment.server();
    server.register(Route::get("/hello", |_req: Request<Body>| async { "hello\n" }));
    server.register(AlwaysUp);
    server.register(Echo);
    server.register(Recorder::new("pool", journal));
    Ok(())
}

fn managed_only(environment: &mut Environment, journal: &Journal) -> server_harness::Result<()> {
    environment.server().register(Recorder::new("pool", journal));
    Ok(())
}

fn bootstrap(
    register: fn(&mut Environment, &Journal) -> server_harness::Result<()>,
    journal: &Journal,
    config: Configuration,
    factory: &RecordingFactory,
) -> Bootstrap {
    let mut bootstrap = Bootstrap::new(TestApp {
        journal: journal.clone(),
        register,
    });
    bootstrap.set_configuration_factory(config);
    bootstrap.set_server_factory(factory.clone());
    bootstrap
}

#[tokio::test]
async fn serves_both_surfaces_until_shutdown() {
    let journal = Journal::default();
    let factory = RecordingFactory::default();
    let mut config = common::local_config(1, 1);
    config.server.application_context_path = "/api".into();
    config.server.admin_context_path = "/admin".into();
    let bootstrap = bootstrap(full_app, &journal, config, &factory);
    let shutdown = Shutdown::new();

    let server = ServerCommand::run_until(&bootstrap, shutdown.wait());
    let client = async {
        let addrs = factory.bound(2).await;
        let (app, admin) = (addrs[0], addrs[1]);
        let client = common::client();

        let res = client.get(format!("http://{}/api/hello", app)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "hello\n");

        let res = client.post(format!("http://{}/api/hello", app)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()["allow"], "GET");

        let res = client.get(format!("http://{}/hello", app)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        // Admin routes are not served on the application surface.
        let res = client.get(format!("http://{}/admin/ping", app)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = client.get(format!("http://{}/admin/ping", admin)).send().await.unwrap();
        assert_eq!(res.text().await.unwrap(), "pong\n");

        let res = client.get(format!("http://{}/admin/healthcheck", admin)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let health: serde_json::Value = res.json().await.unwrap();
        assert_eq!(health["always-up"]["healthy"], true);

        let res = client
            .post(format!("http://{}/admin/tasks/echo?msg=a&msg=b", admin))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "a,b");

        let res = client
            .post(format!("http://{}/admin/tasks/missing", admin))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        assert_eq!(entries(&journal), vec!["start pool"]);
        shutdown.trigger();
    };

    let (result, ()) = tokio::join!(server, client);
    result.unwrap();
    assert_eq!(entries(&journal), vec!["start pool", "stop pool"]);

    for connector in factory.connectors() {
        tokio::time::timeout(Duration::from_secs(5), async {
            while connector.local_addr().is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connector should be closed after the command returns");
    }
}

#[tokio::test]
async fn no_connectors_returns_without_waiting() {
    let journal = Journal::default();
    let factory = RecordingFactory::default();
    let bootstrap = bootstrap(managed_only, &journal, common::local_config(0, 0), &factory);

    tokio::time::timeout(
        Duration::from_secs(2),
        ServerCommand::run_until(&bootstrap, std::future::pending()),
    )
    .await
    .expect("command should return at once")
    .unwrap();

    assert_eq!(entries(&journal), vec!["start pool", "stop pool"]);
}

#[tokio::test]
async fn bind_failure_is_returned_and_everything_is_stopped() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = common::local_config(1, 1);
    config.server.admin_connectors = vec![ConnectorSpec::http(taken.local_addr().unwrap().to_string())];

    let journal = Journal::default();
    let factory = RecordingFactory::default();
    let bootstrap = bootstrap(managed_only, &journal, config, &factory);

    let err = ServerCommand::run_until(&bootstrap, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Server(ServerError::Connector(ConnectorError::Bind { .. }))
    ));
    assert_eq!(entries(&journal), vec!["start pool", "stop pool"]);
}

#[tokio::test]
async fn tls_failure_still_stops_managed_objects() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::local_config(0, 1);
    config.server.application_connectors = vec![ConnectorSpec::https(
        "127.0.0.1:0",
        dir.path().join("missing-cert.pem"),
        dir.path().join("missing-key.pem"),
    )];

    let journal = Journal::default();
    let factory = RecordingFactory::default();
    let bootstrap = bootstrap(managed_only, &journal, config, &factory);

    let err = ServerCommand::run_until(&bootstrap, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Server(ServerError::Connector(ConnectorError::Tls(TlsError::Io { .. })))
    ));
    assert_eq!(entries(&journal), vec!["start pool", "stop pool"]);
}

#[tokio::test]
async fn duplicate_route_aborts_before_anything_starts() {
    fn duplicated(environment: &mut Environment, journal: &Journal) -> server_harness::Result<()> {
        let server = environment.server();
        server.register(Recorder::new("pool", journal));
        server.register(Route::get("/x", |_req: Request<Body>| async { "first" }));
        server.register(Route::get("/x", |_req: Request<Body>| async { "second" }));
        Ok(())
    }

    let journal = Journal::default();
    let factory = RecordingFactory::default();
    let bootstrap = bootstrap(duplicated, &journal, common::local_config(1, 0), &factory);

    let err = ServerCommand::run_until(&bootstrap, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Route(RouteError::Duplicate { .. })));
    assert!(entries(&journal).is_empty());
    assert!(factory.connectors().iter().all(|c| c.local_addr().is_none()));
}

#[tokio::test]
async fn managed_start_failure_stops_what_started() {
    fn failing(environment: &mut Environment, journal: &Journal) -> server_harness::Result<()> {
        let server = environment.server();
        server.register(Recorder::new("first", journal));
        server.register(Recorder {
            fail_start: true,
            ..Recorder::new("second", journal)
        });
        Ok(())
    }

    let journal = Journal::default();
    let factory = RecordingFactory::default();
    let bootstrap = bootstrap(failing, &journal, common::local_config(1, 0), &factory);

    let err = ServerCommand::run_until(&bootstrap, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Managed { .. }));
    assert!(err.to_string().contains("second cannot start"));
    assert_eq!(entries(&journal), vec!["start first", "stop first"]);
}

#[tokio::test]
async fn application_error_is_propagated() {
    fn broken(_: &mut Environment, _: &Journal) -> server_harness::Result<()> {
        Err(Error::application("database url missing"))
    }

    let factory = RecordingFactory::default();
    let bootstrap = bootstrap(broken, &Journal::default(), common::local_config(1, 1), &factory);

    let err = ServerCommand::run_until(&bootstrap, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Application(_)));
    assert_eq!(err.to_string(), "application error: database url missing");
}

#[tokio::test]
async fn invalid_configuration_is_rejected() {
    let mut config = common::local_config(1, 1);
    config.server.admin_context_path = "admin".into();

    let factory = RecordingFactory::default();
    let bootstrap = bootstrap(managed_only, &Journal::default(), config, &factory);

    let err = ServerCommand::run_until(&bootstrap, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(factory.connectors().is_empty());
}
