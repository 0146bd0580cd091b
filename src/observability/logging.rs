//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber from configuration
//! - Provide an injectable [`Logger`] so components do not reach for
//!   process-wide state by name
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the configured level when present

use std::future::Future;

use tracing::instrument::{Instrument, WithSubscriber};
use tracing::{Dispatch, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Error returned when the global subscriber cannot be installed.
#[derive(Debug, thiserror::Error)]
#[error("failed to initialize logging: {0}")]
pub struct LoggingError(String);

/// Install the process-wide subscriber described by `config`.
///
/// Only the first call succeeds; later calls return an error.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LoggingError(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    result.map_err(|e| LoggingError(e.to_string()))
}

/// A named logging handle passed to components at construction.
///
/// Events emitted through a `Logger` go to the dispatcher captured when the
/// logger was created and carry a `logger` span field with its name.
#[derive(Clone, Debug)]
pub struct Logger {
    name: &'static str,
    dispatch: Dispatch,
    span: Span,
}

impl Logger {
    /// Create a logger bound to the current default dispatcher.
    pub fn new(name: &'static str) -> Self {
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        Self::with_dispatch(name, dispatch)
    }

    /// Create a logger that writes to an explicit dispatcher.
    pub fn with_dispatch(name: &'static str, dispatch: Dispatch) -> Self {
        let span = tracing::dispatcher::with_default(&dispatch, || {
            tracing::info_span!("logger", logger = name)
        });
        Self { name, dispatch, span }
    }

    /// Derive a logger with another name sharing the same dispatcher.
    pub fn named(&self, name: &'static str) -> Self {
        Self::with_dispatch(name, self.dispatch.clone())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run `f` with this logger's dispatcher and span active.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, || self.span.in_scope(f))
    }

    /// Attach this logger's dispatcher and span to a future.
    pub fn in_future<F: Future>(&self, fut: F) -> impl Future<Output = F::Output> {
        fut.instrument(self.span.clone())
            .with_subscriber(self.dispatch.clone())
    }
}

#[cfg(test)]
pub(crate) mod capture {
    //! In-memory log capture for tests.

    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::Dispatch;

    use super::Logger;

    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub(crate) fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// A logger writing plain-text events into the returned buffer.
    pub(crate) fn logger(name: &'static str) -> (Logger, CapturedLogs) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (Logger::with_dispatch(name, Dispatch::new(subscriber)), logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_go_to_injected_dispatcher() {
        let (logger, logs) = capture::logger("test");
        logger.in_scope(|| tracing::warn!(component = "x", "something odd"));

        let out = logs.contents();
        assert!(out.contains("something odd"));
        assert!(out.contains("WARN"));
        assert!(out.contains("logger=\"test\""));
    }

    #[tokio::test]
    async fn instrumented_future_logs_to_injected_dispatcher() {
        let (logger, logs) = capture::logger("async");
        logger
            .in_future(async {
                tokio::task::yield_now().await;
                tracing::info!("after yield");
            })
            .await;

        assert!(logs.contents().contains("after yield"));
    }

    #[test]
    fn named_shares_dispatcher() {
        let (logger, logs) = capture::logger("parent");
        let child = logger.named("child");
        assert_eq!(child.name(), "child");
        child.in_scope(|| tracing::info!("from child"));
        assert!(logs.contents().contains("from child"));
    }
}
