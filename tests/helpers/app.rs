//! Test helpers for running the full application instance.

use anyhow::Result;
use hazardwatch::{
    app::AppBuilder,
    config::Config,
    forecast::test_utils::FakeForecastProvider,
    notification::test_utils::RecordingNotifier,
    registry::SubscriberRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// A running instance of the application.
pub struct TestApp {
    pub shutdown_tx: watch::Sender<bool>,
    pub app_handle: JoinHandle<Result<()>>,
    pub api_addr: SocketAddr,
    pub registry: SubscriberRegistry,
    pub provider: FakeForecastProvider,
    pub notifier: RecordingNotifier,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.api_addr, path)
    }

    /// Shuts down the application and waits for it to terminate.
    /// Fails if the application does not shut down within the specified timeout.
    pub async fn shutdown(self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx.send(true)?;

        match timeout(timeout_duration, self.app_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
        }
    }
}

/// Builds a `TestApp` wired to fakes, listening on a random local port.
pub struct TestAppBuilder {
    pub config: Config,
    provider: FakeForecastProvider,
    notifier: RecordingNotifier,
    registry: SubscriberRegistry,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.server.listen_addr = "127.0.0.1:0".to_string();
        config.forecast.api_key = "test-key".to_string();
        config.notification.sender_email = "alerts@example.com".to_string();
        config.notification.smtp.password = "secret".to_string();

        Self {
            config,
            provider: FakeForecastProvider::new(),
            notifier: RecordingNotifier::new(),
            registry: SubscriberRegistry::new(),
        }
    }

    pub fn with_config_modifier(mut self, modifier: impl FnOnce(&mut Config)) -> Self {
        modifier(&mut self.config);
        self
    }

    pub fn with_provider(mut self, provider: FakeForecastProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_registry(mut self, registry: SubscriberRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub async fn start(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app = AppBuilder::new(self.config)
            .forecast_provider_override(Arc::new(self.provider.clone()))
            .notifier_override(Arc::new(self.notifier.clone()))
            .registry_override(self.registry.clone())
            .build(shutdown_rx)
            .await?;

        let api_addr = app.api_addr();
        let registry = app.registry().clone();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            shutdown_tx,
            app_handle,
            api_addr,
            registry,
            provider: self.provider,
            notifier: self.notifier,
        })
    }
}
