//! The main application logic, decoupled from the entry point.

use crate::{
    api::ApiServer,
    composer::AlertComposer,
    config::Config,
    core::{ForecastProvider, Notifier},
    forecast::OpenWeatherClient,
    internal_metrics,
    notification::build_notifier,
    registry::SubscriberRegistry,
    scheduler::Scheduler,
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, instrument};

/// Extra time granted to the API server and bookkeeping on top of the
/// scheduler's grace period.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    api_addr: SocketAddr,
    registry: SubscriberRegistry,
    shutdown_deadline: Duration,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the API server is bound to.
    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        if !*shutdown_rx.borrow() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown(self.shutdown_deadline).await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Components can be overridden before `build`, which is how the tests swap
/// the forecast provider and the notifier for fakes.
pub struct AppBuilder {
    config: Config,
    forecast_provider_override: Option<Arc<dyn ForecastProvider>>,
    notifier_override: Option<Arc<dyn Notifier>>,
    registry_override: Option<SubscriberRegistry>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            forecast_provider_override: None,
            notifier_override: None,
            registry_override: None,
        }
    }

    /// Overrides the forecast provider for testing.
    pub fn forecast_provider_override(mut self, provider: Arc<dyn ForecastProvider>) -> Self {
        self.forecast_provider_override = Some(provider);
        self
    }

    /// Overrides the notification backend for testing.
    pub fn notifier_override(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier_override = Some(notifier);
        self
    }

    /// Starts from an existing registry instead of an empty one.
    pub fn registry_override(mut self, registry: SubscriberRegistry) -> Self {
        self.registry_override = Some(registry);
        self
    }

    /// Builds all components and spawns the scheduler and the API server.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Metrics
        // =========================================================================
        let prom_handle = if config.metrics.enabled {
            match internal_metrics::install_recorder() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!("Metrics disabled: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        // =========================================================================
        // 2. Outbound clients
        // =========================================================================
        let provider = match self.forecast_provider_override {
            Some(provider) => provider,
            None => Arc::new(OpenWeatherClient::new(&config.forecast)?) as Arc<dyn ForecastProvider>,
        };
        let notifier = match self.notifier_override {
            Some(notifier) => notifier,
            None => build_notifier(&config.notification)?,
        };
        let registry = self.registry_override.unwrap_or_default();

        // Bind before any task is spawned.
        let listener = TcpListener::bind(&config.server.listen_addr)
            .await
            .with_context(|| format!("failed to bind API server to {}", config.server.listen_addr))?;
        let api_addr = listener
            .local_addr()
            .context("failed to read API server address")?;

        // =========================================================================
        // 3. Scheduler
        // =========================================================================
        let scheduler = Scheduler::new(
            registry.clone(),
            provider,
            notifier,
            AlertComposer::from_config(&config.alert),
            config.scheduler.clone(),
        );
        task_manager.spawn("Scheduler", scheduler.run(task_manager.get_shutdown_rx()));

        // =========================================================================
        // 4. API server
        // =========================================================================
        let server = ApiServer::new(
            listener,
            registry.clone(),
            prom_handle,
            task_manager.get_shutdown_rx(),
        );
        task_manager.spawn("ApiServer", server.run());
        info!(%api_addr, "API server listening");

        Ok(App {
            task_manager,
            api_addr,
            registry,
            shutdown_deadline: config.scheduler.shutdown_grace() + SHUTDOWN_SLACK,
        })
    }
}
