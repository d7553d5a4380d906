//! hazardwatch - weather hazard alerts by email
//!
//! Polls city forecasts on a fixed interval and emails subscribers when a
//! forecast slot crosses a hazard threshold.

use anyhow::Result;
use clap::Parser;
use hazardwatch::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    // RUST_LOG takes precedence over the configured level.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        init_tracing("info");
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    init_tracing(&config.log_level);

    if let Err(err) = config.validate() {
        error!("Invalid configuration: {}", err);
        std::process::exit(1);
    }

    info!("hazardwatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Listen Address: {}", config.server.listen_addr);
    info!("Forecast API: {}", config.forecast.base_url);
    info!("Poll Interval: {}s", config.scheduler.poll_interval_secs);
    info!("Concurrency: {}", config.scheduler.concurrency);
    info!("Run Immediately: {}", config.scheduler.run_immediately);
    info!("Notification Backend: {}", config.notification.backend);
    info!("Sender: {} <{}>", config.notification.sender_name, config.notification.sender_email);
    info!(
        "Metrics: {}",
        if config.metrics.enabled { "Enabled" } else { "Disabled" }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;
    info!("Serving on http://{}", app.api_addr());

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutdown signal received. Shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;
    info!("Exiting.");
    Ok(())
}
