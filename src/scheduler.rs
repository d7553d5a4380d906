//! Periodic forecast checks.
//!
//! The scheduler owns the timer loop. Each tick snapshots the registry, runs
//! the fetch → classify → compose → dispatch pipeline for every subscriber
//! with bounded concurrency and returns a [`TickReport`]. A failure in one
//! subscriber's pipeline is logged and never affects the others.

use crate::classifier::collect_warnings;
use crate::composer::AlertComposer;
use crate::config::SchedulerConfig;
use crate::core::{ForecastProvider, Notifier, Subscriber};
use crate::error::{DeliveryError, FetchError};
use crate::registry::SubscriberRegistry;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Summary of one pass over the subscriber snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Size of the snapshot the tick worked on.
    pub subscribers: usize,
    pub alerts_sent: usize,
    /// Subscribers whose forecast had no hazardous entry.
    pub no_hazards: usize,
    pub fetch_failures: usize,
    pub delivery_failures: usize,
    pub elapsed: Duration,
}

impl TickReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent => self.alerts_sent += 1,
            Outcome::NoHazards => self.no_hazards += 1,
            Outcome::FetchFailed => self.fetch_failures += 1,
            Outcome::DeliveryFailed => self.delivery_failures += 1,
        }
    }
}

/// Result of one subscriber's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    NoHazards,
    FetchFailed,
    DeliveryFailed,
}

/// Drives periodic ticks over the subscriber registry.
pub struct Scheduler {
    registry: SubscriberRegistry,
    provider: Arc<dyn ForecastProvider>,
    notifier: Arc<dyn Notifier>,
    composer: AlertComposer,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        registry: SubscriberRegistry,
        provider: Arc<dyn ForecastProvider>,
        notifier: Arc<dyn Notifier>,
        composer: AlertComposer,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            provider,
            notifier,
            composer,
            config,
        }
    }

    /// Runs one pass over the subscribers registered right now.
    pub async fn tick(&self) -> TickReport {
        let started = Instant::now();
        let snapshot = self.registry.snapshot();
        info!(subscribers = snapshot.len(), "Starting forecast check");

        let mut report = TickReport {
            subscribers: snapshot.len(),
            ..TickReport::default()
        };

        let outcomes: Vec<Outcome> = stream::iter(snapshot.iter().cloned())
            .map(|subscriber| self.process(subscriber))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        report.elapsed = started.elapsed();

        metrics::counter!("ticks_total").increment(1);
        metrics::histogram!("tick_duration_seconds").record(report.elapsed.as_secs_f64());
        info!(
            subscribers = report.subscribers,
            alerts_sent = report.alerts_sent,
            no_hazards = report.no_hazards,
            fetch_failures = report.fetch_failures,
            delivery_failures = report.delivery_failures,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Forecast check complete"
        );
        report
    }

    #[instrument(skip_all, fields(email = %subscriber.email, city = %subscriber.city))]
    async fn process(&self, subscriber: Subscriber) -> Outcome {
        let fetch_timeout = self.config.fetch_timeout();
        let fetched = time::timeout(fetch_timeout, self.provider.fetch(&subscriber.city))
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::Timeout {
                    city: subscriber.city.clone(),
                    after: fetch_timeout,
                })
            });

        let entries = match fetched {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Skipping subscriber, forecast unavailable");
                metrics::counter!("forecast_fetch_failures_total").increment(1);
                return Outcome::FetchFailed;
            }
        };

        let warnings = collect_warnings(&entries);
        // Composition finishes before anything is sent, so a cancelled tick
        // never dispatches a partial message.
        let Some(message) =
            self.composer
                .compose(&subscriber, &warnings, self.notifier.body_format())
        else {
            debug!(entries = entries.len(), "No hazards forecast");
            return Outcome::NoHazards;
        };

        let dispatch_timeout = self.config.dispatch_timeout();
        let sent = time::timeout(dispatch_timeout, self.notifier.send(&message))
            .await
            .unwrap_or(Err(DeliveryError::Timeout(dispatch_timeout)));

        match sent {
            Ok(()) => {
                info!(
                    warnings = warnings.len(),
                    backend = self.notifier.name(),
                    "Alert sent"
                );
                metrics::counter!("alerts_sent_total", "backend" => self.notifier.name().to_string())
                    .increment(1);
                Outcome::Sent
            }
            Err(e) => {
                error!(error = %e, backend = self.notifier.name(), "Alert delivery failed");
                metrics::counter!("alert_delivery_failures_total", "backend" => self.notifier.name().to_string())
                    .increment(1);
                Outcome::DeliveryFailed
            }
        }
    }

    /// Runs ticks on a fixed interval until the shutdown signal fires.
    ///
    /// A timer fire that happens while a tick is running is dropped. When
    /// shutdown arrives mid-tick, the tick gets `shutdown_grace` to finish and
    /// is abandoned after that.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let period = self.config.poll_interval();
        let first = if self.config.run_immediately {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut interval = time::interval_at(first, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = period.as_secs(), "Scheduler started");

        if *shutdown_rx.borrow() {
            info!("Scheduler stopped before the first tick.");
            return;
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Scheduler received shutdown signal.");
                    break;
                }
                _ = interval.tick() => {}
            }

            let tick = self.tick();
            tokio::pin!(tick);

            tokio::select! {
                biased;
                _ = &mut tick => continue,
                _ = shutdown_rx.changed() => {}
            }

            let grace = self.config.shutdown_grace();
            info!(grace_secs = grace.as_secs(), "Shutdown requested during a forecast check, waiting for it to finish.");
            match time::timeout(grace, &mut tick).await {
                Ok(_) => info!("In-flight forecast check finished."),
                Err(_) => warn!("In-flight forecast check abandoned after the grace period."),
            }
            break;
        }

        info!("Scheduler stopped.");
    }
}
