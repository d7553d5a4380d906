//! Timer-driven behaviour of the scheduler loop, on a paused clock.

mod helpers;

use hazardwatch::{
    composer::AlertComposer, config::Config, forecast::test_utils::FakeForecastProvider,
    notification::test_utils::RecordingNotifier, registry::SubscriberRegistry,
    scheduler::Scheduler, Subscriber,
};
use helpers::heatwave_forecast;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};

struct Harness {
    provider: FakeForecastProvider,
    notifier: RecordingNotifier,
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

fn start(modify: impl FnOnce(&mut Config), fetch_delay: Duration) -> Harness {
    let registry = SubscriberRegistry::new();
    registry.add(Subscriber::new("a@example.com", "Delhi"));

    let provider = FakeForecastProvider::new();
    provider.set_forecast("Delhi", heatwave_forecast());
    provider.set_delay(fetch_delay);
    let notifier = RecordingNotifier::new();

    let mut config = Config::default();
    config.scheduler.fetch_timeout_secs = 3600;
    modify(&mut config);

    let scheduler = Scheduler::new(
        registry,
        Arc::new(provider.clone()),
        Arc::new(notifier.clone()),
        AlertComposer::from_config(&config.alert),
        config.scheduler,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));

    Harness {
        provider,
        notifier,
        shutdown_tx,
        handle,
    }
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_fires_one_interval_after_start() {
    let harness = start(|c| c.scheduler.poll_interval_secs = 100, Duration::ZERO);

    sleep(Duration::from_secs(99)).await;
    assert_eq!(harness.provider.total_calls(), 0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(harness.provider.total_calls(), 1);
    assert_eq!(harness.notifier.sent().len(), 1);

    harness.shutdown_tx.send(true).unwrap();
    harness.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_immediately_fires_at_startup() {
    let harness = start(
        |c| {
            c.scheduler.poll_interval_secs = 100;
            c.scheduler.run_immediately = true;
        },
        Duration::ZERO,
    );

    sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.provider.total_calls(), 1);

    harness.shutdown_tx.send(true).unwrap();
    harness.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_ticks_never_overlap() {
    // Each tick takes 2.5 intervals; fires during a tick must be dropped.
    let harness = start(
        |c| {
            c.scheduler.poll_interval_secs = 1;
            c.scheduler.run_immediately = true;
        },
        Duration::from_millis(2500),
    );

    sleep(Duration::from_secs(10)).await;

    assert_eq!(harness.provider.max_in_flight(), 1);
    let calls = harness.provider.total_calls();
    assert!((3..=5).contains(&calls), "unexpected number of ticks: {calls}");

    harness.shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(60), harness.handle)
        .await
        .expect("scheduler should stop")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_idle_stops_immediately() {
    let harness = start(|c| c.scheduler.poll_interval_secs = 3600, Duration::ZERO);

    sleep(Duration::from_secs(5)).await;
    let started = Instant::now();
    harness.shutdown_tx.send(true).unwrap();
    harness.handle.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(harness.provider.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_tick_finishes_within_grace_period() {
    let harness = start(
        |c| {
            c.scheduler.poll_interval_secs = 3600;
            c.scheduler.run_immediately = true;
            c.scheduler.shutdown_grace_secs = 30;
        },
        Duration::from_secs(5),
    );

    sleep(Duration::from_secs(1)).await;
    harness.shutdown_tx.send(true).unwrap();
    harness.handle.await.unwrap();

    assert_eq!(harness.notifier.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_tick_is_abandoned_after_grace_period() {
    let harness = start(
        |c| {
            c.scheduler.poll_interval_secs = 3600;
            c.scheduler.run_immediately = true;
            c.scheduler.shutdown_grace_secs = 2;
        },
        Duration::from_secs(600),
    );

    sleep(Duration::from_secs(1)).await;
    let started = Instant::now();
    harness.shutdown_tx.send(true).unwrap();
    harness.handle.await.unwrap();

    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(2), "returned too early: {waited:?}");
    assert!(waited < Duration::from_secs(10), "grace period ignored: {waited:?}");
    assert!(harness.notifier.sent().is_empty());
}
