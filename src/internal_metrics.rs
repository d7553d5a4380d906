//! Prometheus recorder setup and metric descriptions.
//!
//! Metrics are recorded through the `metrics` facade everywhere in the crate.
//! Without an installed recorder those calls are no-ops, which is the state
//! when `metrics.enabled` is false.

use anyhow::{Context, Result};
use metrics::Unit;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Registers descriptions for every metric the service emits.
pub fn describe_metrics() {
    metrics::describe_counter!("ticks_total", Unit::Count, "Total number of completed forecast checks.");
    metrics::describe_counter!("alerts_sent_total", Unit::Count, "Total number of alerts accepted by the delivery backend, labeled by backend.");
    metrics::describe_counter!("forecast_fetch_failures_total", Unit::Count, "Total number of subscribers skipped because their forecast could not be fetched.");
    metrics::describe_counter!("alert_delivery_failures_total", Unit::Count, "Total number of alerts the delivery backend failed to send, labeled by backend.");
    metrics::describe_counter!("subscribers_registered_total", Unit::Count, "Total number of subscriptions received.");
    metrics::describe_gauge!("subscribers", Unit::Count, "The current number of registered subscriptions.");
    metrics::describe_histogram!("tick_duration_seconds", Unit::Seconds, "The time taken by one forecast check over all subscribers.");
}

/// Installs the global Prometheus recorder and returns the handle used to
/// render `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let recorder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0],
        )
        .context("invalid histogram buckets")?
        .build_recorder();
    let handle = recorder.handle();

    metrics::set_global_recorder(recorder)
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;
    describe_metrics();
    Ok(handle)
}
