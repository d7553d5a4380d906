//! Prometheus exposition when metrics are enabled.
//!
//! Kept in its own test binary because the recorder is process-global.

mod helpers;

use helpers::{app::TestAppBuilder, heatwave_forecast};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_metrics_endpoint_reports_pipeline_counters() {
    let app = TestAppBuilder::new()
        .with_config_modifier(|c| {
            c.metrics.enabled = true;
            c.scheduler.poll_interval_secs = 1;
            c.scheduler.run_immediately = true;
        })
        .start()
        .await
        .unwrap();
    app.provider.set_forecast("Delhi", heatwave_forecast());

    reqwest::Client::new()
        .post(app.url("/subscribe-weather-alert"))
        .json(&json!({ "email": "farmer@example.com" }))
        .send()
        .await
        .unwrap();

    // Wait for a tick that sees the new subscriber.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while app.notifier.sent().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "no alert was sent");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let body = reqwest::get(app.url("/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("ticks_total"), "{body}");
    assert!(body.contains("subscribers_registered_total"), "{body}");
    assert!(body.contains("alerts_sent_total{backend=\"recording\"}"), "{body}");

    app.shutdown(Duration::from_secs(10)).await.unwrap();
}
