//! # Subscription API
//!
//! An `axum` server exposing the health check, the subscribe endpoint and,
//! when metrics are enabled, the Prometheus `/metrics` endpoint.
//!
//! The server listens to the application's shutdown signal and stops
//! accepting connections once it fires.

use crate::core::Subscriber;
use crate::registry::SubscriberRegistry;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, trace};

pub const DEFAULT_CITY: &str = "Delhi";
pub const HEALTH_MESSAGE: &str = "Weather Alert System Running (Auto-check enabled)";
pub const SUBSCRIBED_MESSAGE: &str = "Subscription successful!";

/// Body of `POST /subscribe-weather-alert`.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    #[serde(default = "default_city")]
    pub city: String,
}

fn default_city() -> String {
    DEFAULT_CITY.to_string()
}

/// `{ "message": ... }` response used by every JSON endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

async fn health() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: HEALTH_MESSAGE.to_string(),
    })
}

async fn subscribe(
    State(registry): State<SubscriberRegistry>,
    Json(request): Json<SubscribeRequest>,
) -> Json<MessageResponse> {
    info!(email = %request.email, city = %request.city, "New subscription");
    registry.add(Subscriber::new(request.email, request.city));
    Json(MessageResponse {
        message: SUBSCRIBED_MESSAGE.to_string(),
    })
}

/// Builds the router. `/metrics` is only mounted when a handle is given.
pub fn router(registry: SubscriberRegistry, prom_handle: Option<PrometheusHandle>) -> Router {
    let router = Router::new()
        .route("/", get(health))
        .route("/subscribe-weather-alert", post(subscribe))
        .with_state(registry);

    match prom_handle {
        Some(handle) => router.route("/metrics", get(move || async move { handle.render() })),
        None => router,
    }
}

/// The HTTP server, bound but not yet running.
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl ApiServer {
    /// Creates a new `ApiServer` but does not spawn it.
    pub fn new(
        listener: TcpListener,
        registry: SubscriberRegistry,
        prom_handle: Option<PrometheusHandle>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            router: router(registry, prom_handle),
            shutdown_rx,
        }
    }

    /// Returns a future that serves requests until a shutdown signal is received.
    pub fn run(self) -> impl Future<Output = ()> {
        let mut shutdown_rx = self.shutdown_rx;
        let shutdown = async move {
            if !*shutdown_rx.borrow() {
                let _ = shutdown_rx.changed().await;
            }
            trace!("API server received shutdown signal.");
        };

        async move {
            if let Err(e) = axum::serve(self.listener, self.router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("API server error: {}", e);
            }
            trace!("API server task finished.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_defaults_city() {
        let request: SubscribeRequest =
            serde_json::from_str(r#"{"email":"farmer@example.com"}"#).unwrap();
        assert_eq!(request.city, "Delhi");

        let request: SubscribeRequest =
            serde_json::from_str(r#"{"email":"farmer@example.com","city":"Pune"}"#).unwrap();
        assert_eq!(request.city, "Pune");
    }

    #[tokio::test]
    async fn test_subscribe_handler_adds_to_registry() {
        let registry = SubscriberRegistry::new();
        let response = subscribe(
            State(registry.clone()),
            Json(SubscribeRequest {
                email: "farmer@example.com".to_string(),
                city: "Nagpur".to_string(),
            }),
        )
        .await;

        assert_eq!(response.0.message, SUBSCRIBED_MESSAGE);
        assert_eq!(
            registry.snapshot().as_slice(),
            &[Subscriber::new("farmer@example.com", "Nagpur")]
        );
    }
}
