//! HTTP surface for the Monitor: `GET /metrics` (text export) and
//! `GET /health` (aggregate health JSON).
//!
//! Grounded on `empath_health::server::HealthServer`: a `TcpListener`
//! bound up front, a `Router` with a `TimeoutLayer`, served with
//! `axum::serve(..).with_graceful_shutdown(..)` racing the broadcast
//! `Signal`.

use std::{sync::Arc, time::Duration};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json};
use sendkit_common::Signal;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{export::TextExporter, sampler::Monitor};

#[derive(Debug, Error)]
pub enum MonitorServerError {
    #[error("failed to bind monitor server to {address}: {source}")]
    Bind { address: String, source: std::io::Error },

    #[error("monitor server error: {0}")]
    Serve(String),
}

pub struct MonitorServer {
    listener: TcpListener,
    router: axum::Router,
}

impl MonitorServer {
    /// Bind the server. Does not start serving until [`Self::serve`] is
    /// called.
    pub async fn new(listen_address: &str, monitor: Arc<Monitor>) -> Result<Self, MonitorServerError> {
        let listener = TcpListener::bind(listen_address)
            .await
            .map_err(|e| MonitorServerError::Bind {
                address: listen_address.to_string(),
                source: e,
            })?;

        tracing::info!(address = listen_address, "monitor server bound");

        let router = axum::Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(monitor)
            .layer(TimeoutLayer::new(Duration::from_secs(5)));

        Ok(Self { listener, router })
    }

    /// Serve until `shutdown` fires, the teacher's health-server pattern
    /// for graceful shutdown.
    pub async fn serve(self, mut shutdown: tokio::sync::broadcast::Receiver<Signal>) -> Result<(), MonitorServerError> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("monitor server received shutdown signal");
            })
            .await
            .map_err(|e| MonitorServerError::Serve(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler(State(monitor): State<Arc<Monitor>>) -> impl IntoResponse {
    let sample = monitor.sample().await;
    let mut exporter = TextExporter::new();

    for (name, stats) in &sample.queue_stats {
        exporter.push("queue_waiting", &[("queue", name)], stats.waiting as f64);
        exporter.push("queue_delayed", &[("queue", name)], stats.delayed as f64);
        exporter.push("queue_paused", &[("queue", name)], if stats.paused { 1.0 } else { 0.0 });
    }
    exporter.push("dlq_depth", &[], sample.dlq_depth as f64);
    exporter.push("processor_processed", &[], sample.processor.processed as f64);
    exporter.push("processor_succeeded", &[], sample.processor.succeeded as f64);
    exporter.push("processor_failed", &[], sample.processor.failed as f64);
    exporter.push("processor_throughput_per_sec", &[], sample.processor.throughput_per_sec);
    exporter.push("processor_error_rate", &[], sample.processor.error_rate);
    exporter.push("processor_success_rate", &[], 1.0 - sample.processor.error_rate);
    for domain in &sample.domain_utilization {
        exporter.push(
            "domain_utilization",
            &[("domain", &domain.domain), ("account_id", &domain.account_id)],
            domain.utilization,
        );
    }

    (StatusCode::OK, exporter.finish())
}

async fn health_handler(State(monitor): State<Arc<Monitor>>) -> impl IntoResponse {
    let sample = monitor.sample().await;
    let status_code = match sample.aggregate_status {
        crate::health::Status::Healthy | crate::health::Status::Unknown => StatusCode::OK,
        crate::health::Status::Degraded | crate::health::Status::Critical => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(sample.aggregate_status)).into_response()
}
