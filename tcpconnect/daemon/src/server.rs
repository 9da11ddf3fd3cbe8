//! HTTP servers for metrics and health checks
//!
//! Two listeners, so health probes keep answering on their own port:
//! - metrics: `GET /metrics` (Prometheus text), everything else 404
//! - health: `/readiness`, `/liveness`, `/health`

use crate::{
    collector::SharedReport,
    exporter::{to_prometheus_format, PROMETHEUS_CONTENT_TYPE},
    health::{self, HealthChecker},
};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use log::info;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};

/// Listen addresses for the two servers
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub metrics_addr: SocketAddr,
    pub health_addr: SocketAddr,
}

/// Router serving `/metrics` from the shared report
pub fn metrics_router(report: SharedReport) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .with_state(report)
}

/// Router serving the health endpoints
pub fn health_router(health: Arc<HealthChecker>) -> Router {
    Router::new()
        .route("/readiness", get(health::readiness))
        .route("/liveness", get(health::liveness))
        .route("/health", get(health::health))
        .with_state(health)
}

async fn metrics(State(report): State<SharedReport>) -> impl IntoResponse {
    let report = report.read().await;
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        to_prometheus_format(&report),
    )
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Running metrics and health servers
pub struct ServerManager {
    metrics_addr: SocketAddr,
    health_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<std::io::Result<()>>)>,
}

impl ServerManager {
    /// Bind both listeners and start serving
    ///
    /// Binding happens before this returns, so an address in use fails
    /// startup instead of a background task.
    pub async fn start(
        config: ServerConfig,
        report: SharedReport,
        health: Arc<HealthChecker>,
    ) -> Result<Self> {
        let (shutdown, _) = watch::channel(false);

        let metrics_listener = TcpListener::bind(config.metrics_addr)
            .await
            .with_context(|| format!("Failed to bind metrics server to {}", config.metrics_addr))?;
        let health_listener = TcpListener::bind(config.health_addr)
            .await
            .with_context(|| format!("Failed to bind health server to {}", config.health_addr))?;

        let metrics_addr = metrics_listener.local_addr()?;
        let health_addr = health_listener.local_addr()?;

        info!("Serving metrics on http://{}/metrics", metrics_addr);
        info!(
            "Serving health checks on http://{} (/readiness, /liveness, /health)",
            health_addr
        );

        let tasks = vec![
            (
                "metrics",
                serve(metrics_listener, metrics_router(report), shutdown.subscribe()),
            ),
            (
                "health",
                serve(health_listener, health_router(health), shutdown.subscribe()),
            ),
        ];

        Ok(Self {
            metrics_addr,
            health_addr,
            shutdown,
            tasks,
        })
    }

    /// Address the metrics server is bound to
    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics_addr
    }

    /// Address the health server is bound to
    pub fn health_addr(&self) -> SocketAddr {
        self.health_addr
    }

    /// Stop both servers, waiting at most `timeout` for in-flight requests
    pub async fn shutdown_gracefully(self, timeout: Duration) -> Result<()> {
        // Both tasks hold receivers, so the send cannot fail while they run.
        let _ = self.shutdown.send(true);

        let tasks = self.tasks;
        let wait_all = async move {
            let mut errors = Vec::new();
            for (name, task) in tasks {
                match task.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => errors.push(format!("{} server: {}", name, e)),
                    Err(e) => errors.push(format!("{} server task: {}", name, e)),
                }
            }
            errors
        };

        match tokio::time::timeout(timeout, wait_all).await {
            Ok(errors) if errors.is_empty() => Ok(()),
            Ok(errors) => anyhow::bail!("Server shutdown error: {}", errors.join("; ")),
            Err(_) => anyhow::bail!("Server shutdown timed out after {:?}", timeout),
        }
    }
}

fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
    })
}
