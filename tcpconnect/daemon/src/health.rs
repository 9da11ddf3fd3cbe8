//! Liveness and readiness state
//!
//! `ready` flips on once the probe is attached and off again on shutdown.
//! `alive` starts on and is cleared by the collector when the map can no
//! longer be read.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared daemon health flags
#[derive(Debug)]
pub struct HealthChecker {
    ready: AtomicBool,
    alive: AtomicBool,
}

/// Health snapshot returned by `/health`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub ready: bool,
    pub alive: bool,
    /// Unix timestamp in seconds
    pub timestamp: i64,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            alive: AtomicBool::new(true),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            ready: self.is_ready(),
            alive: self.is_alive(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// `GET /liveness`
pub async fn liveness(State(health): State<Arc<HealthChecker>>) -> (StatusCode, &'static str) {
    if health.is_alive() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not alive")
    }
}

/// `GET /readiness`
pub async fn readiness(State(health): State<Arc<HealthChecker>>) -> (StatusCode, &'static str) {
    if health.is_ready() {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
    }
}

/// `GET /health`
pub async fn health(State(health): State<Arc<HealthChecker>>) -> (StatusCode, Json<HealthStatus>) {
    let status = health.status();
    let code = if status.ready && status.alive {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}
