//! tcp_connect counter - userspace library
//!
//! Provides reusable components for loading the per-PID connect counter,
//! reading its map, and serving the results over HTTP.

pub mod collector;
pub mod exporter;
pub mod health;
pub mod loader;
pub mod procfs;
pub mod server;
pub mod table;
pub mod types;

pub use collector::{shared_report, CountCollector, SharedReport};
pub use exporter::{ExporterType, JsonExporter, MetricsExporter, PrometheusExporter};
pub use health::HealthChecker;
pub use loader::{AttachMode, ProbeLoader};
pub use server::{ServerConfig, ServerManager};
pub use table::CountSource;
pub use types::*;
