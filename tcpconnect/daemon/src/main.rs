//! tcp_connect counter - Userspace Program
//!
//! Loads the eBPF counter, attaches it to tcp_connect, and serves the
//! per-PID counts as Prometheus gauges alongside health endpoints.
//!
//! ## Usage
//!
//! ```bash
//! # Attach with a kprobe and serve until interrupted
//! sudo ./tcpconnect --ebpf-object path/to/tcpconnect
//!
//! # Use the fentry variant and poll every second
//! sudo ./tcpconnect --ebpf-object path/to/tcpconnect --attach fentry --interval 1
//!
//! # Run for 60 seconds and write a final JSON snapshot
//! sudo ./tcpconnect --ebpf-object path/to/tcpconnect --duration 60 --output counts.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tcpconnect_daemon::{
    collector::{shared_report, CountCollector},
    exporter::{ExporterType, JsonExporter, MetricsExporter, PrometheusExporter},
    health::HealthChecker,
    loader::{AttachMode, ProbeLoader},
    server::{ServerConfig, ServerManager},
    types::CountsReport,
};
use tokio::{
    signal::{
        self,
        unix::{signal as unix_signal, SignalKind},
    },
    sync::watch,
    time::sleep,
};

/// Per-process tcp_connect() counter using eBPF
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to eBPF object file (if not embedded)
    #[clap(long)]
    ebpf_object: Option<PathBuf>,

    /// Attach mode (kprobe, fentry)
    #[clap(short, long, default_value = "kprobe")]
    attach: AttachMode,

    /// Address for the Prometheus metrics server
    #[clap(long, default_value = "0.0.0.0:9090")]
    metrics_addr: SocketAddr,

    /// Address for the health check server
    #[clap(long, default_value = "0.0.0.0:8080")]
    health_addr: SocketAddr,

    /// Map polling interval in seconds
    #[clap(short, long, default_value_t = 5)]
    interval: u64,

    /// Duration to run (in seconds, 0 = until interrupted)
    #[clap(short, long, default_value_t = 0)]
    duration: u64,

    /// Seconds to wait for HTTP servers to drain on shutdown
    #[clap(long, default_value_t = 10)]
    shutdown_timeout: u64,

    /// Write a final snapshot to this file on shutdown
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Snapshot format (json, prometheus)
    #[clap(short, long, default_value = "json")]
    format: String,

    /// Verbose logging
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if args.interval == 0 {
        anyhow::bail!("Interval must be >= 1 second");
    }

    let export_format = match args.format.to_lowercase().as_str() {
        "json" => ExporterType::Json,
        "prometheus" | "prom" => ExporterType::Prometheus,
        _ => anyhow::bail!("Unsupported format: {}. Use json or prometheus", args.format),
    };

    info!("Starting tcp_connect counter...");
    info!("   Attach mode: {}", args.attach);
    info!("   Poll interval: {} seconds", args.interval);

    let health = Arc::new(HealthChecker::new());

    // Load and attach the probe; dropping the loader detaches it
    let mut loader = ProbeLoader::load(args.ebpf_object.clone())?;
    loader.attach(args.attach)?;
    let counts = loader.take_counts()?;

    health.set_ready(true);
    info!("eBPF program attached - ready");

    // Start collector
    let report = shared_report();
    let (stop_tx, stop_rx) = watch::channel(false);
    let collector = CountCollector::new(
        counts,
        Arc::clone(&report),
        Arc::clone(&health),
        Duration::from_secs(args.interval),
    );
    let collector_task = collector.spawn(stop_rx);

    // Start HTTP servers
    let servers = ServerManager::start(
        ServerConfig {
            metrics_addr: args.metrics_addr,
            health_addr: args.health_addr,
        },
        Arc::clone(&report),
        Arc::clone(&health),
    )
    .await?;

    wait_for_shutdown(args.duration).await?;

    info!("Shutting down...");
    health.set_ready(false);

    // The collector reads the map once more on its way out
    let _ = stop_tx.send(true);
    if let Err(e) = collector_task.await {
        warn!("Collector task failed: {}", e);
    }

    if let Err(e) = servers
        .shutdown_gracefully(Duration::from_secs(args.shutdown_timeout))
        .await
    {
        warn!("{:#}", e);
    }

    if let Some(output) = &args.output {
        let report = report.read().await;
        export_report(&report, output.clone(), export_format)?;
        info!("Snapshot written to {:?}", output);
    }

    drop(loader);
    info!("Shutdown complete");

    Ok(())
}

async fn wait_for_shutdown(duration_secs: u64) -> Result<()> {
    let mut terminate =
        unix_signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    let run_for = async {
        if duration_secs > 0 {
            sleep(Duration::from_secs(duration_secs)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = run_for => info!("Duration reached"),
        res = signal::ctrl_c() => {
            res.context("Failed to listen for ctrl-c")?;
            info!("Interrupted");
        }
        _ = terminate.recv() => info!("Received SIGTERM"),
    }

    Ok(())
}

fn export_report(report: &CountsReport, output: PathBuf, format: ExporterType) -> Result<()> {
    match format {
        ExporterType::Json => JsonExporter::new(output, true).export(report),
        ExporterType::Prometheus => PrometheusExporter::new(output).export(report),
    }
}
