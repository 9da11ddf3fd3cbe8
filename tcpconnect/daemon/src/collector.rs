//! Periodic collection of the COUNTS map
//!
//! Polls a [`CountSource`], resolves process names and publishes the latest
//! [`CountsReport`] for the HTTP servers to render.

use crate::{
    health::HealthChecker,
    procfs::ProcFs,
    table::{snapshot, CountSource},
    types::{CountEntry, CountsReport},
};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{watch, RwLock},
    task::{self, JoinHandle},
    time::{interval, MissedTickBehavior},
};

/// Latest report, shared between the collector and the metrics server
pub type SharedReport = Arc<RwLock<CountsReport>>;

/// Create an empty shared report
pub fn shared_report() -> SharedReport {
    Arc::new(RwLock::new(CountsReport::empty()))
}

/// Collector for the per-PID connect counts
pub struct CountCollector<S> {
    source: Arc<S>,
    procfs: ProcFs,
    report: SharedReport,
    health: Arc<HealthChecker>,
    interval: Duration,
}

impl<S: CountSource + Send + Sync + 'static> CountCollector<S> {
    /// Create a new collector
    ///
    /// # Arguments
    ///
    /// * `source` - Table to read counts from
    /// * `report` - Shared slot the latest report is published into
    /// * `health` - Health flags; `alive` is cleared when a read fails
    /// * `interval` - Polling interval
    pub fn new(
        source: S,
        report: SharedReport,
        health: Arc<HealthChecker>,
        interval: Duration,
    ) -> Self {
        Self {
            source: Arc::new(source),
            procfs: ProcFs::default(),
            report,
            health,
            interval,
        }
    }

    /// Use a different proc mount for process names
    pub fn with_procfs(mut self, procfs: ProcFs) -> Self {
        self.procfs = procfs;
        self
    }

    /// Read the table once and publish the result
    pub async fn collect(&self) -> Result<()> {
        let source = Arc::clone(&self.source);
        let procfs = self.procfs.clone();
        // Up to MAX_ENTRIES map syscalls and /proc reads; keep them off the runtime workers.
        let entries = task::spawn_blocking(move || read_entries(source.as_ref(), &procfs))
            .await
            .context("Collection task failed")??;

        let report = CountsReport::new(entries);
        debug!(
            "Collected {} connects across {} PIDs",
            report.total_connects,
            report.distinct_pids()
        );
        if report.is_saturated() {
            warn!(
                "COUNTS map is full ({} PIDs); connects from new processes are not counted",
                report.capacity
            );
        }

        *self.report.write().await = report;
        Ok(())
    }

    /// Spawn the polling loop
    ///
    /// Runs until `shutdown` becomes `true` or its sender is dropped, then
    /// collects one last time so the shared report is current.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.collect().await {
                            warn!("Metrics collection error: {:#}", e);
                            self.health.set_alive(false);
                        }
                    }
                    _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                        // Publish connects counted since the last tick before stopping.
                        if let Err(e) = self.collect().await {
                            warn!("Final metrics collection error: {:#}", e);
                        }
                        debug!("Collector stopping");
                        break;
                    }
                }
            }
        })
    }
}

fn read_entries<S: CountSource + ?Sized>(source: &S, procfs: &ProcFs) -> Result<Vec<CountEntry>> {
    Ok(snapshot(source)?
        .into_iter()
        .map(|(pid, count)| CountEntry {
            pid,
            comm: procfs.process_name(pid),
            count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Source whose contents tests can change while the collector runs
    #[derive(Default)]
    struct MutableSource {
        counts: Mutex<BTreeMap<u32, u64>>,
        fail: Mutex<bool>,
    }

    impl CountSource for Arc<MutableSource> {
        fn read_counts(&self) -> Result<Vec<(u32, u64)>> {
            if *self.fail.lock().unwrap() {
                anyhow::bail!("map read failed");
            }
            self.counts.lock().unwrap().read_counts()
        }
    }

    fn collector(
        source: Arc<MutableSource>,
    ) -> (CountCollector<Arc<MutableSource>>, Arc<HealthChecker>) {
        let health = Arc::new(HealthChecker::new());
        let collector = CountCollector::new(
            source,
            shared_report(),
            Arc::clone(&health),
            Duration::from_millis(10),
        )
        .with_procfs(ProcFs::new(std::env::temp_dir().join("tcpconnect-no-such-proc")));
        (collector, health)
    }

    #[tokio::test]
    async fn test_collect_publishes_report() {
        let source = Arc::new(MutableSource::default());
        source.counts.lock().unwrap().extend([(100, 3), (200, 3)]);
        let (collector, _) = collector(Arc::clone(&source));

        collector.collect().await.unwrap();

        let report = collector.report.read().await;
        assert_eq!(report.count_for(100), Some(3));
        assert_eq!(report.count_for(200), Some(3));
        assert_eq!(report.total_connects, 6);
        assert!(report.entries.iter().all(|e| e.comm == "unknown"));
    }

    #[tokio::test]
    async fn test_collect_twice_is_stable() {
        let source = Arc::new(MutableSource::default());
        source.counts.lock().unwrap().insert(100, 5);
        let (collector, _) = collector(Arc::clone(&source));

        collector.collect().await.unwrap();
        let first = collector.report.read().await.entries.clone();
        collector.collect().await.unwrap();
        let second = collector.report.read().await.entries.clone();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_read_error_clears_alive() {
        let source = Arc::new(MutableSource::default());
        *source.fail.lock().unwrap() = true;
        let (collector, health) = collector(Arc::clone(&source));
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = collector.spawn(stop_rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(!health.is_alive());
    }

    #[tokio::test]
    async fn test_spawned_collector_tracks_updates() {
        let source = Arc::new(MutableSource::default());
        let (collector, health) = collector(Arc::clone(&source));
        let report = Arc::clone(&collector.report);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = collector.spawn(stop_rx);
        source.counts.lock().unwrap().insert(100, 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        source.counts.lock().unwrap().insert(100, 4);
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(report.read().await.count_for(100), Some(4));
        assert!(health.is_alive());
    }

    #[tokio::test]
    async fn test_shutdown_publishes_final_counts() {
        let source = Arc::new(MutableSource::default());
        let health = Arc::new(HealthChecker::new());
        let report = shared_report();
        // Only the immediate first tick fires before shutdown.
        let collector = CountCollector::new(
            Arc::clone(&source),
            Arc::clone(&report),
            health,
            Duration::from_secs(3600),
        )
        .with_procfs(ProcFs::new(std::env::temp_dir().join("tcpconnect-no-such-proc")));
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = collector.spawn(stop_rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        source.counts.lock().unwrap().insert(100, 7);
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(report.read().await.count_for(100), Some(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_collect_on_multi_thread_runtime() {
        let source = Arc::new(MutableSource::default());
        source.counts.lock().unwrap().insert(100, 2);
        let (collector, _) = collector(Arc::clone(&source));

        let report = Arc::clone(&collector.report);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = collector.spawn(stop_rx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(report.read().await.count_for(100), Some(2));
    }
}
