//! Userspace type definitions
//!
//! Defines the data structures the daemon publishes from the COUNTS map.

use connect_common::constants::MAX_ENTRIES;
use serde::{Deserialize, Serialize};

/// Connect count for a single process
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CountEntry {
    /// Process ID
    pub pid: u32,
    /// Process name from /proc/<pid>/comm ("unknown" once the process is gone)
    pub comm: String,
    /// Number of tcp_connect() calls observed
    pub count: u64,
}

/// One collected view of the COUNTS map
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CountsReport {
    /// RFC 3339 timestamp of the collection
    pub timestamp: String,
    /// Map capacity (distinct PIDs)
    pub capacity: u32,
    /// Sum of all counters
    pub total_connects: u64,
    /// Per-process entries, sorted by PID
    pub entries: Vec<CountEntry>,
}

impl CountsReport {
    /// Build a report stamped with the current time
    ///
    /// Entries are sorted by PID.
    pub fn new(mut entries: Vec<CountEntry>) -> Self {
        entries.sort_by_key(|e| e.pid);
        let total_connects = entries.iter().map(|e| e.count).sum();
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            capacity: MAX_ENTRIES,
            total_connects,
            entries,
        }
    }

    /// Report for a map nothing has been read from yet
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of distinct PIDs in the map
    pub fn distinct_pids(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is full, i.e. new PIDs are being dropped
    pub fn is_saturated(&self) -> bool {
        self.entries.len() >= self.capacity as usize
    }

    /// Count for a given PID, if tracked
    ///
    /// Deserialized reports carry no ordering guarantee, so this scans.
    pub fn count_for(&self, pid: u32) -> Option<u64> {
        self.entries.iter().find(|e| e.pid == pid).map(|e| e.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pid: u32, count: u64) -> CountEntry {
        CountEntry {
            pid,
            comm: "curl".to_string(),
            count,
        }
    }

    #[test]
    fn test_report_totals() {
        let report = CountsReport::new(vec![entry(100, 3), entry(200, 4)]);

        assert_eq!(report.total_connects, 7);
        assert_eq!(report.distinct_pids(), 2);
        assert_eq!(report.capacity, MAX_ENTRIES);
        assert!(!report.is_saturated());
        assert_eq!(report.count_for(200), Some(4));
        assert_eq!(report.count_for(300), None);
    }

    #[test]
    fn test_unsorted_entries() {
        let report = CountsReport::new(vec![entry(300, 1), entry(100, 5), entry(200, 3)]);

        assert_eq!(report.count_for(300), Some(1));
        assert_eq!(report.count_for(100), Some(5));
        let pids: Vec<u32> = report.entries.iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![100, 200, 300]);
    }

    #[test]
    fn test_unsorted_deserialized_report() {
        let json = r#"{"timestamp":"t","capacity":8192,"total_connects":6,
            "entries":[{"pid":300,"comm":"a","count":1},{"pid":100,"comm":"b","count":5}]}"#;
        let report: CountsReport = serde_json::from_str(json).unwrap();

        assert_eq!(report.count_for(300), Some(1));
        assert_eq!(report.count_for(100), Some(5));
        assert_eq!(report.count_for(200), None);
    }

    #[test]
    fn test_empty_report() {
        let report = CountsReport::empty();

        assert_eq!(report.total_connects, 0);
        assert!(report.entries.is_empty());
    }
}
