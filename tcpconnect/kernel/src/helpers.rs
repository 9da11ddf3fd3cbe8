//! Helper functions for eBPF programs
//!
//! Wraps the BPF helpers the probe needs and adapts the COUNTS map to the
//! shared `CounterTable` protocol.

use aya_ebpf::{bindings::BPF_NOEXIST, helpers::bpf_get_current_pid_tgid, maps::HashMap};
use connect_common::{
    constants::EEXIST, record_connect, CounterTable, InsertOutcome, RecordOutcome,
};
use core::sync::atomic::{AtomicU64, Ordering};

use crate::maps::COUNTS;

/// Get current process ID (the tgid half of pid_tgid)
#[inline(always)]
pub fn get_pid() -> u32 {
    let pid_tgid = unsafe { bpf_get_current_pid_tgid() };
    (pid_tgid >> 32) as u32
}

/// `CounterTable` backed by a BPF hash map
pub struct MapCounts(&'static HashMap<u32, u64>);

impl CounterTable for MapCounts {
    #[inline(always)]
    fn increment(&self, pid: u32) -> bool {
        match self.0.get_ptr_mut(&pid) {
            Some(count) => {
                // The value slot is 8-byte aligned map memory shared by all CPUs.
                let count = unsafe { AtomicU64::from_ptr(count) };
                count.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    #[inline(always)]
    fn insert_if_absent(&self, pid: u32, initial: u64) -> InsertOutcome {
        match self.0.insert(&pid, &initial, BPF_NOEXIST as u64) {
            Ok(()) => InsertOutcome::Inserted,
            Err(err) if err as i64 == -EEXIST => InsertOutcome::Exists,
            // -E2BIG once the map is full; nothing else is recoverable here
            Err(_) => InsertOutcome::Full,
        }
    }
}

/// Count one connect event for the calling process
#[inline(always)]
pub fn count_connect() -> RecordOutcome {
    record_connect(&MapCounts(&COUNTS), get_pid())
}
