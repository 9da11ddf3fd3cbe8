//! BPF map definitions for connect counting

use aya_ebpf::{macros::map, maps::HashMap};
use connect_common::constants::MAX_ENTRIES;

/// Per-process connect counter
///
/// Key: PID (thread-group id of the caller)
/// Value: u64 number of tcp_connect() calls observed
///
/// Userspace reads this map by name; entries are never removed while the
/// program is loaded, and inserts fail once MAX_ENTRIES keys are present.
#[map]
pub static COUNTS: HashMap<u32, u64> = HashMap::with_max_entries(MAX_ENTRIES, 0);
