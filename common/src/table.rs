//! Counter table protocol
//!
//! The probe only ever talks to the COUNTS map through [`CounterTable`], and
//! [`record_connect`] is the whole increment-or-insert protocol. Keeping the
//! protocol here lets the kernel program and host-side tests run the exact
//! same code.

use crate::constants::INITIAL_COUNT;

/// Result of an `insert_if_absent` attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new entry was created with the initial value
    Inserted,
    /// An entry for the key already exists (a concurrent insert won)
    Exists,
    /// The table is at capacity, or the insert failed for another reason
    Full,
}

/// What happened to a single connect event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// An existing counter was atomically incremented
    Incremented,
    /// A new counter was created at [`INITIAL_COUNT`]
    Inserted,
    /// The event was not counted (table full)
    Dropped,
}

impl RecordOutcome {
    /// Whether the event is reflected in the table
    pub fn is_counted(self) -> bool {
        !matches!(self, RecordOutcome::Dropped)
    }
}

/// Fixed-capacity per-PID counter store
///
/// Implementations must be safe to call concurrently from several CPUs
/// without external locking.
pub trait CounterTable {
    /// Atomically add one to the counter for `pid`.
    ///
    /// Returns `false` when there is no entry for `pid`.
    fn increment(&self, pid: u32) -> bool;

    /// Create an entry for `pid` holding `initial`, unless one exists.
    fn insert_if_absent(&self, pid: u32, initial: u64) -> InsertOutcome;
}

/// Count one connect event for `pid`.
///
/// A caller that loses the first-insert race folds its event into an
/// increment of the winner's entry, so no event is lost while the table has
/// room.
#[inline(always)]
pub fn record_connect<T: CounterTable + ?Sized>(table: &T, pid: u32) -> RecordOutcome {
    if table.increment(pid) {
        return RecordOutcome::Incremented;
    }

    match table.insert_if_absent(pid, INITIAL_COUNT) {
        InsertOutcome::Inserted => RecordOutcome::Inserted,
        InsertOutcome::Exists => {
            if table.increment(pid) {
                RecordOutcome::Incremented
            } else {
                RecordOutcome::Dropped
            }
        }
        InsertOutcome::Full => RecordOutcome::Dropped,
    }
}
