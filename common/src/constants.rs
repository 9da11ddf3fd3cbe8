//! Shared constants for the tcp_connect probe
//!
//! These constants are used by both kernel and userspace programs
//! to ensure they agree on names and limits.

// ============================================================================
// BPF Map Sizes
// ============================================================================

/// Maximum number of distinct processes tracked in the COUNTS map
pub const MAX_ENTRIES: u32 = 8192;

/// Initial value stored for a process on its first observed connect
pub const INITIAL_COUNT: u64 = 1;

// ============================================================================
// Object Layout
// ============================================================================

/// Name of the per-PID counter map in the eBPF object
pub const COUNTS_MAP: &str = "COUNTS";

/// Kernel function the probe attaches to
pub const TARGET_SYMBOL: &str = "tcp_connect";

/// Program name of the kprobe variant (register context)
pub const KPROBE_PROGRAM: &str = "tcp_connect";

/// Program name of the fentry variant (typed BTF arguments)
pub const FENTRY_PROGRAM: &str = "tcp_connect_fentry";

// ============================================================================
// Kernel Error Codes (map helpers return them negated)
// ============================================================================

/// Key already present (BPF_NOEXIST insert lost a race)
pub const EEXIST: i64 = 17;
