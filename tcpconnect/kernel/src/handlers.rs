//! Probe handlers for tcp_connect counting
//!
//! Both programs run the same body; they differ only in how the host runtime
//! hands over the hooked function's context.

use aya_ebpf::{
    macros::{fentry, kprobe},
    programs::{FEntryContext, ProbeContext},
};

use crate::helpers::count_connect;

/// Count connects per PID through a kprobe
///
/// Attached to: tcp_connect
///
/// Works on any kernel with kprobes; arguments would be read from pt_regs.
#[kprobe]
pub fn tcp_connect(_ctx: ProbeContext) -> u32 {
    // A dropped event (table full) must not affect the traced connect.
    count_connect();
    0
}

/// Count connects per PID through fentry
///
/// Attached to: tcp_connect (BTF typed arguments)
#[fentry(function = "tcp_connect")]
pub fn tcp_connect_fentry(_ctx: FEntryContext) -> u32 {
    count_connect();
    0
}
