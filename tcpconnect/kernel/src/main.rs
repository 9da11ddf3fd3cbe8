//! tcp_connect counter - Kernel Space Program
//!
//! Counts calls to the kernel's tcp_connect() per process in the COUNTS
//! hash map. Userspace enumerates the map to read the counts.
//!
//! ## Architecture
//!
//! ```text
//! tcp_connect() -> kprobe / fentry -> COUNTS[pid] += 1 (or insert 1)
//!                                      |
//!                                      v
//! Userspace    -> iterate COUNTS, export per-PID gauges
//! ```
//!
//! ## Usage
//!
//! This program must be compiled for the bpfel-unknown-none target:
//!
//! ```bash
//! cargo build --release --target=bpfel-unknown-none
//! ```
//!
//! The compiled bytecode is then loaded by the userspace daemon.

#![no_std]
#![no_main]

mod handlers;
mod helpers;
mod maps;

// Re-export probe functions so they're visible to the loader
pub use handlers::{tcp_connect, tcp_connect_fentry};

pub use maps::COUNTS;

#[link_section = "license"]
#[used]
pub static LICENSE: [u8; 4] = *b"GPL\0";

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    // The verifier rejects any path that could reach this
    loop {}
}
