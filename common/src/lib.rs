//! Shared protocol and constants for the tcp_connect counter probe
//!
//! This crate is used by both the eBPF kernel program and the userspace
//! daemon, so it must stay `no_std`.

#![cfg_attr(not(test), no_std)]

pub mod constants;
pub mod table;

pub use constants::*;
pub use table::{record_connect, CounterTable, InsertOutcome, RecordOutcome};
