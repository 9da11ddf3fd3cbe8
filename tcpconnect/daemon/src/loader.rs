//! eBPF program loader
//!
//! Handles loading the tcp_connect counter object, attaching one of its two
//! program variants, and handing out the COUNTS map.

use anyhow::{Context, Result};
use aya::{
    maps::{HashMap, MapData},
    programs::{FEntry, KProbe},
    Bpf, Btf,
};
use connect_common::constants::{COUNTS_MAP, FENTRY_PROGRAM, KPROBE_PROGRAM, TARGET_SYMBOL};
use log::info;
use std::{fmt, path::PathBuf, str::FromStr};

/// How the probe is attached to tcp_connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachMode {
    /// Dynamic kprobe, arguments via pt_regs
    #[default]
    Kprobe,
    /// BTF-typed fentry trampoline (needs kernel BTF)
    Fentry,
}

impl FromStr for AttachMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kprobe" => Ok(AttachMode::Kprobe),
            "fentry" => Ok(AttachMode::Fentry),
            _ => anyhow::bail!("Unsupported attach mode: {}. Use kprobe or fentry", s),
        }
    }
}

impl fmt::Display for AttachMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachMode::Kprobe => write!(f, "kprobe"),
            AttachMode::Fentry => write!(f, "fentry"),
        }
    }
}

/// Typed handle to the per-PID counter map
pub type CountsMap = HashMap<MapData, u32, u64>;

/// eBPF program loader and manager
///
/// Attached programs stay attached for as long as the loader is alive.
pub struct ProbeLoader {
    ebpf: Bpf,
}

impl ProbeLoader {
    /// Load eBPF program from file or embedded bytecode
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to eBPF object file. If None, uses embedded bytecode.
    ///
    /// # Returns
    ///
    /// ProbeLoader instance with loaded eBPF object
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        info!("Loading eBPF program...");

        let ebpf = if let Some(obj_path) = path {
            info!("Loading eBPF object from: {:?}", obj_path);
            let data = std::fs::read(&obj_path)
                .with_context(|| format!("Failed to read eBPF object file: {:?}", obj_path))?;
            Bpf::load(&data).context("Failed to load eBPF program")?
        } else {
            #[cfg(feature = "embedded")]
            {
                info!("Loading embedded eBPF program...");
                let data = include_bytes!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../target/bpfel-unknown-none/release/tcpconnect"
                ));
                Bpf::load(data).context("Failed to load embedded eBPF program")?
            }
            #[cfg(not(feature = "embedded"))]
            {
                anyhow::bail!(
                    "No eBPF object file provided. Use --ebpf-object or compile with 'embedded' feature"
                );
            }
        };

        info!("eBPF program loaded successfully");

        Ok(Self { ebpf })
    }

    /// Attach the counter to tcp_connect
    ///
    /// # Arguments
    ///
    /// * `mode` - Which program variant to load and attach
    pub fn attach(&mut self, mode: AttachMode) -> Result<()> {
        match mode {
            AttachMode::Kprobe => self.attach_kprobe(),
            AttachMode::Fentry => self.attach_fentry(),
        }
    }

    fn attach_kprobe(&mut self) -> Result<()> {
        info!("Attaching kprobe to {}...", TARGET_SYMBOL);

        let program: &mut KProbe = self
            .ebpf
            .program_mut(KPROBE_PROGRAM)
            .with_context(|| format!("{} program not found in eBPF object", KPROBE_PROGRAM))?
            .try_into()
            .with_context(|| format!("Failed to get {} as KProbe", KPROBE_PROGRAM))?;
        program
            .load()
            .with_context(|| format!("Failed to load {}", KPROBE_PROGRAM))?;
        program
            .attach(TARGET_SYMBOL, 0)
            .with_context(|| format!("Failed to attach kprobe to {}", TARGET_SYMBOL))?;
        info!("  ✓ Attached kprobe to {}", TARGET_SYMBOL);

        Ok(())
    }

    fn attach_fentry(&mut self) -> Result<()> {
        info!("Attaching fentry to {}...", TARGET_SYMBOL);

        let btf = Btf::from_sys_fs().context("Failed to read kernel BTF (needed for fentry)")?;
        let program: &mut FEntry = self
            .ebpf
            .program_mut(FENTRY_PROGRAM)
            .with_context(|| format!("{} program not found in eBPF object", FENTRY_PROGRAM))?
            .try_into()
            .with_context(|| format!("Failed to get {} as FEntry", FENTRY_PROGRAM))?;
        program
            .load(TARGET_SYMBOL, &btf)
            .with_context(|| format!("Failed to load {}", FENTRY_PROGRAM))?;
        program
            .attach()
            .with_context(|| format!("Failed to attach fentry to {}", TARGET_SYMBOL))?;
        info!("  ✓ Attached fentry to {}", TARGET_SYMBOL);

        Ok(())
    }

    /// Take the COUNTS map out of the object
    ///
    /// # Returns
    ///
    /// Owned hash map handle for enumerating per-PID counts
    pub fn take_counts(&mut self) -> Result<CountsMap> {
        let map = self
            .ebpf
            .take_map(COUNTS_MAP)
            .with_context(|| format!("{} map not found in eBPF object", COUNTS_MAP))?;

        CountsMap::try_from(map)
            .with_context(|| format!("Failed to create HashMap<u32, u64> from {} map", COUNTS_MAP))
    }
}
