//! Process name lookup via /proc

use std::path::PathBuf;

/// Name reported when /proc/<pid>/comm cannot be read
pub const UNKNOWN_COMM: &str = "unknown";

/// Reader for per-process files under a proc mount
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Command name (`comm`) of a process
    ///
    /// Processes that already exited, or whose comm is unreadable, resolve to
    /// [`UNKNOWN_COMM`].
    pub fn process_name(&self, pid: u32) -> String {
        let path = self.root.join(pid.to_string()).join("comm");
        match std::fs::read_to_string(&path) {
            Ok(comm) => {
                let comm = comm.trim();
                if comm.is_empty() {
                    UNKNOWN_COMM.to_string()
                } else {
                    comm.to_string()
                }
            }
            Err(_) => UNKNOWN_COMM.to_string(),
        }
    }
}
