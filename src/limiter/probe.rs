//! Process resource readings
//!
//! The limiter and the filesystem traverser never read process statistics
//! directly; they go through [`ResourceProbe`] so tests can substitute fixed
//! readings.

use std::sync::Mutex;
use sysinfo::{Pid, System};

/// Source of memory and CPU readings for the current process
pub trait ResourceProbe: Send + Sync {
    /// Resident memory of the process in bytes
    fn memory_bytes(&self) -> u64;

    /// CPU usage of the process in percent since the previous reading
    fn cpu_percent(&self) -> f32;
}

/// Probe backed by `sysinfo` readings of the running process
pub struct ProcessProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl ProcessProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Cannot determine current pid, resource checks disabled: {}", e);
                None
            }
        };

        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }

    fn read<T: Default>(&self, f: impl FnOnce(&sysinfo::Process) -> T) -> T {
        let Some(pid) = self.pid else {
            return T::default();
        };
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_process(pid);
        system.process(pid).map(f).unwrap_or_default()
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for ProcessProbe {
    fn memory_bytes(&self) -> u64 {
        self.read(|process| process.memory())
    }

    fn cpu_percent(&self) -> f32 {
        self.read(|process| process.cpu_usage())
    }
}

/// Probe returning constant readings
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedProbe {
    pub memory_bytes: u64,
    pub cpu_percent: f32,
}

impl FixedProbe {
    pub fn new(memory_bytes: u64, cpu_percent: f32) -> Self {
        Self {
            memory_bytes,
            cpu_percent,
        }
    }
}

impl ResourceProbe for FixedProbe {
    fn memory_bytes(&self) -> u64 {
        self.memory_bytes
    }

    fn cpu_percent(&self) -> f32 {
        self.cpu_percent
    }
}
