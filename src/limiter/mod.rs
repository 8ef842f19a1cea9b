//! Resource limiter gating concurrent fetches
//!
//! The limiter tracks four budgets:
//! - process memory against a ceiling
//! - process CPU usage against a ceiling
//! - bytes transferred within a sliding one-second window
//! - open connection slots against a fixed capacity
//!
//! Every check is advisory. A `false` answer means the caller must skip or
//! fail the operation; the limiter never sleeps or waits on behalf of the
//! caller, and connection acquisition never blocks.

mod clock;
mod probe;

pub use clock::{Clock, ManualClock, SystemClock};
pub use probe::{FixedProbe, ProcessProbe, ResourceProbe};

use crate::config::Config;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Length of the bandwidth sampling window
const BANDWIDTH_WINDOW: Duration = Duration::from_secs(1);

/// Resource ceilings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBudget {
    pub max_memory_bytes: u64,
    pub max_cpu_percent: f32,
    pub max_bandwidth_bytes_per_sec: u64,
    pub max_connections: usize,
    pub max_file_size: u64,
    pub max_depth: Option<usize>,
}

impl ResourceBudget {
    /// Builds the budget from the `[limits]` section of the configuration
    pub fn from_config(config: &Config) -> Self {
        let limits = &config.limits;
        Self {
            max_memory_bytes: limits.max_memory_bytes,
            max_cpu_percent: limits.max_cpu_percent,
            max_bandwidth_bytes_per_sec: limits.max_bandwidth_bytes_per_sec,
            max_connections: limits.max_connections,
            max_file_size: limits.max_file_size,
            max_depth: limits.max_depth,
        }
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    /// (timestamp, bytes) samples from the last second
    window: VecDeque<(Instant, u64)>,
    active_connections: usize,
}

/// Tracks resource usage against a [`ResourceBudget`]
///
/// All mutable state sits behind a single mutex, so one limiter can be shared
/// by any number of in-flight fetch tasks.
pub struct ResourceLimiter {
    budget: ResourceBudget,
    probe: Arc<dyn ResourceProbe>,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl ResourceLimiter {
    /// Creates a limiter reading the current process and the system clock
    pub fn new(budget: ResourceBudget) -> Self {
        Self::with_parts(budget, Arc::new(ProcessProbe::new()), Arc::new(SystemClock))
    }

    /// Creates a limiter with explicit probe and clock implementations
    pub fn with_parts(
        budget: ResourceBudget,
        probe: Arc<dyn ResourceProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            budget,
            probe,
            clock,
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    fn state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns true while process memory is below the ceiling
    pub fn check_memory(&self) -> bool {
        let used = self.probe.memory_bytes();
        if used >= self.budget.max_memory_bytes {
            tracing::warn!(
                "Memory usage {} exceeds limit {}",
                used,
                self.budget.max_memory_bytes
            );
            return false;
        }
        true
    }

    /// Returns true while process CPU usage is below the ceiling
    pub fn check_cpu(&self) -> bool {
        let used = self.probe.cpu_percent();
        if used >= self.budget.max_cpu_percent {
            tracing::warn!(
                "CPU usage {:.1}% exceeds limit {:.1}%",
                used,
                self.budget.max_cpu_percent
            );
            return false;
        }
        true
    }

    /// Memory and CPU checks together
    pub fn check_resources(&self) -> bool {
        self.check_memory() && self.check_cpu()
    }

    /// Records `n_bytes` in the sliding window and reports whether the window
    /// total stays within the bandwidth ceiling
    ///
    /// The sample is recorded even when the answer is `false`; bytes that
    /// crossed the wire count against the window either way.
    pub fn check_and_reserve_bandwidth(&self, n_bytes: u64) -> bool {
        let now = self.clock.now();
        let mut state = self.state();

        while let Some(&(ts, _)) = state.window.front() {
            if now.saturating_duration_since(ts) > BANDWIDTH_WINDOW {
                state.window.pop_front();
            } else {
                break;
            }
        }

        state.window.push_back((now, n_bytes));
        let total: u64 = state.window.iter().map(|(_, bytes)| bytes).sum();
        total <= self.budget.max_bandwidth_bytes_per_sec
    }

    /// Takes a connection slot if one is free; never blocks
    pub fn acquire_connection(&self) -> bool {
        let mut state = self.state();
        if state.active_connections >= self.budget.max_connections {
            return false;
        }
        state.active_connections += 1;
        true
    }

    /// Returns a connection slot; extra releases are ignored
    pub fn release_connection(&self) {
        let mut state = self.state();
        state.active_connections = state.active_connections.saturating_sub(1);
    }

    /// Takes a connection slot that is returned when the guard is dropped
    pub fn try_connection(&self) -> Option<ConnectionSlot<'_>> {
        // Lazily built: a guard constructed on failure would release a slot it never held
        self.acquire_connection()
            .then(|| ConnectionSlot { limiter: self })
    }

    /// Number of connection slots currently held
    pub fn active_connections(&self) -> usize {
        self.state().active_connections
    }

    /// Bytes recorded in the window as of the last reservation
    pub fn window_bytes(&self) -> u64 {
        self.state().window.iter().map(|(_, bytes)| bytes).sum()
    }
}

/// A held connection slot; releases on drop regardless of how the holder exits
pub struct ConnectionSlot<'a> {
    limiter: &'a ResourceLimiter,
}

impl Drop for ConnectionSlot<'_> {
    fn drop(&mut self) {
        self.limiter.release_connection();
    }
}
