use crate::config::ScanConfig;
use crate::limiter::{Clock, ResourceProbe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a scan stopped early
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceLimit {
    Memory { used: u64, limit: u64 },
    Throughput { files_per_second: f64, floor: f64 },
}

/// Memory ceiling and files-per-second floor checked once per directory
///
/// The throughput floor only applies after the grace period, so a scan
/// that has just started is never judged on its first few files.
pub struct PerformanceGuard {
    probe: Arc<dyn ResourceProbe>,
    clock: Arc<dyn Clock>,
    max_memory_bytes: u64,
    min_files_per_second: f64,
    grace: Duration,
    started: Instant,
    files_seen: u64,
}

impl PerformanceGuard {
    pub fn new(scan: &ScanConfig, probe: Arc<dyn ResourceProbe>, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            probe,
            clock,
            max_memory_bytes: scan.max_memory_bytes,
            min_files_per_second: scan.min_files_per_second,
            grace: Duration::from_secs(scan.rate_grace_seconds),
            started,
            files_seen: 0,
        }
    }

    pub fn record_file(&mut self) {
        self.files_seen += 1;
    }

    pub fn files_seen(&self) -> u64 {
        self.files_seen
    }

    /// Restarts the clock and the file count
    pub fn reset(&mut self) {
        self.started = self.clock.now();
        self.files_seen = 0;
    }

    pub fn check(&self) -> Result<(), PerformanceLimit> {
        let used = self.probe.memory_bytes();
        if used > self.max_memory_bytes {
            return Err(PerformanceLimit::Memory {
                used,
                limit: self.max_memory_bytes,
            });
        }

        let elapsed = self.clock.now().saturating_duration_since(self.started);
        if elapsed >= self.grace && !elapsed.is_zero() {
            let rate = self.files_seen as f64 / elapsed.as_secs_f64();
            if rate < self.min_files_per_second {
                return Err(PerformanceLimit::Throughput {
                    files_per_second: rate,
                    floor: self.min_files_per_second,
                });
            }
        }

        Ok(())
    }
}
