//! Stage-weighted progress reporting

use std::fmt;
use std::sync::Arc;

/// Receives the cumulative percentage, 0 to 100
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Weighted steps of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStep {
    Setup,
    PageFetch,
    Resources,
    StylesAndScripts,
    StructureScan,
    FileContents,
    Write,
    Finish,
}

/// Ordered `(step, weight)` entries with a completion fraction per step
///
/// The reported total never decreases and never exceeds 100.
pub struct ProgressPlan {
    steps: Vec<(ProgressStep, f64, f64)>,
    reported: f64,
    callback: Option<ProgressCallback>,
}

impl fmt::Debug for ProgressPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressPlan")
            .field("steps", &self.steps)
            .field("reported", &self.reported)
            .finish()
    }
}

impl ProgressPlan {
    fn new(weights: &[(ProgressStep, f64)], callback: Option<ProgressCallback>) -> Self {
        Self {
            steps: weights.iter().map(|&(step, weight)| (step, weight, 0.0)).collect(),
            reported: 0.0,
            callback,
        }
    }

    /// 5 setup, 10 page fetch, 40 resources, 40 styles and scripts, 5 write
    pub fn site(callback: Option<ProgressCallback>) -> Self {
        Self::new(
            &[
                (ProgressStep::Setup, 5.0),
                (ProgressStep::PageFetch, 10.0),
                (ProgressStep::Resources, 40.0),
                (ProgressStep::StylesAndScripts, 40.0),
                (ProgressStep::Write, 5.0),
            ],
            callback,
        )
    }

    /// 5 setup, 15 structure scan, 60 file contents, 15 write, 5 finish
    pub fn system(callback: Option<ProgressCallback>) -> Self {
        Self::new(
            &[
                (ProgressStep::Setup, 5.0),
                (ProgressStep::StructureScan, 15.0),
                (ProgressStep::FileContents, 60.0),
                (ProgressStep::Write, 15.0),
                (ProgressStep::Finish, 5.0),
            ],
            callback,
        )
    }

    /// Current cumulative percentage
    pub fn percent(&self) -> f64 {
        self.reported
    }

    /// Raises the completion fraction of `step` to `fraction`
    ///
    /// Lower values than already recorded are ignored.
    pub fn set_fraction(&mut self, step: ProgressStep, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        if let Some(entry) = self.steps.iter_mut().find(|(s, _, _)| *s == step) {
            if fraction > entry.2 {
                entry.2 = fraction;
            }
        }

        let total: f64 = self
            .steps
            .iter()
            .map(|(_, weight, done)| weight * done)
            .sum::<f64>()
            .min(100.0);
        if total > self.reported {
            self.reported = total;
            if let Some(callback) = &self.callback {
                callback(total);
            }
        }
    }

    /// Credits `done` of `total` tasks of `step`; a step with no tasks is
    /// credited in full
    pub fn tasks_done(&mut self, step: ProgressStep, done: usize, total: usize) {
        if total == 0 {
            self.complete(step);
        } else {
            self.set_fraction(step, done as f64 / total as f64);
        }
    }

    pub fn complete(&mut self, step: ProgressStep) {
        self.set_fraction(step, 1.0);
    }
}
