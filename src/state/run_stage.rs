/// Run stage definitions for tracking archive progress
///
/// This module defines every stage an archive run passes through and the
/// transitions allowed between them.
use std::fmt;

/// Represents the current stage of an archive run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    // ===== Active Stages =====
    /// Configuration loaded, nothing fetched or scanned yet
    Init,

    /// Fetching the main page, or building the directory structure tree
    StructureCollection,

    /// Fetching resources or reading files, with classification
    ResourceAcquisition,

    /// Merging processed items into the in-memory document
    DocumentAssembly,

    /// Writing the document to disk
    Persistence,

    // ===== Terminal Stages =====
    /// The document was written
    Done,

    /// The run hit an unrecoverable error
    Aborted,
}

impl RunStage {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// The stage that follows this one on the success path
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::StructureCollection),
            Self::StructureCollection => Some(Self::ResourceAcquisition),
            Self::ResourceAcquisition => Some(Self::DocumentAssembly),
            Self::DocumentAssembly => Some(Self::Persistence),
            Self::Persistence => Some(Self::Done),
            Self::Done | Self::Aborted => None,
        }
    }

    /// Whether a run may move from this stage to `to`
    ///
    /// Runs advance one stage at a time; any active stage may abort.
    pub fn can_transition_to(&self, to: RunStage) -> bool {
        if to == Self::Aborted {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::StructureCollection => "structure-collection",
            Self::ResourceAcquisition => "resource-acquisition",
            Self::DocumentAssembly => "document-assembly",
            Self::Persistence => "persistence",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the stage of one run and rejects out-of-order transitions
#[derive(Debug)]
pub struct RunTracker {
    stage: RunStage,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            stage: RunStage::Init,
        }
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    /// Moves to the next stage on the success path
    pub fn advance(&mut self) -> crate::Result<RunStage> {
        let next = self.stage.next().ok_or(crate::SnapshotError::InvalidTransition {
            from: self.stage,
            to: RunStage::Done,
        })?;
        self.transition(next)
    }

    /// Moves to `to`, failing if the transition is not allowed
    pub fn transition(&mut self, to: RunStage) -> crate::Result<RunStage> {
        if !self.stage.can_transition_to(to) {
            return Err(crate::SnapshotError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        tracing::info!("Run stage: {} -> {}", self.stage, to);
        self.stage = to;
        Ok(to)
    }

    /// Marks the run aborted; no-op when already terminal
    pub fn abort(&mut self) {
        if !self.stage.is_terminal() {
            tracing::error!("Run aborted during {}", self.stage);
            self.stage = RunStage::Aborted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path() {
        let mut tracker = RunTracker::new();
        let mut seen = vec![tracker.stage()];
        while !tracker.stage().is_terminal() {
            seen.push(tracker.advance().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                RunStage::Init,
                RunStage::StructureCollection,
                RunStage::ResourceAcquisition,
                RunStage::DocumentAssembly,
                RunStage::Persistence,
                RunStage::Done,
            ]
        );
        assert!(tracker.advance().is_err());
    }

    #[test]
    fn test_no_skipping_stages() {
        let mut tracker = RunTracker::new();
        assert!(tracker.transition(RunStage::Persistence).is_err());
        assert_eq!(tracker.stage(), RunStage::Init);
    }

    #[test]
    fn test_abort_from_any_active_stage() {
        for stage in [
            RunStage::Init,
            RunStage::StructureCollection,
            RunStage::ResourceAcquisition,
            RunStage::DocumentAssembly,
            RunStage::Persistence,
        ] {
            assert!(stage.can_transition_to(RunStage::Aborted));
        }
        assert!(!RunStage::Done.can_transition_to(RunStage::Aborted));
        assert!(!RunStage::Aborted.can_transition_to(RunStage::Aborted));
    }

    #[test]
    fn test_abort_is_sticky() {
        let mut tracker = RunTracker::new();
        tracker.advance().unwrap();
        tracker.abort();
        assert_eq!(tracker.stage(), RunStage::Aborted);
        assert!(tracker.advance().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            RunStage::ResourceAcquisition.to_string(),
            "resource-acquisition"
        );
    }
}
