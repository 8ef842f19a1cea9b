//! State module for tracking archive runs
//!
//! # Components
//!
//! - `RunStage`: the stages of a run (init, structure collection, resource acquisition, ...)
//! - `RunTracker`: the per-run state machine enforcing stage order

mod run_stage;

pub use run_stage::{RunStage, RunTracker};
