//! Step orchestration
//!
//! Walks a mapping's steps in ascending `stepOrder`, resolving elements through
//! the selector engine and delegating to the action executors. Optional steps
//! that fail are recorded and skipped past; a failing required step aborts the
//! run.

pub mod executor;
pub mod types;

pub use executor::StepExecutor;
pub use types::{FailureStrategy, FlowPolicy, RunReport, RunState};
