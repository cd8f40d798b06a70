//! Flow types

use formfill_core_types::{FillRunResult, FillStep, RunId};
use serde::{Deserialize, Serialize};

/// Timing knobs of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowPolicy {
    /// Pause between consecutive steps so the page can react.
    pub settle_ms: u64,
    /// Delay of a wait step without `waitMs`.
    pub default_wait_ms: u64,
}

impl Default for FlowPolicy {
    fn default() -> Self {
        Self {
            settle_ms: 50,
            default_wait_ms: action_primitives::DEFAULT_WAIT_MS,
        }
    }
}

/// What happens after a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    /// Stop the flow on failure
    Abort,
    /// Record the failure and continue
    Continue,
}

impl FailureStrategy {
    pub fn for_step(step: &FillStep) -> Self {
        if step.optional {
            FailureStrategy::Continue
        } else {
            FailureStrategy::Abort
        }
    }
}

/// Run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running(usize),
    Completed,
    Aborted,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Aborted | RunState::Cancelled
        )
    }
}

/// Result of one run plus how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub state: RunState,
    pub result: FillRunResult,
}
