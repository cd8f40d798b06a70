use serde::{Deserialize, Serialize};

use crate::model::{MonitorOutcome, StepStatus, SuccessTrigger};
use crate::{MonitorId, RunId, StepId};

/// Push notifications consumed by progress indicators and the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    RunStarted {
        run_id: RunId,
        total: usize,
    },
    StepStarted {
        run_id: RunId,
        index: usize,
        total: usize,
        step_id: StepId,
    },
    StepFinished {
        run_id: RunId,
        index: usize,
        total: usize,
        step_id: StepId,
        status: StepStatus,
    },
    RunFinished {
        run_id: RunId,
        success: bool,
        attempted: usize,
    },
    MonitorStarted {
        monitor_id: MonitorId,
        trigger: SuccessTrigger,
    },
    MonitorFinished {
        monitor_id: MonitorId,
        outcome: MonitorOutcome,
    },
}
