//! Step executor implementation

use std::sync::Arc;
use std::time::Duration;

use action_locator::{LocatorPolicy, Resolution, SelectorEngine};
use action_primitives::{ActionExecutors, InjectorSet};
use formfill_core_types::{
    EngineEvent, FillError, FillRunResult, FillStep, RowData, RunId, StepResult, StepStatus,
};
use formfill_event_bus::EventBus;
use page_port::PageDom;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::{FailureStrategy, FlowPolicy, RunReport, RunState};

const CANCELLED_REASON: &str = "run cancelled";

/// Replays step lists against one page.
///
/// Runs are sequential and never reentrant; element handles are re-resolved for
/// every step.
pub struct StepExecutor {
    locator: SelectorEngine,
    actions: ActionExecutors,
    policy: FlowPolicy,
    bus: Option<Arc<dyn EventBus<EngineEvent>>>,
}

struct StepAttempt {
    status: StepStatus,
    reason: Option<String>,
}

impl StepAttempt {
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            reason: Some(reason.into()),
        }
    }

    fn cancelled() -> Self {
        Self {
            status: StepStatus::Skipped,
            reason: Some(CANCELLED_REASON.to_string()),
        }
    }
}

impl StepExecutor {
    pub fn new(page: Arc<dyn PageDom>) -> Self {
        let policy = FlowPolicy::default();
        Self {
            locator: SelectorEngine::new(page.clone()),
            actions: ActionExecutors::new(page)
                .with_default_wait(Duration::from_millis(policy.default_wait_ms)),
            policy,
            bus: None,
        }
    }

    pub fn with_locator_policy(mut self, policy: LocatorPolicy) -> Self {
        self.locator = self.locator.with_policy(policy);
        self
    }

    pub fn with_flow_policy(mut self, policy: FlowPolicy) -> Self {
        self.actions = self
            .actions
            .with_default_wait(Duration::from_millis(policy.default_wait_ms));
        self.policy = policy;
        self
    }

    pub fn with_injectors(mut self, injectors: InjectorSet) -> Self {
        self.actions = self.actions.with_injectors(injectors);
        self
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBus<EngineEvent>>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Run `steps` for `row` to completion.
    pub async fn run(&self, steps: &[FillStep], row: &RowData) -> FillRunResult {
        self.run_with_cancel(steps, row, &CancellationToken::new())
            .await
            .result
    }

    /// Run `steps` for `row`, stopping when `cancel` fires.
    ///
    /// The token is checked before each step and interrupts element lookup,
    /// the action itself and settle delays. Steps that did not run are recorded
    /// as `skipped`.
    pub async fn run_with_cancel(
        &self,
        steps: &[FillStep],
        row: &RowData,
        cancel: &CancellationToken,
    ) -> RunReport {
        let run_id = RunId::new();
        let ordered = order_steps(steps);
        let total = ordered.len();
        let mut results: Vec<StepResult> = Vec::with_capacity(total);
        let mut state = RunState::Idle;
        let mut required_failed = false;

        info!(run_id = %run_id, total, "starting fill run");
        self.emit(EngineEvent::RunStarted {
            run_id: run_id.clone(),
            total,
        })
        .await;

        for (index, step) in ordered.iter().enumerate() {
            if index > 0 && !self.settle(cancel).await {
                state = RunState::Cancelled;
            }
            if cancel.is_cancelled() {
                state = RunState::Cancelled;
            }
            if state == RunState::Cancelled {
                for skipped in &ordered[index..] {
                    results.push(StepResult::new(
                        skipped.id.clone(),
                        StepStatus::Skipped,
                        Some(CANCELLED_REASON.to_string()),
                        0,
                    ));
                }
                break;
            }

            state = RunState::Running(index);
            self.emit(EngineEvent::StepStarted {
                run_id: run_id.clone(),
                index,
                total,
                step_id: step.id.clone(),
            })
            .await;

            let started = Instant::now();
            let attempt = self.execute_step(step, row, cancel).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match attempt.status {
                StepStatus::Failed => warn!(
                    step_id = %step.id,
                    index,
                    optional = step.optional,
                    reason = attempt.reason.as_deref().unwrap_or_default(),
                    "step failed"
                ),
                status => debug!(step_id = %step.id, index, ?status, elapsed_ms, "step finished"),
            }

            let status = attempt.status;
            results.push(StepResult::new(
                step.id.clone(),
                status,
                attempt.reason,
                elapsed_ms,
            ));
            self.emit(EngineEvent::StepFinished {
                run_id: run_id.clone(),
                index,
                total,
                step_id: step.id.clone(),
                status,
            })
            .await;

            if status == StepStatus::Skipped && cancel.is_cancelled() {
                // Interrupted mid-step; the rest is skipped too.
                for skipped in &ordered[index + 1..] {
                    results.push(StepResult::new(
                        skipped.id.clone(),
                        StepStatus::Skipped,
                        Some(CANCELLED_REASON.to_string()),
                        0,
                    ));
                }
                state = RunState::Cancelled;
                break;
            }

            if status == StepStatus::Failed && FailureStrategy::for_step(step) == FailureStrategy::Abort
            {
                required_failed = true;
                info!(step_id = %step.id, index, "required step failed, aborting run");
                state = RunState::Aborted;
                break;
            }
        }

        if !state.is_terminal() {
            state = RunState::Completed;
        }

        let success = !required_failed && state != RunState::Cancelled;

        info!(run_id = %run_id, ?state, success, attempted = results.len(), "fill run finished");
        self.emit(EngineEvent::RunFinished {
            run_id: run_id.clone(),
            success,
            attempted: results.len(),
        })
        .await;

        RunReport {
            run_id,
            state,
            result: FillRunResult { success, results },
        }
    }

    async fn execute_step(
        &self,
        step: &FillStep,
        row: &RowData,
        cancel: &CancellationToken,
    ) -> StepAttempt {
        let value = step.resolve_value(row);

        let element = if step.action.targets_element() {
            let chain = step.selector_chain();
            let resolved = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StepAttempt::cancelled(),
                resolved = self.locator.resolve(&chain) => resolved,
            };
            match resolved {
                Ok(Resolution::Found(found)) => Some(found.element),
                Ok(Resolution::NotFound) => {
                    return StepAttempt::failed(FillError::ElementNotFound.to_string())
                }
                Err(err) => return StepAttempt::failed(err.to_string()),
            }
        } else {
            None
        };

        let action = self
            .actions
            .execute(step.action, element.as_ref(), step, &value);
        // Nothing is written to the page once the token has fired.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StepAttempt::cancelled(),
            outcome = action => outcome,
        };

        if outcome.ok {
            StepAttempt {
                status: StepStatus::Success,
                reason: None,
            }
        } else if outcome.manual {
            StepAttempt {
                status: StepStatus::Manual,
                reason: outcome.reason,
            }
        } else {
            StepAttempt::failed(
                outcome
                    .reason
                    .unwrap_or_else(|| "action failed".to_string()),
            )
        }
    }

    /// Inter-step delay. Returns `false` when cancelled meanwhile.
    async fn settle(&self, cancel: &CancellationToken) -> bool {
        if self.policy.settle_ms == 0 {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = sleep(Duration::from_millis(self.policy.settle_ms)) => true,
        }
    }

    async fn emit(&self, event: EngineEvent) {
        if let Some(bus) = &self.bus {
            // Nobody listening is fine.
            let _ = bus.publish(event).await;
        }
    }
}

/// Stable sort by `stepOrder`; duplicates keep their input order.
fn order_steps(steps: &[FillStep]) -> Vec<&FillStep> {
    let mut ordered: Vec<&FillStep> = steps.iter().collect();
    ordered.sort_by_key(|step| step.step_order);
    for pair in ordered.windows(2) {
        if pair[0].step_order == pair[1].step_order {
            warn!(
                step_order = pair[0].step_order,
                first = %pair[0].id,
                second = %pair[1].id,
                "duplicate step order"
            );
        }
    }
    ordered
}
