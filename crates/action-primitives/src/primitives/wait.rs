//! Wait primitive

use formfill_core_types::{FillError, FillStep};
use tokio::time::{sleep, Duration};
use tracing::info;

use super::ActionExecutors;
use crate::types::ActionOutcome;

/// Sleep for the step's `waitMs`, or the configured default. Always succeeds.
pub async fn execute_wait(
    executors: &ActionExecutors,
    step: &FillStep,
) -> Result<ActionOutcome, FillError> {
    let delay = step
        .wait_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| executors.default_wait());
    info!(step_id = %step.id, wait_ms = delay.as_millis() as u64, "waiting");
    sleep(delay).await;
    Ok(ActionOutcome::success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formfill_core_types::{Scalar, StepAction};
    use page_port::MemoryPage;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn waits_for_step_delay_or_default() {
        let executors = ActionExecutors::new(Arc::new(MemoryPage::default()));

        let start = Instant::now();
        let outcome = executors
            .execute(StepAction::Wait, None, &FillStep::wait("w1", 1, Some(250)), &Scalar::Null)
            .await;
        assert!(outcome.ok);
        assert!(start.elapsed() >= Duration::from_millis(250));

        let start = Instant::now();
        executors
            .execute(StepAction::Wait, None, &FillStep::wait("w2", 2, None), &Scalar::Null)
            .await;
        assert!(start.elapsed() >= Duration::from_millis(1_000));
    }
}
