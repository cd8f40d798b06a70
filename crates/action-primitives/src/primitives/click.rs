//! Click primitive

use formfill_core_types::{FillError, FillStep};
use page_port::ElementRef;
use tracing::info;

use super::{ensure_interactable, ActionExecutors};
use crate::types::ActionOutcome;

/// Check interactability, then dispatch a click.
pub async fn execute_click(
    executors: &ActionExecutors,
    element: Option<&ElementRef>,
    step: &FillStep,
) -> Result<ActionOutcome, FillError> {
    let page = executors.page();
    let (element, info) = ensure_interactable(page, element).await?;
    info!(step_id = %step.id, tag = %info.tag, "clicking element");
    page.click(&element).await?;
    Ok(ActionOutcome::success())
}
