//! Fill primitive

use formfill_core_types::{FillError, FillStep, Scalar};
use page_port::{ElementRef, FieldCategory};
use tracing::{info, warn};

use super::{ensure_interactable, ActionExecutors};
use crate::injector::Injected;
use crate::types::ActionOutcome;

/// Execute fill primitive
///
/// Steps:
/// 1. Check the element is present, connected, visible and enabled (and not
///    read-only for text fields)
/// 2. Pick the injection strategy for the element's field category
/// 3. Write the value (native setter plus `input`/`change` for text fields)
pub async fn execute_fill(
    executors: &ActionExecutors,
    element: Option<&ElementRef>,
    step: &FillStep,
    value: &Scalar,
) -> Result<ActionOutcome, FillError> {
    let page = executors.page();
    let (element, info) = ensure_interactable(page, element).await?;
    let category = info.category();
    if category == FieldCategory::Text && !info.accepts_text() {
        return Err(FillError::ElementNotInteractable);
    }
    let injector = executors
        .injectors()
        .for_category(&category)
        .ok_or_else(|| FillError::UnsupportedFillTarget(category.name().to_string()))?;

    info!(
        step_id = %step.id,
        category = category.name(),
        strategy = injector.name(),
        "filling element"
    );

    match injector.inject(page, &element, step, value).await? {
        Injected::Written => Ok(ActionOutcome::success()),
        Injected::NeedsOperator(reason) => {
            warn!(step_id = %step.id, %reason, "step needs manual completion");
            Ok(ActionOutcome::manual(reason))
        }
    }
}
