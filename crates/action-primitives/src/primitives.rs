//! Action executors
//!
//! Three step actions, dispatched by exhaustive match:
//! 1. fill - inject a value through the category's [`ValueInjector`]
//! 2. click - dispatch a click on an interactable element
//! 3. wait - fixed delay

mod click;
mod fill;
mod wait;

pub use click::*;
pub use fill::*;
pub use wait::*;

use std::sync::Arc;
use std::time::Duration;

use formfill_core_types::{FillError, FillStep, Scalar, StepAction};
use page_port::{ElementInfo, ElementRef, PageDom, PageError};

use crate::injector::InjectorSet;
use crate::types::ActionOutcome;

/// Default delay of a wait step without `waitMs`.
pub const DEFAULT_WAIT_MS: u64 = 1_000;

/// Executes step actions against one page.
pub struct ActionExecutors {
    page: Arc<dyn PageDom>,
    injectors: InjectorSet,
    default_wait: Duration,
}

impl ActionExecutors {
    pub fn new(page: Arc<dyn PageDom>) -> Self {
        Self {
            page,
            injectors: InjectorSet::default(),
            default_wait: Duration::from_millis(DEFAULT_WAIT_MS),
        }
    }

    pub fn with_injectors(mut self, injectors: InjectorSet) -> Self {
        self.injectors = injectors;
        self
    }

    pub fn with_default_wait(mut self, default_wait: Duration) -> Self {
        self.default_wait = default_wait;
        self
    }

    pub fn page(&self) -> &dyn PageDom {
        self.page.as_ref()
    }

    pub fn injectors(&self) -> &InjectorSet {
        &self.injectors
    }

    pub fn default_wait(&self) -> Duration {
        self.default_wait
    }

    /// Perform `action` for `step`. Never fails; errors become failed outcomes.
    pub async fn execute(
        &self,
        action: StepAction,
        element: Option<&ElementRef>,
        step: &FillStep,
        value: &Scalar,
    ) -> ActionOutcome {
        let result = match action {
            StepAction::Fill => execute_fill(self, element, step, value).await,
            StepAction::Click => execute_click(self, element, step).await,
            StepAction::Wait => execute_wait(self, step).await,
        };
        result.unwrap_or_else(ActionOutcome::from)
    }
}

/// Missing, detached, hidden or disabled elements are not interactable.
pub(crate) async fn ensure_interactable(
    page: &dyn PageDom,
    element: Option<&ElementRef>,
) -> Result<(ElementRef, ElementInfo), FillError> {
    let element = element.ok_or(FillError::ElementNotInteractable)?;
    let info = match page.describe(element).await {
        Ok(Some(info)) => info,
        Ok(None) | Err(PageError::Detached) => return Err(FillError::ElementNotInteractable),
        Err(err) => return Err(err.into()),
    };
    if !info.is_interactable() {
        return Err(FillError::ElementNotInteractable);
    }
    Ok((element.clone(), info))
}
