use thiserror::Error;

/// Failure taxonomy shared by the engine components.
///
/// None of these cross the step executor boundary as errors: they are rendered
/// into `StepResult::reason` or a failed `MonitorOutcome`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FillError {
    #[error("element not found")]
    ElementNotFound,

    #[error("element not interactable")]
    ElementNotInteractable,

    /// Element category no injection strategy can write to.
    #[error("unsupported fill target: {0}")]
    UnsupportedFillTarget(String),

    #[error("invalid step value: {0}")]
    InvalidStepValue(String),

    #[error("timeout after {0}ms")]
    MonitorTimeout(u64),

    #[error("monitor misconfigured: {0}")]
    MonitorMisconfigured(String),

    #[error("page error: {0}")]
    Page(String),
}

impl FillError {
    /// Stable machine-readable tag used on the message bridge.
    pub fn kind(&self) -> &'static str {
        match self {
            FillError::ElementNotFound => "element_not_found",
            FillError::ElementNotInteractable => "element_not_interactable",
            FillError::UnsupportedFillTarget(_) => "unsupported_fill_target",
            FillError::InvalidStepValue(_) => "invalid_step_value",
            FillError::MonitorTimeout(_) => "monitor_timeout",
            FillError::MonitorMisconfigured(_) => "monitor_misconfigured",
            FillError::Page(_) => "page_error",
        }
    }
}
