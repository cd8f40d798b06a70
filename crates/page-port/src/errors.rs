use formfill_core_types::FillError;
use thiserror::Error;

/// Errors surfaced by page implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The page rejected the locator syntax.
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The element handle no longer points at a connected node.
    #[error("element detached from document")]
    Detached,

    /// Script evaluation failed inside the page.
    #[error("script error: {0}")]
    Script(String),

    /// Transport to the page failed.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl PageError {
    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        PageError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<PageError> for FillError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Detached => FillError::ElementNotInteractable,
            other => FillError::Page(other.to_string()),
        }
    }
}
