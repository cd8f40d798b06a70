//! Error types for the selector engine

use page_port::PageError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// Polling settings cannot produce a lookup schedule
    #[error("Invalid locator policy: {0}")]
    InvalidPolicy(String),

    /// The page stopped answering lookups
    #[error("Page unavailable: {0}")]
    PageUnavailable(PageError),
}
