use std::fmt;

use page_port::PageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High-level error categories surfaced by the adapter.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("browser launch failed")]
    LaunchFailed,
    #[error("navigation timed out")]
    NavTimeout,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("script evaluation failed")]
    ScriptFailed,
    #[error("internal error")]
    Internal,
}

/// Error with an optional operator hint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }
}

impl From<chromiumoxide::error::CdpError> for AdapterError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(err.to_string())
            .retriable(true)
    }
}

/// Script failures stay script failures; anything else means the tab is unusable.
impl From<AdapterError> for PageError {
    fn from(err: AdapterError) -> Self {
        match err.kind {
            AdapterErrorKind::ScriptFailed => PageError::Script(err.to_string()),
            _ => PageError::Protocol(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hint() {
        let err = AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint("no chrome");
        assert_eq!(err.to_string(), "browser launch failed: no chrome");
        assert!(!err.retriable);
    }

    #[test]
    fn maps_onto_page_errors() {
        let script: PageError = AdapterError::new(AdapterErrorKind::ScriptFailed)
            .with_hint("ReferenceError")
            .into();
        assert!(matches!(script, PageError::Script(msg) if msg.contains("ReferenceError")));

        let io: PageError = AdapterError::new(AdapterErrorKind::CdpIo).into();
        assert!(matches!(io, PageError::Protocol(_)));
    }
}
