//! Outcome type shared by the executors

use formfill_core_types::FillError;
use serde::{Deserialize, Serialize};

/// Result of executing one action.
///
/// `manual` marks a step that needs a human operator; it is not a failure even
/// though nothing was written (`ok == false`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub ok: bool,
    pub reason: Option<String>,
    pub manual: bool,
}

impl ActionOutcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            reason: None,
            manual: false,
        }
    }

    pub fn manual(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            manual: true,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            manual: false,
        }
    }
}

impl From<FillError> for ActionOutcome {
    fn from(err: FillError) -> Self {
        ActionOutcome::failure(err.to_string())
    }
}
