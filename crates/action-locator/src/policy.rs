//! Polling budget for selector resolution

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::LocatorError;

/// How the polling window is shared across a selector chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// Every entry gets its own full window.
    #[default]
    PerEntry,
    /// One window for the whole chain; entries are polled in rounds and every
    /// entry gets at least one lookup.
    WholeChain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorPolicy {
    pub window_ms: u64,
    pub poll_interval_ms: u64,
    pub budget: BudgetMode,
}

impl Default for LocatorPolicy {
    fn default() -> Self {
        Self {
            window_ms: 1_500,
            poll_interval_ms: 100,
            budget: BudgetMode::PerEntry,
        }
    }
}

impl LocatorPolicy {
    pub fn with_window(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    pub fn with_budget(mut self, budget: BudgetMode) -> Self {
        self.budget = budget;
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.poll_interval_ms == 0 {
            return Err(LocatorError::InvalidPolicy(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_partial_yaml_like_input() {
        let policy: LocatorPolicy =
            serde_json::from_value(serde_json::json!({ "budget": "whole_chain" })).unwrap();
        assert_eq!(policy.window_ms, 1_500);
        assert_eq!(policy.poll_interval_ms, 100);
        assert_eq!(policy.budget, BudgetMode::WholeChain);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let policy = LocatorPolicy {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(LocatorError::InvalidPolicy(_))
        ));
    }
}
