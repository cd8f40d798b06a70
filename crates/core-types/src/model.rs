//! Step, row and result types exchanged with the mapping layer.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::FillError;
use crate::StepId;

/// Default success-monitor timeout when the mapping does not set one.
pub const DEFAULT_MONITOR_TIMEOUT_MS: u64 = 30_000;

/// Locator language of a selector entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Css,
    Xpath,
}

impl SelectorKind {
    pub fn name(&self) -> &'static str {
        match self {
            SelectorKind::Css => "css",
            SelectorKind::Xpath => "xpath",
        }
    }
}

/// One way of locating an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectorEntry {
    pub kind: SelectorKind,
    pub value: String,
}

impl SelectorEntry {
    pub fn css(value: impl Into<String>) -> Self {
        Self {
            kind: SelectorKind::Css,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self {
            kind: SelectorKind::Xpath,
            value: value.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl fmt::Display for SelectorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.name(), self.value)
    }
}

/// Closed set of step actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Fill,
    Click,
    Wait,
}

impl StepAction {
    pub fn name(&self) -> &'static str {
        match self {
            StepAction::Fill => "fill",
            StepAction::Click => "click",
            StepAction::Wait => "wait",
        }
    }

    /// Whether the action operates on a page element.
    pub fn targets_element(&self) -> bool {
        !matches!(self, StepAction::Wait)
    }
}

/// A single page interaction in a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillStep {
    pub id: StepId,
    pub action: StepAction,
    pub primary: SelectorEntry,
    #[serde(default)]
    pub fallbacks: Vec<SelectorEntry>,
    #[serde(default)]
    pub source_field_key: Option<String>,
    #[serde(default)]
    pub fixed_value: Option<String>,
    pub step_order: i64,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub clear_before_fill: bool,
    #[serde(default)]
    pub press_enter_after: bool,
    #[serde(default)]
    pub wait_ms: Option<u64>,
}

impl FillStep {
    pub fn new(
        id: impl Into<String>,
        action: StepAction,
        step_order: i64,
        primary: SelectorEntry,
    ) -> Self {
        Self {
            id: StepId::new(id),
            action,
            primary,
            fallbacks: Vec::new(),
            source_field_key: None,
            fixed_value: None,
            step_order,
            optional: false,
            clear_before_fill: false,
            press_enter_after: false,
            wait_ms: None,
        }
    }

    pub fn fill(id: impl Into<String>, step_order: i64, primary: SelectorEntry) -> Self {
        Self::new(id, StepAction::Fill, step_order, primary)
    }

    pub fn click(id: impl Into<String>, step_order: i64, primary: SelectorEntry) -> Self {
        Self::new(id, StepAction::Click, step_order, primary)
    }

    pub fn wait(id: impl Into<String>, step_order: i64, wait_ms: Option<u64>) -> Self {
        let mut step = Self::new(id, StepAction::Wait, step_order, SelectorEntry::css(""));
        step.wait_ms = wait_ms;
        step
    }

    pub fn with_field(mut self, key: impl Into<String>) -> Self {
        self.source_field_key = Some(key.into());
        self
    }

    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed_value = Some(value.into());
        self
    }

    pub fn with_fallback(mut self, entry: SelectorEntry) -> Self {
        self.fallbacks.push(entry);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn clear_first(mut self) -> Self {
        self.clear_before_fill = true;
        self
    }

    pub fn press_enter(mut self) -> Self {
        self.press_enter_after = true;
        self
    }

    /// Primary locator followed by the fallbacks, in resolution order.
    pub fn selector_chain(&self) -> Vec<SelectorEntry> {
        std::iter::once(self.primary.clone())
            .chain(self.fallbacks.iter().cloned())
            .collect()
    }

    /// Value this step writes for the given row.
    ///
    /// A fixed value wins; otherwise the bound field is looked up and a missing
    /// key reads as null. A step with neither source fills an empty value.
    pub fn resolve_value(&self, row: &RowData) -> Scalar {
        if let Some(fixed) = &self.fixed_value {
            return Scalar::String(fixed.clone());
        }
        match &self.source_field_key {
            Some(key) => row.get(key).cloned().unwrap_or(Scalar::Null),
            None => Scalar::Null,
        }
    }
}

/// Scalar cell value of a data row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Text form written into form controls. Null renders as the empty string.
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(flag) => flag.to_string(),
            Scalar::Number(number) => number.to_string(),
            Scalar::String(text) => text.clone(),
        }
    }

    /// Parse a raw spreadsheet cell: empty → null, `true`/`false` → bool,
    /// numeric → number, anything else stays text.
    ///
    /// A cell only becomes a number when it renders back to the same text, so
    /// phone numbers, prices and long ids are typed into the page unchanged.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Scalar::Null;
        }
        match trimmed {
            "true" | "TRUE" | "True" => return Scalar::Bool(true),
            "false" | "FALSE" | "False" => return Scalar::Bool(false),
            _ => {}
        }
        let number = trimmed
            .parse::<i64>()
            .ok()
            .map(serde_json::Number::from)
            .or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
            });
        match number {
            Some(number) if number.to_string() == trimmed => Scalar::Number(number),
            _ => Scalar::String(raw.to_string()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value.into())
    }
}

/// Ordered field-key → value mapping for one spreadsheet row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowData(IndexMap<String, Scalar>);

impl RowData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Scalar)> for RowData {
    fn from_iter<T: IntoIterator<Item = (String, Scalar)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome category of one attempted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Skipped,
    Failed,
    /// The step needs a human operator (file uploads).
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: StepId,
    pub status: StepStatus,
    pub reason: Option<String>,
    pub elapsed_ms: u64,
}

impl StepResult {
    pub fn new(step_id: StepId, status: StepStatus, reason: Option<String>, elapsed_ms: u64) -> Self {
        Self {
            step_id,
            status,
            reason,
            elapsed_ms,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Aggregate result of replaying a step list against one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRunResult {
    pub success: bool,
    pub results: Vec<StepResult>,
}

/// Page signal that marks a submission as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessTrigger {
    UrlChange,
    TextAppears,
    ElementDisappears,
}

impl SuccessTrigger {
    pub fn name(&self) -> &'static str {
        match self {
            SuccessTrigger::UrlChange => "url_change",
            SuccessTrigger::TextAppears => "text_appears",
            SuccessTrigger::ElementDisappears => "element_disappears",
        }
    }
}

fn default_monitor_timeout() -> u64 {
    DEFAULT_MONITOR_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessConfig {
    pub trigger: SuccessTrigger,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default = "default_monitor_timeout")]
    pub timeout_ms: u64,
}

impl SuccessConfig {
    pub fn new(trigger: SuccessTrigger) -> Self {
        Self {
            trigger,
            selector: None,
            pattern: None,
            timeout_ms: DEFAULT_MONITOR_TIMEOUT_MS,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Text the `text_appears` trigger searches for: the pattern, else the selector.
    pub fn text_needle(&self) -> Option<&str> {
        non_blank(self.pattern.as_deref()).or_else(|| non_blank(self.selector.as_deref()))
    }

    /// Check that the fields required by the trigger are present.
    pub fn validate(&self) -> Result<(), FillError> {
        match self.trigger {
            SuccessTrigger::UrlChange => Ok(()),
            SuccessTrigger::TextAppears => self.text_needle().map(|_| ()).ok_or_else(|| {
                FillError::MonitorMisconfigured("text_appears requires a pattern or selector".into())
            }),
            SuccessTrigger::ElementDisappears => non_blank(self.selector.as_deref())
                .map(|_| ())
                .ok_or_else(|| {
                    FillError::MonitorMisconfigured(
                        "element_disappears requires a selector".into(),
                    )
                }),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Single result delivered by a success monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorOutcome {
    pub succeeded: bool,
    pub reason: String,
}

impl MonitorOutcome {
    pub fn success(reason: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            reason: reason.into(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            reason: reason.into(),
        }
    }
}

impl From<FillError> for MonitorOutcome {
    fn from(err: FillError) -> Self {
        MonitorOutcome::failure(err.to_string())
    }
}
