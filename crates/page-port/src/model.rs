//! Element handles and descriptions returned by page implementations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to an element in the page.
///
/// Handles are only meaningful for the lookup that produced them; the engine
/// re-resolves every step instead of caching them.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub String);

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the properties the action executors care about.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Lower-case tag name.
    pub tag: String,
    /// Lower-case `type` attribute for inputs.
    pub input_type: Option<String>,
    pub visible: bool,
    pub disabled: bool,
    pub readonly: bool,
}

impl ElementInfo {
    pub fn is_interactable(&self) -> bool {
        self.visible && !self.disabled
    }

    /// Whether typed text can land in the element. `readonly` only applies to
    /// text-like fields.
    pub fn accepts_text(&self) -> bool {
        self.is_interactable() && !self.readonly
    }

    /// Value injection category of the element.
    pub fn category(&self) -> FieldCategory {
        match self.tag.as_str() {
            "textarea" => FieldCategory::Text,
            "select" => FieldCategory::Select,
            "input" => match self.input_type.as_deref().unwrap_or("text") {
                "checkbox" | "radio" => FieldCategory::Toggle,
                "file" => FieldCategory::File,
                "text" | "email" | "password" | "number" | "tel" | "url" | "search" | "date"
                | "datetime-local" | "month" | "week" | "time" | "color" | "range" => {
                    FieldCategory::Text
                }
                other => FieldCategory::Other(format!("input[type={}]", other)),
            },
            other => FieldCategory::Other(other.to_string()),
        }
    }
}

/// Families of form controls that need distinct value injection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldCategory {
    Text,
    Toggle,
    Select,
    File,
    Other(String),
}

impl FieldCategory {
    pub fn name(&self) -> &str {
        match self {
            FieldCategory::Text => "text",
            FieldCategory::Toggle => "toggle",
            FieldCategory::Select => "select",
            FieldCategory::File => "file",
            FieldCategory::Other(tag) => tag,
        }
    }
}

/// How a dropdown option was matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionMatchKind {
    Value,
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionMatch {
    pub value: String,
    pub text: String,
    pub matched_by: OptionMatchKind,
}

/// Notification that the document changed (subtree or character data).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutationEvent {
    pub seq: u64,
}
