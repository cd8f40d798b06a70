//! Value injection strategies, one per field category.

use async_trait::async_trait;
use formfill_core_types::{FillError, FillStep, Scalar};
use page_port::{ElementRef, FieldCategory, PageDom};
use tracing::debug;

/// Values that check a checkbox or radio, compared trimmed and lower-cased.
pub const TRUTHY_VALUES: [&str; 4] = ["yes", "true", "1", "sim"];

pub fn is_truthy(value: &Scalar) -> bool {
    let text = value.as_text().trim().to_lowercase();
    TRUTHY_VALUES.contains(&text.as_str())
}

/// What an injector did with the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injected {
    Written,
    /// The element cannot be populated programmatically.
    NeedsOperator(String),
}

/// Writes a step value into an element of one field category.
#[async_trait]
pub trait ValueInjector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn inject(
        &self,
        page: &dyn PageDom,
        element: &ElementRef,
        step: &FillStep,
        value: &Scalar,
    ) -> Result<Injected, FillError>;
}

/// Text inputs and textareas.
pub struct TextInjector;

#[async_trait]
impl ValueInjector for TextInjector {
    fn name(&self) -> &'static str {
        "text"
    }

    async fn inject(
        &self,
        page: &dyn PageDom,
        element: &ElementRef,
        step: &FillStep,
        value: &Scalar,
    ) -> Result<Injected, FillError> {
        if step.clear_before_fill {
            page.clear_value(element).await?;
        }
        page.inject_value(element, &value.as_text()).await?;
        if step.press_enter_after {
            debug!(step_id = %step.id, "pressing Enter after fill");
            page.press_enter(element).await?;
        }
        Ok(Injected::Written)
    }
}

/// Checkboxes and radios.
pub struct ToggleInjector;

#[async_trait]
impl ValueInjector for ToggleInjector {
    fn name(&self) -> &'static str {
        "toggle"
    }

    async fn inject(
        &self,
        page: &dyn PageDom,
        element: &ElementRef,
        _step: &FillStep,
        value: &Scalar,
    ) -> Result<Injected, FillError> {
        page.set_checked(element, is_truthy(value)).await?;
        Ok(Injected::Written)
    }
}

/// Dropdowns: option value first, then visible text.
pub struct SelectInjector;

#[async_trait]
impl ValueInjector for SelectInjector {
    fn name(&self) -> &'static str {
        "select"
    }

    async fn inject(
        &self,
        page: &dyn PageDom,
        element: &ElementRef,
        _step: &FillStep,
        value: &Scalar,
    ) -> Result<Injected, FillError> {
        let needle = value.as_text();
        match page.select_option(element, &needle).await? {
            Some(hit) => {
                debug!(value = %hit.value, matched_by = ?hit.matched_by, "option selected");
                Ok(Injected::Written)
            }
            None => Err(FillError::InvalidStepValue(format!(
                "no option matching '{}'",
                needle
            ))),
        }
    }
}

/// File inputs are handed to a human operator.
pub struct FileInjector;

#[async_trait]
impl ValueInjector for FileInjector {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn inject(
        &self,
        _page: &dyn PageDom,
        _element: &ElementRef,
        _step: &FillStep,
        _value: &Scalar,
    ) -> Result<Injected, FillError> {
        Ok(Injected::NeedsOperator(
            "file input requires manual upload".to_string(),
        ))
    }
}

/// Strategy table keyed by field category.
pub struct InjectorSet {
    text: Box<dyn ValueInjector>,
    toggle: Box<dyn ValueInjector>,
    select: Box<dyn ValueInjector>,
    file: Box<dyn ValueInjector>,
}

impl Default for InjectorSet {
    fn default() -> Self {
        Self {
            text: Box::new(TextInjector),
            toggle: Box::new(ToggleInjector),
            select: Box::new(SelectInjector),
            file: Box::new(FileInjector),
        }
    }
}

impl InjectorSet {
    /// Replace the strategy used for `category`. Categories without a strategy
    /// slot are ignored.
    pub fn with(mut self, category: &FieldCategory, injector: Box<dyn ValueInjector>) -> Self {
        match category {
            FieldCategory::Text => self.text = injector,
            FieldCategory::Toggle => self.toggle = injector,
            FieldCategory::Select => self.select = injector,
            FieldCategory::File => self.file = injector,
            FieldCategory::Other(_) => {}
        }
        self
    }

    pub fn for_category(&self, category: &FieldCategory) -> Option<&dyn ValueInjector> {
        match category {
            FieldCategory::Text => Some(self.text.as_ref()),
            FieldCategory::Toggle => Some(self.toggle.as_ref()),
            FieldCategory::Select => Some(self.select.as_ref()),
            FieldCategory::File => Some(self.file.as_ref()),
            FieldCategory::Other(_) => None,
        }
    }
}
