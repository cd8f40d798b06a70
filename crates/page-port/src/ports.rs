use async_trait::async_trait;
use formfill_core_types::SelectorEntry;
use tokio::sync::broadcast;

use crate::errors::PageError;
use crate::model::{ElementInfo, ElementRef, MutationEvent, OptionMatch};

/// Behavioural contract of a scriptable page.
///
/// Value writes must go through the element's native setter and be followed by
/// synthetic `input`/`change` notifications so hosting UI frameworks observe them.
#[async_trait]
pub trait PageDom: Send + Sync {
    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &SelectorEntry) -> Result<Vec<ElementRef>, PageError>;

    /// Describe an element; `None` when it is no longer connected.
    async fn describe(&self, element: &ElementRef) -> Result<Option<ElementInfo>, PageError>;

    /// Empty the element's value and notify listeners.
    async fn clear_value(&self, element: &ElementRef) -> Result<(), PageError>;

    /// Write a text value and dispatch `input` and `change`.
    async fn inject_value(&self, element: &ElementRef, value: &str) -> Result<(), PageError>;

    /// Set a checkbox/radio state and dispatch `input` and `change`.
    async fn set_checked(&self, element: &ElementRef, checked: bool) -> Result<(), PageError>;

    /// Select the option whose value equals `needle`, falling back to its visible
    /// text. Returns `None` when no option matches.
    async fn select_option(
        &self,
        element: &ElementRef,
        needle: &str,
    ) -> Result<Option<OptionMatch>, PageError>;

    /// Synthesize an Enter key press on the element.
    async fn press_enter(&self, element: &ElementRef) -> Result<(), PageError>;

    async fn click(&self, element: &ElementRef) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    /// Rendered text of the document body.
    async fn visible_text(&self) -> Result<String, PageError>;

    /// Subscribe to document mutation notifications.
    fn mutations(&self) -> broadcast::Receiver<MutationEvent>;
}
