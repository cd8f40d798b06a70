//! In-memory document implementing [`PageDom`].
//!
//! Nodes live in a flat list in document order. Every structural or text change
//! bumps a sequence number and is broadcast on the mutation feed, like a
//! subtree-wide `MutationObserver` with character data enabled. Property writes
//! (`value`, `checked`) do not count as mutations.
//!
//! Each node also tracks what a hosting UI framework would have observed: the
//! framework value only updates when an `input` event is dispatched, so tests can
//! tell a native-setter write from a silent property poke.

mod selector;

use async_trait::async_trait;
use formfill_core_types::SelectorEntry;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

use crate::errors::PageError;
use crate::model::{ElementInfo, ElementRef, MutationEvent, OptionMatch, OptionMatchKind};
use crate::ports::PageDom;
use selector::Compiled;

const MUTATION_CAPACITY: usize = 256;

/// Side effect applied when a node is clicked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickEffect {
    Navigate(String),
    RemoveSelf,
    AppendText(String),
}

/// Element description used to populate a [`MemoryPage`].
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryNode {
    pub(crate) tag: String,
    attrs: Vec<(String, String)>,
    pub(crate) text: String,
    value: String,
    checked: bool,
    options: Vec<(String, String)>,
    selected: Option<usize>,
    visible: bool,
    disabled: bool,
    readonly: bool,
    on_click: Option<ClickEffect>,
    events: Vec<String>,
    observed: Option<String>,
}

impl MemoryNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            text: String::new(),
            value: String::new(),
            checked: false,
            options: Vec::new(),
            selected: None,
            visible: true,
            disabled: false,
            readonly: false,
            on_click: None,
            events: Vec::new(),
            observed: None,
        }
    }

    /// `<input id=..>` without a type attribute.
    pub fn input(id: &str) -> Self {
        Self::new("input").attr("id", id)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn class(self, class: &str) -> Self {
        let merged = match self.get_attr("class") {
            Some(existing) => format!("{} {}", existing, class),
            None => class.to_string(),
        };
        self.attr("class", &merged)
    }

    pub fn input_type(self, kind: &str) -> Self {
        self.attr("type", kind)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn option(mut self, value: &str, text: &str) -> Self {
        self.options.push((value.to_string(), text.to_string()));
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = Some(effect);
        self
    }

    pub(crate) fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn info(&self) -> ElementInfo {
        ElementInfo {
            tag: self.tag.clone(),
            input_type: self.get_attr("type").map(|t| t.to_ascii_lowercase()),
            visible: self.visible,
            disabled: self.disabled,
            readonly: self.readonly,
        }
    }

    fn is_checkable(&self) -> bool {
        self.tag == "input" && matches!(self.get_attr("type"), Some("checkbox" | "radio"))
    }

    fn dispatch(&mut self, event: &str) {
        if event == "input" {
            self.observed = Some(self.current_value());
        }
        self.events.push(event.to_string());
    }

    fn current_value(&self) -> String {
        if self.is_checkable() {
            return self.checked.to_string();
        }
        if self.tag == "select" {
            return self
                .selected
                .and_then(|idx| self.options.get(idx))
                .map(|(value, _)| value.clone())
                .unwrap_or_default();
        }
        self.value.clone()
    }
}

#[derive(Debug)]
struct Slot {
    handle: ElementRef,
    node: MemoryNode,
}

#[derive(Debug)]
struct Document {
    url: String,
    slots: Vec<Slot>,
    next_handle: u64,
    seq: u64,
    lookups: u64,
}

impl Document {
    fn slot_mut(&mut self, element: &ElementRef) -> Result<&mut MemoryNode, PageError> {
        self.slots
            .iter_mut()
            .find(|slot| &slot.handle == element)
            .map(|slot| &mut slot.node)
            .ok_or(PageError::Detached)
    }

    fn node(&self, element: &ElementRef) -> Option<&MemoryNode> {
        self.slots
            .iter()
            .find(|slot| &slot.handle == element)
            .map(|slot| &slot.node)
    }

    fn push(&mut self, node: MemoryNode) -> ElementRef {
        self.next_handle += 1;
        let handle = ElementRef(format!("mem-{}", self.next_handle));
        self.slots.push(Slot {
            handle: handle.clone(),
            node,
        });
        handle
    }
}

/// Scriptable page held entirely in memory.
pub struct MemoryPage {
    doc: Mutex<Document>,
    mutations: broadcast::Sender<MutationEvent>,
}

impl MemoryPage {
    pub fn new(url: impl Into<String>) -> Self {
        let (mutations, _) = broadcast::channel(MUTATION_CAPACITY);
        Self {
            doc: Mutex::new(Document {
                url: url.into(),
                slots: Vec::new(),
                next_handle: 0,
                seq: 0,
                lookups: 0,
            }),
            mutations,
        }
    }

    /// Append a node at the end of the document.
    pub fn append(&self, node: MemoryNode) -> ElementRef {
        let handle = self.doc.lock().push(node);
        self.notify();
        handle
    }

    /// Detach a node. Returns `false` when it was already gone.
    pub fn remove(&self, element: &ElementRef) -> bool {
        let removed = {
            let mut doc = self.doc.lock();
            let before = doc.slots.len();
            doc.slots.retain(|slot| &slot.handle != element);
            doc.slots.len() != before
        };
        if removed {
            self.notify();
        }
        removed
    }

    pub fn set_text(&self, element: &ElementRef, text: &str) -> Result<(), PageError> {
        self.doc.lock().slot_mut(element)?.text = text.to_string();
        self.notify();
        Ok(())
    }

    pub fn set_visible(&self, element: &ElementRef, visible: bool) -> Result<(), PageError> {
        self.doc.lock().slot_mut(element)?.visible = visible;
        Ok(())
    }

    pub fn set_disabled(&self, element: &ElementRef, disabled: bool) -> Result<(), PageError> {
        self.doc.lock().slot_mut(element)?.disabled = disabled;
        Ok(())
    }

    /// Change the location without touching the document.
    pub fn navigate(&self, url: impl Into<String>) {
        self.doc.lock().url = url.into();
    }

    pub fn value_of(&self, element: &ElementRef) -> Option<String> {
        self.doc.lock().node(element).map(MemoryNode::current_value)
    }

    pub fn is_checked(&self, element: &ElementRef) -> Option<bool> {
        self.doc.lock().node(element).map(|node| node.checked)
    }

    /// Value last observed through an `input` event.
    pub fn observed_value(&self, element: &ElementRef) -> Option<String> {
        self.doc
            .lock()
            .node(element)
            .and_then(|node| node.observed.clone())
    }

    /// Events dispatched on the element, in order.
    pub fn events_of(&self, element: &ElementRef) -> Vec<String> {
        self.doc
            .lock()
            .node(element)
            .map(|node| node.events.clone())
            .unwrap_or_default()
    }

    /// Number of `query_all` calls served so far.
    pub fn lookups(&self) -> u64 {
        self.doc.lock().lookups
    }

    fn notify(&self) {
        let seq = {
            let mut doc = self.doc.lock();
            doc.seq += 1;
            doc.seq
        };
        trace!(seq, "memory page mutated");
        let _ = self.mutations.send(MutationEvent { seq });
    }
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new("about:blank")
    }
}

#[async_trait]
impl PageDom for MemoryPage {
    async fn query_all(&self, selector: &SelectorEntry) -> Result<Vec<ElementRef>, PageError> {
        let compiled = Compiled::parse(selector)?;
        let mut doc = self.doc.lock();
        doc.lookups += 1;
        Ok(doc
            .slots
            .iter()
            .filter(|slot| compiled.matches(&slot.node))
            .map(|slot| slot.handle.clone())
            .collect())
    }

    async fn describe(&self, element: &ElementRef) -> Result<Option<ElementInfo>, PageError> {
        Ok(self.doc.lock().node(element).map(MemoryNode::info))
    }

    async fn clear_value(&self, element: &ElementRef) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let node = doc.slot_mut(element)?;
        node.value.clear();
        node.dispatch("input");
        Ok(())
    }

    async fn inject_value(&self, element: &ElementRef, value: &str) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let node = doc.slot_mut(element)?;
        node.dispatch("focus");
        node.value = value.to_string();
        node.dispatch("input");
        node.dispatch("change");
        Ok(())
    }

    async fn set_checked(&self, element: &ElementRef, checked: bool) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let (is_radio, group) = {
            let node = doc.slot_mut(element)?;
            (
                node.get_attr("type") == Some("radio"),
                node.get_attr("name").map(str::to_string),
            )
        };
        if is_radio && checked {
            if let Some(group) = group {
                for slot in doc.slots.iter_mut().filter(|slot| &slot.handle != element) {
                    if slot.node.get_attr("type") == Some("radio")
                        && slot.node.get_attr("name") == Some(group.as_str())
                    {
                        slot.node.checked = false;
                    }
                }
            }
        }
        let node = doc.slot_mut(element)?;
        node.checked = checked;
        node.dispatch("input");
        node.dispatch("change");
        Ok(())
    }

    async fn select_option(
        &self,
        element: &ElementRef,
        needle: &str,
    ) -> Result<Option<OptionMatch>, PageError> {
        let mut doc = self.doc.lock();
        let node = doc.slot_mut(element)?;
        let by_value = node
            .options
            .iter()
            .position(|(value, _)| value == needle)
            .map(|idx| (idx, OptionMatchKind::Value));
        let found = by_value.or_else(|| {
            node.options
                .iter()
                .position(|(_, text)| text.trim() == needle.trim())
                .map(|idx| (idx, OptionMatchKind::Text))
        });
        let Some((idx, matched_by)) = found else {
            return Ok(None);
        };
        node.selected = Some(idx);
        node.dispatch("input");
        node.dispatch("change");
        let (value, text) = node.options[idx].clone();
        Ok(Some(OptionMatch {
            value,
            text,
            matched_by,
        }))
    }

    async fn press_enter(&self, element: &ElementRef) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let node = doc.slot_mut(element)?;
        for phase in ["keydown", "keypress", "keyup"] {
            node.dispatch(&format!("{}:Enter", phase));
        }
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> Result<(), PageError> {
        let effect = {
            let mut doc = self.doc.lock();
            let node = doc.slot_mut(element)?;
            node.dispatch("click");
            node.on_click.clone()
        };
        match effect {
            Some(ClickEffect::Navigate(url)) => self.navigate(url),
            Some(ClickEffect::RemoveSelf) => {
                self.remove(element);
            }
            Some(ClickEffect::AppendText(text)) => {
                self.append(MemoryNode::new("div").text(&text));
            }
            None => {}
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.doc.lock().url.clone())
    }

    async fn visible_text(&self) -> Result<String, PageError> {
        let doc = self.doc.lock();
        let parts: Vec<&str> = doc
            .slots
            .iter()
            .filter(|slot| slot.node.visible && !slot.node.text.is_empty())
            .map(|slot| slot.node.text.as_str())
            .collect();
        Ok(parts.join("\n"))
    }

    fn mutations(&self) -> broadcast::Receiver<MutationEvent> {
        self.mutations.subscribe()
    }
}
