//! [`PageDom`] over JavaScript evaluation.
//!
//! Elements found by a lookup are stamped with a `data-formfill-ref` token and
//! addressed through that attribute afterwards. Every script returns an object
//! with a `status` field (`ok`, `missing`, `invalid`, `error`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use formfill_core_types::{SelectorEntry, SelectorKind};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::errors::PageError;
use crate::model::{ElementInfo, ElementRef, MutationEvent, OptionMatch};
use crate::ports::PageDom;

const REF_ATTR: &str = "data-formfill-ref";
const MUTATION_CAPACITY: usize = 256;

/// Evaluates JavaScript expressions in a page and returns their JSON value.
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    async fn evaluate(&self, expression: &str) -> Result<Value, PageError>;
}

pub struct ScriptPage {
    runtime: Arc<dyn ScriptRuntime>,
    ref_prefix: String,
    mutations: broadcast::Sender<MutationEvent>,
    watcher: CancellationToken,
}

impl ScriptPage {
    pub fn new(runtime: Arc<dyn ScriptRuntime>) -> Self {
        let (mutations, _) = broadcast::channel(MUTATION_CAPACITY);
        Self {
            runtime,
            ref_prefix: format!("ff-{}", Uuid::new_v4().simple()),
            mutations,
            watcher: CancellationToken::new(),
        }
    }

    /// Spawn the mutation watcher.
    ///
    /// A `MutationObserver` (subtree, child list, character data) is installed in
    /// the page and its counter is polled; every change of the counter, including
    /// the reset caused by a navigation, is forwarded to subscribers.
    pub fn watch_mutations(&self, poll_interval: Duration) {
        let runtime = Arc::clone(&self.runtime);
        let sender = self.mutations.clone();
        let cancel = self.watcher.child_token();
        tokio::spawn(async move {
            let script = observer_script();
            let mut ticker = tokio::time::interval(poll_interval);
            let mut last: Option<(String, u64)> = None;
            let mut emitted = 0u64;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match runtime.evaluate(&script).await {
                    Ok(value) => {
                        let current = (
                            value["id"].as_str().unwrap_or_default().to_string(),
                            value["seq"].as_u64().unwrap_or_default(),
                        );
                        if last.as_ref().is_some_and(|prev| prev != &current) {
                            emitted += 1;
                            let _ = sender.send(MutationEvent { seq: emitted });
                        }
                        last = Some(current);
                    }
                    Err(err) => debug!(?err, "mutation poll failed"),
                }
            }
        });
    }

    async fn run(&self, expression: &str) -> Result<Value, PageError> {
        let value = self.runtime.evaluate(expression).await?;
        match value["status"].as_str() {
            Some("ok") => Ok(value),
            Some("missing") => Err(PageError::Detached),
            Some("invalid") => Err(PageError::InvalidSelector {
                selector: value["selector"].as_str().unwrap_or_default().to_string(),
                reason: message_of(&value),
            }),
            Some(_) => Err(PageError::Script(message_of(&value))),
            None => Err(PageError::Script(format!("unexpected script result: {}", value))),
        }
    }

    async fn run_on(&self, element: &ElementRef, body: &str) -> Result<Value, PageError> {
        self.run(&element_script(element, body)).await
    }
}

impl Drop for ScriptPage {
    fn drop(&mut self) {
        self.watcher.cancel();
    }
}

#[async_trait]
impl PageDom for ScriptPage {
    async fn query_all(&self, selector: &SelectorEntry) -> Result<Vec<ElementRef>, PageError> {
        let kind = match selector.kind {
            SelectorKind::Css => "css",
            SelectorKind::Xpath => "xpath",
        };
        let expression = format!(
            r#"(() => {{
            const kind = {kind};
            const selector = {selector};
            const attr = {attr};
            const prefix = {prefix};
            let nodes = [];
            try {{
                if (kind === 'xpath') {{
                    const snapshot = document.evaluate(selector, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                    for (let i = 0; i < snapshot.snapshotLength; i++) {{
                        const node = snapshot.snapshotItem(i);
                        if (node instanceof Element) nodes.push(node);
                    }}
                }} else {{
                    nodes = Array.from(document.querySelectorAll(selector));
                }}
            }} catch (err) {{
                return {{ status: 'invalid', selector, message: String(err && err.message || err) }};
            }}
            const refs = nodes.map(el => {{
                let token = el.getAttribute(attr);
                if (!token) {{
                    window.__formfillRefSeq = (window.__formfillRefSeq || 0) + 1;
                    token = prefix + '-' + window.__formfillRefSeq;
                    el.setAttribute(attr, token);
                }}
                return token;
            }});
            return {{ status: 'ok', refs }};
        }})()"#,
            kind = js_string(kind),
            selector = js_string(&selector.value),
            attr = js_string(REF_ATTR),
            prefix = js_string(&self.ref_prefix),
        );
        let value = self.run(&expression).await?;
        Ok(value["refs"]
            .as_array()
            .map(|refs| {
                refs.iter()
                    .filter_map(Value::as_str)
                    .map(|token| ElementRef(token.to_string()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn describe(&self, element: &ElementRef) -> Result<Option<ElementInfo>, PageError> {
        let body = r#"
            const style = window.getComputedStyle(el);
            const rect = el.getBoundingClientRect();
            const visible = style.visibility !== 'hidden' && style.display !== 'none'
                && (rect.width > 0 || rect.height > 0 || el.getClientRects().length > 0);
            const type = el.tagName === 'INPUT' ? (el.getAttribute('type') || '').toLowerCase() : '';
            return {
                status: 'ok',
                tag: el.tagName.toLowerCase(),
                inputType: type || null,
                visible,
                disabled: el.matches(':disabled'),
                readonly: !!el.readOnly,
            };"#;
        match self.run_on(element, body).await {
            Ok(value) => Ok(Some(ElementInfo {
                tag: value["tag"].as_str().unwrap_or_default().to_string(),
                input_type: value["inputType"].as_str().map(str::to_string),
                visible: value["visible"].as_bool().unwrap_or(false),
                disabled: value["disabled"].as_bool().unwrap_or(false),
                readonly: value["readonly"].as_bool().unwrap_or(false),
            })),
            Err(PageError::Detached) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn clear_value(&self, element: &ElementRef) -> Result<(), PageError> {
        let body = format!(
            r#"{setter}
            setValue(el, '');
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            return {{ status: 'ok' }};"#,
            setter = NATIVE_VALUE_SETTER,
        );
        self.run_on(element, &body).await.map(|_| ())
    }

    async fn inject_value(&self, element: &ElementRef, value: &str) -> Result<(), PageError> {
        let body = format!(
            r#"{setter}
            el.focus();
            setValue(el, {value});
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ status: 'ok' }};"#,
            setter = NATIVE_VALUE_SETTER,
            value = js_string(value),
        );
        self.run_on(element, &body).await.map(|_| ())
    }

    async fn set_checked(&self, element: &ElementRef, checked: bool) -> Result<(), PageError> {
        let body = format!(
            r#"const descriptor = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'checked');
            if (descriptor && descriptor.set) {{
                descriptor.set.call(el, {checked});
            }} else {{
                el.checked = {checked};
            }}
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ status: 'ok' }};"#,
            checked = checked,
        );
        self.run_on(element, &body).await.map(|_| ())
    }

    async fn select_option(
        &self,
        element: &ElementRef,
        needle: &str,
    ) -> Result<Option<OptionMatch>, PageError> {
        let body = format!(
            r#"{setter}
            const needle = {needle};
            const options = Array.from(el.options || []);
            let matchedBy = 'value';
            let option = options.find(o => o.value === needle);
            if (!option) {{
                matchedBy = 'text';
                option = options.find(o => (o.text || '').trim() === needle.trim());
            }}
            if (!option) {{
                return {{ status: 'ok', matched: null }};
            }}
            setValue(el, option.value);
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ status: 'ok', matched: {{ value: option.value, text: option.text, matched_by: matchedBy }} }};"#,
            setter = NATIVE_VALUE_SETTER,
            needle = js_string(needle),
        );
        let value = self.run_on(element, &body).await?;
        match &value["matched"] {
            Value::Null => Ok(None),
            matched => serde_json::from_value(matched.clone())
                .map(Some)
                .map_err(|err| PageError::Script(err.to_string())),
        }
    }

    async fn press_enter(&self, element: &ElementRef) -> Result<(), PageError> {
        let body = r#"
            el.focus();
            for (const type of ['keydown', 'keypress', 'keyup']) {
                el.dispatchEvent(new KeyboardEvent(type, {
                    key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true, cancelable: true,
                }));
            }
            return { status: 'ok' };"#;
        self.run_on(element, body).await.map(|_| ())
    }

    async fn click(&self, element: &ElementRef) -> Result<(), PageError> {
        let body = r#"
            el.scrollIntoView({ block: 'center', inline: 'center' });
            el.click();
            return { status: 'ok' };"#;
        self.run_on(element, body).await.map(|_| ())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        let value = self
            .run("(() => ({ status: 'ok', url: window.location.href }))()")
            .await?;
        Ok(value["url"].as_str().unwrap_or_default().to_string())
    }

    async fn visible_text(&self) -> Result<String, PageError> {
        let value = self
            .run("(() => ({ status: 'ok', text: document.body ? (document.body.innerText || '') : '' }))()")
            .await?;
        Ok(value["text"].as_str().unwrap_or_default().to_string())
    }

    fn mutations(&self) -> broadcast::Receiver<MutationEvent> {
        self.mutations.subscribe()
    }
}

/// Writes through the prototype setter so framework-patched `value` properties
/// still see the change.
const NATIVE_VALUE_SETTER: &str = r#"const setValue = (target, next) => {
                const proto = target instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
                    : target instanceof HTMLSelectElement ? HTMLSelectElement.prototype
                    : HTMLInputElement.prototype;
                const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
                if (descriptor && descriptor.set) {
                    descriptor.set.call(target, next);
                } else {
                    target.value = next;
                }
            };"#;

fn element_script(element: &ElementRef, body: &str) -> String {
    format!(
        r#"(() => {{
            const attr = {attr};
            const token = {token};
            const el = document.querySelector('[' + attr + '="' + token + '"]');
            if (!el || !el.isConnected) {{
                return {{ status: 'missing' }};
            }}
            try {{
                {body}
            }} catch (err) {{
                return {{ status: 'error', message: String(err && err.message || err) }};
            }}
        }})()"#,
        attr = js_string(REF_ATTR),
        token = js_string(&element.0),
        body = body,
    )
}

fn observer_script() -> String {
    r#"(() => {
            if (!window.__formfillObserver) {
                window.__formfillMutationSeq = 0;
                window.__formfillObserverId = Math.random().toString(36).slice(2);
                const observer = new MutationObserver(() => { window.__formfillMutationSeq += 1; });
                observer.observe(document, { childList: true, subtree: true, characterData: true });
                window.__formfillObserver = observer;
            }
            return { id: window.__formfillObserverId, seq: window.__formfillMutationSeq };
        })()"#
        .to_string()
}

/// JSON string literal, which is also a valid JavaScript string literal.
fn js_string(raw: &str) -> String {
    Value::String(raw.to_string()).to_string()
}

fn message_of(value: &Value) -> String {
    value["message"]
        .as_str()
        .unwrap_or("script reported an error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedRuntime {
        replies: Mutex<VecDeque<Value>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedRuntime {
        fn reply(self: Arc<Self>, value: Value) -> Arc<Self> {
            self.replies.lock().push_back(value);
            self
        }
    }

    #[async_trait]
    impl ScriptRuntime for ScriptedRuntime {
        async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
            self.seen.lock().push(expression.to_string());
            self.replies
                .lock()
                .pop_front()
                .ok_or_else(|| PageError::Protocol("no reply queued".into()))
        }
    }

    #[tokio::test]
    async fn query_all_maps_tokens_to_refs() {
        let runtime = Arc::new(ScriptedRuntime::default())
            .reply(json!({ "status": "ok", "refs": ["ff-1", "ff-2"] }));
        let page = ScriptPage::new(runtime.clone());

        let refs = page
            .query_all(&SelectorEntry::xpath("//input[@name='a \"b\"']"))
            .await
            .unwrap();
        assert_eq!(refs, vec![ElementRef("ff-1".into()), ElementRef("ff-2".into())]);

        let script = runtime.seen.lock()[0].clone();
        assert!(script.contains(r#"const kind = "xpath";"#));
        assert!(script.contains(r#""//input[@name='a \"b\"']""#));
        assert!(script.contains(REF_ATTR));
    }

    #[tokio::test]
    async fn invalid_selector_is_reported() {
        let runtime = Arc::new(ScriptedRuntime::default()).reply(json!({
            "status": "invalid",
            "selector": "##",
            "message": "not a valid selector"
        }));
        let page = ScriptPage::new(runtime);
        let err = page.query_all(&SelectorEntry::css("##")).await.unwrap_err();
        assert!(matches!(err, PageError::InvalidSelector { .. }));
    }

    #[tokio::test]
    async fn describe_missing_element_is_none() {
        let runtime = Arc::new(ScriptedRuntime::default())
            .reply(json!({ "status": "missing" }))
            .reply(json!({
                "status": "ok", "tag": "input", "inputType": "checkbox",
                "visible": true, "disabled": false, "readonly": false
            }));
        let page = ScriptPage::new(runtime);
        let el = ElementRef("ff-9".into());
        assert_eq!(page.describe(&el).await.unwrap(), None);
        let info = page.describe(&el).await.unwrap().unwrap();
        assert_eq!(info.input_type.as_deref(), Some("checkbox"));
        assert!(info.is_interactable());
    }

    #[tokio::test]
    async fn inject_uses_native_setter_and_events() {
        let runtime = Arc::new(ScriptedRuntime::default()).reply(json!({ "status": "ok" }));
        let page = ScriptPage::new(runtime.clone());
        page.inject_value(&ElementRef("ff-1".into()), "O'Brien")
            .await
            .unwrap();

        let script = runtime.seen.lock()[0].clone();
        assert!(script.contains("getOwnPropertyDescriptor(proto, 'value')"));
        assert!(script.contains(r#"setValue(el, "O'Brien")"#));
        assert!(script.contains("new Event('input'"));
        assert!(script.contains("new Event('change'"));
    }

    #[tokio::test]
    async fn select_option_parses_match() {
        let runtime = Arc::new(ScriptedRuntime::default())
            .reply(json!({ "status": "ok", "matched": { "value": "SP", "text": "São Paulo", "matched_by": "text" } }))
            .reply(json!({ "status": "ok", "matched": null }));
        let page = ScriptPage::new(runtime);
        let el = ElementRef("ff-3".into());
        let hit = page.select_option(&el, "São Paulo").await.unwrap().unwrap();
        assert_eq!(hit.value, "SP");
        assert!(page.select_option(&el, "MG").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn script_errors_surface() {
        let runtime = Arc::new(ScriptedRuntime::default())
            .reply(json!({ "status": "error", "message": "boom" }));
        let page = ScriptPage::new(runtime);
        let err = page.click(&ElementRef("ff-1".into())).await.unwrap_err();
        assert_eq!(err, PageError::Script("boom".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_forwards_counter_changes() {
        let runtime = Arc::new(ScriptedRuntime::default())
            .reply(json!({ "id": "a", "seq": 0 }))
            .reply(json!({ "id": "a", "seq": 0 }))
            .reply(json!({ "id": "a", "seq": 2 }))
            .reply(json!({ "id": "b", "seq": 0 }));
        let page = ScriptPage::new(runtime);
        let mut feed = page.mutations();
        page.watch_mutations(Duration::from_millis(100));

        assert_eq!(feed.recv().await.unwrap().seq, 1);
        assert_eq!(feed.recv().await.unwrap().seq, 2);
    }
}
