//! Monitor lifecycle: start, observe, deliver once, stop.

use std::sync::Arc;
use std::time::Duration;

use formfill_core_types::{
    EngineEvent, FillError, MonitorId, MonitorOutcome, SuccessConfig, SuccessTrigger,
};
use formfill_event_bus::EventBus;
use page_port::{PageDom, PageError};
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conditions::{disappear_locator, text_condition, url_condition};
use crate::policy::MonitorPolicy;

/// Receives the single outcome of a watch.
pub type OutcomeCallback = Box<dyn FnOnce(MonitorOutcome) + Send + 'static>;

/// Hands the outcome to the callback at most once.
#[derive(Clone)]
struct Delivery {
    id: MonitorId,
    slot: Arc<Mutex<Option<OutcomeCallback>>>,
    bus: Option<Arc<dyn EventBus<EngineEvent>>>,
}

impl Delivery {
    async fn deliver(&self, outcome: MonitorOutcome) -> bool {
        let callback = self.slot.lock().take();
        let Some(callback) = callback else {
            return false;
        };
        info!(
            monitor_id = %self.id,
            succeeded = outcome.succeeded,
            reason = %outcome.reason,
            "monitor finished"
        );
        callback(outcome.clone());
        if let Some(bus) = &self.bus {
            let _ = bus
                .publish(EngineEvent::MonitorFinished {
                    monitor_id: self.id.clone(),
                    outcome,
                })
                .await;
        }
        true
    }

    fn discard(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Owner of one running watch.
///
/// Dropping the handle stops the watch without delivering an outcome.
#[must_use = "dropping a MonitorHandle stops the watch"]
pub struct MonitorHandle {
    delivery: Delivery,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn id(&self) -> &MonitorId {
        &self.delivery.id
    }

    /// Stop watching. Returns `true` when an outcome was still pending and is
    /// now discarded; `false` when it had already been delivered.
    pub fn stop(&self) -> bool {
        self.cancel.cancel();
        let discarded = self.delivery.discard();
        if discarded {
            debug!(monitor_id = %self.delivery.id, "monitor stopped before delivery");
        }
        discarded
    }

    /// Whether the outcome has been delivered or discarded.
    pub fn is_finished(&self) -> bool {
        !self.delivery.is_pending()
    }

    /// Wait until the observation task has exited.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.delivery.discard();
    }
}

/// Starts watches on one page.
pub struct SuccessMonitor {
    page: Arc<dyn PageDom>,
    policy: MonitorPolicy,
    bus: Option<Arc<dyn EventBus<EngineEvent>>>,
}

impl SuccessMonitor {
    pub fn new(page: Arc<dyn PageDom>) -> Self {
        Self {
            page,
            policy: MonitorPolicy::default(),
            bus: None,
        }
    }

    pub fn with_policy(mut self, policy: MonitorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBus<EngineEvent>>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Begin watching for `config`'s signal.
    ///
    /// Misconfiguration, an `element_disappears` selector that already matches
    /// nothing, and `text_appears` text that is already present are delivered
    /// before this returns.
    pub async fn start(&self, config: SuccessConfig, callback: OutcomeCallback) -> MonitorHandle {
        let delivery = Delivery {
            id: MonitorId::new(),
            slot: Arc::new(Mutex::new(Some(callback))),
            bus: self.bus.clone(),
        };
        let mut handle = MonitorHandle {
            delivery: delivery.clone(),
            cancel: CancellationToken::new(),
            task: None,
        };
        let timeout_ms = self.policy.effective_timeout_ms(config.timeout_ms);
        // The budget covers the initial page checks too.
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        info!(
            monitor_id = %delivery.id,
            trigger = config.trigger.name(),
            timeout_ms,
            "starting success monitor"
        );
        if let Some(bus) = &self.bus {
            let _ = bus
                .publish(EngineEvent::MonitorStarted {
                    monitor_id: delivery.id.clone(),
                    trigger: config.trigger,
                })
                .await;
        }

        if let Err(err) = config.validate() {
            warn!(monitor_id = %delivery.id, error = %err, "monitor misconfigured");
            delivery.deliver(err.into()).await;
            return handle;
        }

        // Subscribe before the initial check so no mutation slips between them.
        let mutations = self.page.mutations();
        let baseline = match self.page.current_url().await {
            Ok(url) => url,
            Err(err) => {
                delivery.deliver(FillError::from(err).into()).await;
                return handle;
            }
        };

        let strategy = match self.initial_check(&config).await {
            Initial::Done(outcome) => {
                delivery.deliver(outcome).await;
                return handle;
            }
            Initial::Watch(strategy) => strategy,
        };

        let page = Arc::clone(&self.page);
        let poll_interval = self.policy.poll_interval();
        let cancel = handle.cancel.clone();
        let task_delivery = delivery.clone();
        handle.task = Some(tokio::spawn(async move {
            let watch = strategy.run(page, baseline, mutations, poll_interval);
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(monitor_id = %task_delivery.id, "monitor cancelled");
                }
                _ = sleep_until(deadline) => {
                    task_delivery
                        .deliver(FillError::MonitorTimeout(timeout_ms).into())
                        .await;
                }
                outcome = watch => {
                    task_delivery.deliver(outcome).await;
                }
            }
        }));
        handle
    }

    async fn initial_check(&self, config: &SuccessConfig) -> Initial {
        match config.trigger {
            SuccessTrigger::UrlChange => Initial::Watch(Strategy::UrlChange {
                pattern: config.pattern.clone(),
            }),
            SuccessTrigger::TextAppears => {
                let needle = config.text_needle().unwrap_or_default().to_string();
                match self.page.visible_text().await {
                    Ok(text) if text_condition(&text, &needle) => {
                        Initial::Done(MonitorOutcome::success(appeared(&needle)))
                    }
                    Ok(_) => Initial::Watch(Strategy::TextAppears { needle }),
                    Err(err) => {
                        debug!(error = %err, "initial text check failed");
                        Initial::Watch(Strategy::TextAppears { needle })
                    }
                }
            }
            SuccessTrigger::ElementDisappears => {
                let raw = config.selector.clone().unwrap_or_default();
                match element_gone(self.page.as_ref(), &raw).await {
                    Check::Met(outcome) => Initial::Done(outcome),
                    Check::Pending => Initial::Watch(Strategy::ElementDisappears { selector: raw }),
                }
            }
        }
    }
}

enum Initial {
    Done(MonitorOutcome),
    Watch(Strategy),
}

enum Check {
    Met(MonitorOutcome),
    Pending,
}

enum Strategy {
    UrlChange { pattern: Option<String> },
    TextAppears { needle: String },
    ElementDisappears { selector: String },
}

impl Strategy {
    async fn run(
        self,
        page: Arc<dyn PageDom>,
        baseline: String,
        mut mutations: broadcast::Receiver<page_port::MutationEvent>,
        poll_interval: Duration,
    ) -> MonitorOutcome {
        match self {
            Strategy::UrlChange { pattern } => {
                let mut ticker = interval(poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick fires immediately; the baseline was just read.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    match page.current_url().await {
                        Ok(current) => {
                            if let Some(reason) =
                                url_condition(&baseline, &current, pattern.as_deref())
                            {
                                return MonitorOutcome::success(reason);
                            }
                        }
                        Err(err) => debug!(error = %err, "location poll failed"),
                    }
                }
            }
            Strategy::TextAppears { needle } => loop {
                next_mutation(&mut mutations).await;
                match page.visible_text().await {
                    Ok(text) if text_condition(&text, &needle) => {
                        return MonitorOutcome::success(appeared(&needle));
                    }
                    Ok(_) => {}
                    Err(err) => debug!(error = %err, "text check failed"),
                }
            },
            Strategy::ElementDisappears { selector } => loop {
                next_mutation(&mut mutations).await;
                if let Check::Met(outcome) = element_gone(page.as_ref(), &selector).await {
                    return outcome;
                }
            },
        }
    }
}

/// Wait for the next mutation. A lagging receiver counts as a mutation; a
/// closed feed never resolves, leaving the timeout in charge.
async fn next_mutation(mutations: &mut broadcast::Receiver<page_port::MutationEvent>) {
    match mutations.recv().await {
        Ok(_) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending::<()>().await,
    }
}

async fn element_gone(page: &dyn PageDom, raw: &str) -> Check {
    let locator = disappear_locator(raw);
    match page.query_all(&locator).await {
        Ok(found) if found.is_empty() => Check::Met(MonitorOutcome::success(format!(
            "element '{}' is no longer present",
            raw
        ))),
        Ok(_) => Check::Pending,
        Err(PageError::InvalidSelector { reason, .. }) => Check::Met(
            FillError::MonitorMisconfigured(format!("invalid selector '{}': {}", raw, reason))
                .into(),
        ),
        Err(err) => {
            debug!(error = %err, "element check failed");
            Check::Pending
        }
    }
}

fn appeared(needle: &str) -> String {
    format!("text '{}' appeared", needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use formfill_core_types::SelectorEntry;
    use page_port::{ElementInfo, ElementRef, MemoryNode, MemoryPage, MutationEvent, OptionMatch};
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    const FORM_URL: &str = "https://example.test/form";

    fn recorder() -> (Arc<Mutex<Vec<MonitorOutcome>>>, OutcomeCallback) {
        let store = Arc::new(Mutex::new(Vec::new()));
        let sink = store.clone();
        (store, Box::new(move |outcome| sink.lock().push(outcome)))
    }

    fn channel() -> (oneshot::Receiver<MonitorOutcome>, OutcomeCallback) {
        let (tx, rx) = oneshot::channel();
        (
            rx,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        )
    }

    fn monitor(page: &Arc<MemoryPage>) -> SuccessMonitor {
        SuccessMonitor::new(page.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn url_change_without_pattern() {
        let page = Arc::new(MemoryPage::new(FORM_URL));
        let (rx, callback) = channel();
        let _handle = monitor(&page)
            .start(SuccessConfig::new(SuccessTrigger::UrlChange), callback)
            .await;

        let mover = page.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(250)).await;
            mover.navigate("https://example.test/thanks");
        });

        let outcome = rx.await.unwrap();
        assert!(outcome.succeeded);
        assert!(outcome.reason.contains("/thanks"));
    }

    #[tokio::test(start_paused = true)]
    async fn url_change_pattern_keeps_original_baseline() {
        let page = Arc::new(MemoryPage::new("https://example.test/A"));
        let (store, callback) = recorder();
        let config = SuccessConfig::new(SuccessTrigger::UrlChange).with_pattern("confirm");
        let _handle = monitor(&page).start(config, callback).await;

        page.navigate("https://example.test/A#x");
        sleep(Duration::from_millis(500)).await;
        assert!(store.lock().is_empty());

        page.navigate("https://example.test/A#confirm");
        sleep(Duration::from_millis(150)).await;
        let outcomes = store.lock().clone();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded);
        assert!(outcomes[0].reason.contains("confirm"));
    }

    #[tokio::test(start_paused = true)]
    async fn text_already_present_fires_before_start_returns() {
        let page = Arc::new(MemoryPage::new(FORM_URL));
        page.append(MemoryNode::new("p").text("Obrigado pelo envio"));
        let (store, callback) = recorder();
        let config = SuccessConfig::new(SuccessTrigger::TextAppears).with_pattern("Obrigado");

        let handle = monitor(&page).start(config, callback).await;
        assert_eq!(store.lock().len(), 1);
        assert!(store.lock()[0].succeeded);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn text_appears_on_mutation() {
        let page = Arc::new(MemoryPage::new(FORM_URL));
        let banner = page.append(MemoryNode::new("div"));
        let (rx, callback) = channel();
        let config = SuccessConfig::new(SuccessTrigger::TextAppears).with_selector("Enviado");
        let _handle = monitor(&page).start(config, callback).await;

        page.append(MemoryNode::new("span").text("carregando"));
        page.set_text(&banner, "Enviado com sucesso").unwrap();

        let outcome = rx.await.unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.reason, "text 'Enviado' appeared");
    }

    #[tokio::test(start_paused = true)]
    async fn element_absent_at_start_succeeds_synchronously() {
        let page = Arc::new(MemoryPage::new(FORM_URL));
        let (store, callback) = recorder();
        let config =
            SuccessConfig::new(SuccessTrigger::ElementDisappears).with_selector("#spinner");

        let _handle = monitor(&page).start(config, callback).await;
        let outcomes = store.lock().clone();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn element_disappears_on_removal() {
        let page = Arc::new(MemoryPage::new(FORM_URL));
        let form = page.append(MemoryNode::new("form").attr("id", "signup"));
        let (rx, callback) = channel();
        let config = SuccessConfig::new(SuccessTrigger::ElementDisappears).with_selector("#signup");
        let _handle = monitor(&page).start(config, callback).await;

        let remover = page.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            remover.remove(&form);
        });
        let outcome = rx.await.unwrap();
        assert!(outcome.succeeded);
        assert!(outcome.reason.contains("#signup"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_delivers_once_and_stops_observing() {
        let page = Arc::new(MemoryPage::new(FORM_URL));
        page.append(MemoryNode::new("form").attr("id", "signup"));
        let (store, callback) = recorder();
        let config = SuccessConfig::new(SuccessTrigger::ElementDisappears)
            .with_selector("#signup")
            .with_timeout(500);
        let handle = monitor(&page).start(config, callback).await;

        sleep(Duration::from_millis(600)).await;
        let outcomes = store.lock().clone();
        assert_eq!(
            outcomes,
            vec![MonitorOutcome::failure("timeout after 500ms")]
        );
        assert!(handle.is_finished());

        let lookups = page.lookups();
        page.append(MemoryNode::new("p"));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(page.lookups(), lookups);
        assert_eq!(store.lock().len(), 1);
        assert!(!handle.stop());
    }

    /// Page whose location and text reads take a while to answer.
    struct SlowPage {
        inner: MemoryPage,
        delay: Duration,
    }

    #[async_trait]
    impl PageDom for SlowPage {
        async fn query_all(&self, selector: &SelectorEntry) -> Result<Vec<ElementRef>, PageError> {
            self.inner.query_all(selector).await
        }

        async fn describe(&self, element: &ElementRef) -> Result<Option<ElementInfo>, PageError> {
            self.inner.describe(element).await
        }

        async fn clear_value(&self, element: &ElementRef) -> Result<(), PageError> {
            self.inner.clear_value(element).await
        }

        async fn inject_value(&self, element: &ElementRef, value: &str) -> Result<(), PageError> {
            self.inner.inject_value(element, value).await
        }

        async fn set_checked(&self, element: &ElementRef, checked: bool) -> Result<(), PageError> {
            self.inner.set_checked(element, checked).await
        }

        async fn select_option(
            &self,
            element: &ElementRef,
            needle: &str,
        ) -> Result<Option<OptionMatch>, PageError> {
            self.inner.select_option(element, needle).await
        }

        async fn press_enter(&self, element: &ElementRef) -> Result<(), PageError> {
            self.inner.press_enter(element).await
        }

        async fn click(&self, element: &ElementRef) -> Result<(), PageError> {
            self.inner.click(element).await
        }

        async fn current_url(&self) -> Result<String, PageError> {
            sleep(self.delay).await;
            self.inner.current_url().await
        }

        async fn visible_text(&self) -> Result<String, PageError> {
            sleep(self.delay).await;
            self.inner.visible_text().await
        }

        fn mutations(&self) -> broadcast::Receiver<MutationEvent> {
            self.inner.mutations()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_from_start_on_slow_pages() {
        let page = Arc::new(SlowPage {
            inner: MemoryPage::new(FORM_URL),
            delay: Duration::from_millis(200),
        });
        let (rx, callback) = channel();
        let config = SuccessConfig::new(SuccessTrigger::TextAppears)
            .with_pattern("Obrigado")
            .with_timeout(500);

        let start = Instant::now();
        let _handle = SuccessMonitor::new(page).start(config, callback).await;
        assert_eq!(start.elapsed(), Duration::from_millis(400));

        let outcome = rx.await.unwrap();
        assert_eq!(outcome, MonitorOutcome::failure("timeout after 500ms"));
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_pending_outcome() {
        let page = Arc::new(MemoryPage::new(FORM_URL));
        let (store, callback) = recorder();
        let config = SuccessConfig::new(SuccessTrigger::UrlChange).with_timeout(1_000);
        let handle = monitor(&page).start(config, callback).await;

        assert!(handle.stop());
        page.navigate("https://example.test/elsewhere");
        sleep(Duration::from_millis(2_000)).await;
        assert!(store.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn misconfiguration_is_an_immediate_failure() {
        let page = Arc::new(MemoryPage::new(FORM_URL));
        let (store, callback) = recorder();
        let _handle = monitor(&page)
            .start(SuccessConfig::new(SuccessTrigger::ElementDisappears), callback)
            .await;
        let outcomes = store.lock().clone();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].succeeded);
        assert!(outcomes[0].reason.starts_with("monitor misconfigured"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_uses_policy_default() {
        let page = Arc::new(MemoryPage::new(FORM_URL));
        let (rx, callback) = channel();
        let monitor = monitor(&page).with_policy(MonitorPolicy {
            default_timeout_ms: 200,
            ..Default::default()
        });
        let _handle = monitor
            .start(SuccessConfig::new(SuccessTrigger::UrlChange).with_timeout(0), callback)
            .await;
        assert_eq!(rx.await.unwrap().reason, "timeout after 200ms");
    }
}
