//! Element resolver with fallback chain orchestration

use std::sync::Arc;

use formfill_core_types::SelectorEntry;
use page_port::{ElementRef, PageDom, PageError};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::errors::LocatorError;
use crate::policy::{BudgetMode, LocatorPolicy};

/// Element found by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub element: ElementRef,
    /// Position of the winning entry (0 = primary).
    pub entry_index: usize,
    pub entry: SelectorEntry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedElement),
    NotFound,
}

impl Resolution {
    pub fn element(&self) -> Option<&ElementRef> {
        match self {
            Resolution::Found(found) => Some(&found.element),
            Resolution::NotFound => None,
        }
    }
}

/// Outcome of a single lookup of one entry.
enum Probe {
    Hit(ElementRef),
    Miss,
    Abandon,
}

/// Resolves selector chains against a page.
pub struct SelectorEngine {
    page: Arc<dyn PageDom>,
    policy: LocatorPolicy,
}

impl SelectorEngine {
    pub fn new(page: Arc<dyn PageDom>) -> Self {
        Self {
            page,
            policy: LocatorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LocatorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &LocatorPolicy {
        &self.policy
    }

    /// Resolve `entries` (primary first, then fallbacks) to a live element.
    pub async fn resolve(&self, entries: &[SelectorEntry]) -> Result<Resolution, LocatorError> {
        self.policy.validate()?;
        let resolution = match self.policy.budget {
            BudgetMode::PerEntry => self.resolve_per_entry(entries).await?,
            BudgetMode::WholeChain => self.resolve_whole_chain(entries).await?,
        };
        match &resolution {
            Resolution::Found(found) => info!(
                selector = %found.entry,
                entry_index = found.entry_index,
                "resolved element"
            ),
            Resolution::NotFound => debug!(entries = entries.len(), "selector chain exhausted"),
        }
        Ok(resolution)
    }

    async fn resolve_per_entry(&self, entries: &[SelectorEntry]) -> Result<Resolution, LocatorError> {
        for (index, entry) in entries.iter().enumerate() {
            let deadline = Instant::now() + self.policy.window();
            loop {
                match self.probe(entry).await? {
                    Probe::Hit(element) => return Ok(found(index, entry, element)),
                    Probe::Abandon => break,
                    Probe::Miss => {}
                }
                let now = Instant::now();
                if now >= deadline {
                    debug!(selector = %entry, "entry window elapsed");
                    break;
                }
                sleep(self.policy.poll_interval().min(deadline - now)).await;
            }
        }
        Ok(Resolution::NotFound)
    }

    async fn resolve_whole_chain(
        &self,
        entries: &[SelectorEntry],
    ) -> Result<Resolution, LocatorError> {
        let deadline = Instant::now() + self.policy.window();
        let mut live: Vec<bool> = vec![true; entries.len()];
        loop {
            for (index, entry) in entries.iter().enumerate() {
                if !live[index] {
                    continue;
                }
                match self.probe(entry).await? {
                    Probe::Hit(element) => return Ok(found(index, entry, element)),
                    Probe::Abandon => live[index] = false,
                    Probe::Miss => {}
                }
            }
            let now = Instant::now();
            if now >= deadline || !live.iter().any(|alive| *alive) {
                return Ok(Resolution::NotFound);
            }
            sleep(self.policy.poll_interval().min(deadline - now)).await;
        }
    }

    async fn probe(&self, entry: &SelectorEntry) -> Result<Probe, LocatorError> {
        if entry.is_blank() {
            debug!("skipping blank selector entry");
            return Ok(Probe::Abandon);
        }
        match self.page.query_all(entry).await {
            Ok(matches) => Ok(matches
                .into_iter()
                .next()
                .map(Probe::Hit)
                .unwrap_or(Probe::Miss)),
            Err(PageError::InvalidSelector { reason, .. }) => {
                warn!(selector = %entry, %reason, "abandoning invalid selector");
                Ok(Probe::Abandon)
            }
            Err(PageError::Protocol(message)) => {
                Err(LocatorError::PageUnavailable(PageError::Protocol(message)))
            }
            Err(err) => {
                debug!(selector = %entry, error = %err, "lookup failed, retrying");
                Ok(Probe::Miss)
            }
        }
    }
}

fn found(index: usize, entry: &SelectorEntry, element: ElementRef) -> Resolution {
    Resolution::Found(ResolvedElement {
        element,
        entry_index: index,
        entry: entry.clone(),
    })
}
