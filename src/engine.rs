//! Engine facade
//!
//! Owns the step executor, the success monitor and the event bus for one page,
//! and answers the message-bridge requests (`runFill`, `startSuccessMonitor`,
//! `stopSuccessMonitor`). At most one success monitor is active at a time;
//! starting a new one stops the previous watch without delivering its outcome.

use std::sync::Arc;

use action_flow::{RunReport, StepExecutor};
use formfill_core_types::{
    EngineEvent, FillRunResult, FillStep, MonitorId, MonitorOutcome, RowData, SuccessConfig,
};
use formfill_event_bus::{EventBus, InMemoryBus};
use page_port::PageDom;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use success_monitor::{MonitorHandle, OutcomeCallback, SuccessMonitor};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{EngineError, ErrorBody};

/// Request accepted by [`FillEngine::handle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineRequest {
    #[serde(rename_all = "camelCase")]
    RunFill {
        steps: Vec<FillStep>,
        #[serde(default)]
        row_data: RowData,
    },
    StartSuccessMonitor {
        config: SuccessConfig,
    },
    StopSuccessMonitor,
}

impl EngineRequest {
    pub fn name(&self) -> &'static str {
        match self {
            EngineRequest::RunFill { .. } => "runFill",
            EngineRequest::StartSuccessMonitor { .. } => "startSuccessMonitor",
            EngineRequest::StopSuccessMonitor => "stopSuccessMonitor",
        }
    }
}

/// Request line as it arrives on the bridge: an optional correlation id plus
/// the request itself.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(flatten)]
    request: EngineRequest,
}

/// Reply to one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl EngineResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, err: &EngineError) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(err.body()),
        }
    }
}

pub struct FillEngine {
    executor: StepExecutor,
    monitor: SuccessMonitor,
    bus: Arc<InMemoryBus<EngineEvent>>,
    active_monitor: Mutex<Option<MonitorHandle>>,
}

impl FillEngine {
    pub fn new(page: Arc<dyn PageDom>, config: &Config) -> Self {
        let bus = InMemoryBus::new(config.bus_capacity);
        let shared: Arc<dyn EventBus<EngineEvent>> = bus.clone();
        let executor = StepExecutor::new(page.clone())
            .with_locator_policy(config.locator.clone())
            .with_flow_policy(config.flow.clone())
            .with_bus(shared.clone());
        let monitor = SuccessMonitor::new(page)
            .with_policy(config.monitor.clone())
            .with_bus(shared);
        Self {
            executor,
            monitor,
            bus,
            active_monitor: Mutex::new(None),
        }
    }

    /// Progress and monitor events.
    pub fn bus(&self) -> Arc<InMemoryBus<EngineEvent>> {
        self.bus.clone()
    }

    pub async fn run_fill(&self, steps: &[FillStep], row: &RowData) -> FillRunResult {
        self.executor.run(steps, row).await
    }

    pub async fn run_fill_with_cancel(
        &self,
        steps: &[FillStep],
        row: &RowData,
        cancel: &CancellationToken,
    ) -> RunReport {
        self.executor.run_with_cancel(steps, row, cancel).await
    }

    /// Start watching and hand back a receiver for the outcome.
    ///
    /// The receiver errors when the watch is stopped or replaced before it
    /// delivers.
    pub async fn watch_success(
        &self,
        config: SuccessConfig,
    ) -> (MonitorId, oneshot::Receiver<MonitorOutcome>) {
        let (tx, rx) = oneshot::channel();
        let callback: OutcomeCallback = Box::new(move |outcome| {
            let _ = tx.send(outcome);
        });

        self.stop_success_monitor();
        let handle = self.monitor.start(config, callback).await;
        let id = handle.id().clone();
        let replaced = self.active_monitor.lock().replace(handle);
        if let Some(previous) = replaced {
            previous.stop();
        }
        (id, rx)
    }

    /// Fire-and-forget variant of [`watch_success`](Self::watch_success); the
    /// outcome is published on the bus as `monitor_finished`.
    pub async fn start_success_monitor(&self, config: SuccessConfig) -> MonitorId {
        let (id, _outcome) = self.watch_success(config).await;
        id
    }

    /// Stop the active monitor. Returns whether an undelivered watch was stopped.
    pub fn stop_success_monitor(&self) -> bool {
        let previous = self.active_monitor.lock().take();
        match previous {
            Some(handle) => {
                let stopped = handle.stop();
                if stopped {
                    info!(monitor_id = %handle.id(), "stopped active success monitor");
                }
                stopped
            }
            None => false,
        }
    }

    pub async fn handle(&self, request: EngineRequest) -> Value {
        debug!(request = request.name(), "handling engine request");
        match request {
            EngineRequest::RunFill { steps, row_data } => {
                let result = self.run_fill(&steps, &row_data).await;
                serde_json::to_value(result).unwrap_or(Value::Null)
            }
            EngineRequest::StartSuccessMonitor { config } => {
                let id = self.start_success_monitor(config).await;
                json!({ "monitorId": id })
            }
            EngineRequest::StopSuccessMonitor => {
                json!({ "stopped": self.stop_success_monitor() })
            }
        }
    }

    /// Answer one JSON request line. Malformed input yields an `ok: false`
    /// response instead of an error.
    pub async fn handle_json(&self, line: &str) -> EngineResponse {
        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(err) => {
                return EngineResponse::failure(None, &EngineError::MalformedRequest(err.to_string()))
            }
        };
        let id = raw.get("id").cloned();
        match serde_json::from_value::<Envelope>(raw) {
            Ok(envelope) => {
                let result = self.handle(envelope.request).await;
                EngineResponse::success(envelope.id, result)
            }
            Err(err) => EngineResponse::failure(id, &EngineError::MalformedRequest(err.to_string())),
        }
    }
}
