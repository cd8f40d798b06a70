//! JSON-lines message bridge
//!
//! Each input line is one request; each output line is either a response
//! (`"type": "response"`) or a pushed engine event (`"type": "event"`). The
//! bridge runs until the input reaches EOF.

use std::sync::Arc;

use formfill_core_types::EngineEvent;
use formfill_event_bus::EventBus;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{EngineResponse, FillEngine};
use crate::errors::EngineError;

const OUTBOX_CAPACITY: usize = 128;

pub fn response_frame(response: &EngineResponse) -> String {
    frame("response", serde_json::to_value(response).unwrap_or(Value::Null))
}

pub fn event_frame(event: &EngineEvent) -> String {
    frame("event", serde_json::to_value(event).unwrap_or(Value::Null))
}

fn frame(kind: &str, payload: Value) -> String {
    let mut object = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("payload".to_string(), other);
            map
        }
    };
    object.insert("type".to_string(), Value::String(kind.to_string()));
    Value::Object(object).to_string()
}

/// Serve requests from `input` until EOF, writing frames to `output`.
pub async fn serve<R, W>(engine: Arc<FillEngine>, input: R, mut output: W) -> Result<(), EngineError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox, mut frames) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    let done = CancellationToken::new();

    let writer = tokio::spawn(async move {
        while let Some(line) = frames.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    let mut events = engine.bus().subscribe();
    let event_outbox = outbox.clone();
    let event_done = done.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                received = events.recv() => match received {
                    Ok(event) => {
                        if event_outbox.send(event_frame(&event)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "bridge event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = event_done.cancelled() => break,
            }
        }
    });

    info!("bridge ready");
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!(bytes = trimmed.len(), "bridge request");
        let response = engine.handle_json(trimmed).await;
        if outbox.send(response_frame(&response)).await.is_err() {
            break;
        }
    }
    info!("bridge input closed");

    done.cancel();
    let _ = forwarder.await;
    drop(outbox);
    match writer.await {
        Ok(result) => result?,
        Err(err) => warn!(error = %err, "bridge writer task failed"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use page_port::{MemoryNode, MemoryPage};
    use serde_json::json;
    use tokio::io::BufReader;

    #[test]
    fn frames_carry_their_type() {
        let response = EngineResponse::success(Some(json!(1)), json!({"stopped": true}));
        let parsed: Value = serde_json::from_str(&response_frame(&response)).unwrap();
        assert_eq!(parsed["type"], "response");
        assert_eq!(parsed["ok"], true);
        assert_eq!(parsed["result"]["stopped"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn serves_requests_and_pushes_progress() {
        let page = Arc::new(MemoryPage::new("https://example.test/form"));
        page.append(MemoryNode::input("email"));
        let engine = Arc::new(FillEngine::new(page.clone(), &Config::default()));

        let requests = [
            json!({
                "id": 1,
                "type": "runFill",
                "steps": [{
                    "id": "e",
                    "action": "fill",
                    "primary": {"kind": "css", "value": "#email"},
                    "sourceFieldKey": "email",
                    "stepOrder": 1
                }],
                "rowData": {"email": "ana@example.test"}
            })
            .to_string(),
            "not json".to_string(),
        ]
        .join("\n");

        let (client, server_out) = tokio::io::duplex(64 * 1024);
        serve(engine, BufReader::new(requests.as_bytes()), server_out)
            .await
            .unwrap();

        let mut output = String::new();
        let mut reader = BufReader::new(client);
        let mut line = String::new();
        while reader.read_line(&mut line).await.unwrap() > 0 {
            output.push_str(&line);
            line.clear();
        }

        let frames: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let responses: Vec<&Value> = frames.iter().filter(|f| f["type"] == "response").collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["success"], true);
        assert_eq!(responses[1]["ok"], false);
        assert_eq!(responses[1]["error"]["kind"], "malformed_request");

        let step_events: Vec<&Value> = frames
            .iter()
            .filter(|f| f["type"] == "event" && f["event"] == "step_finished")
            .collect();
        assert_eq!(step_events.len(), 1);
        assert_eq!(step_events[0]["step_id"], "e");
        assert_eq!(step_events[0]["status"], "success");
    }
}
