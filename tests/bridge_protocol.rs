use std::sync::Arc;

use formfill_cli::bridge::serve;
use formfill_cli::{Config, FillEngine};
use page_port::{ClickEffect, MemoryNode, MemoryPage};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};

struct Client {
    requests: tokio::io::DuplexStream,
    frames: Lines<BufReader<tokio::io::DuplexStream>>,
}

impl Client {
    async fn send(&mut self, request: Value) {
        let mut line = request.to_string();
        line.push('\n');
        self.requests.write_all(line.as_bytes()).await.unwrap();
    }

    async fn next_frame(&mut self) -> Value {
        let line = self.frames.next_line().await.unwrap().expect("bridge closed");
        serde_json::from_str(&line).unwrap()
    }

    /// Read frames until one matches, returning everything seen.
    async fn until(&mut self, done: impl Fn(&Value) -> bool) -> Vec<Value> {
        let mut seen = Vec::new();
        loop {
            let frame = self.next_frame().await;
            let stop = done(&frame);
            seen.push(frame);
            if stop {
                return seen;
            }
        }
    }

    /// Close the request stream and drain the remaining output.
    async fn close(self) -> Vec<Value> {
        let Client {
            requests,
            mut frames,
        } = self;
        drop(requests);
        let mut rest = Vec::new();
        while let Some(line) = frames.next_line().await.unwrap() {
            rest.push(serde_json::from_str(&line).unwrap());
        }
        rest
    }
}

fn start_bridge(page: Arc<MemoryPage>) -> (Client, tokio::task::JoinHandle<()>) {
    let engine = Arc::new(FillEngine::new(page, &Config::default()));
    let (requests, server_in) = tokio::io::duplex(16 * 1024);
    let (client_out, server_out) = tokio::io::duplex(64 * 1024);
    let server = tokio::spawn(async move {
        serve(engine, BufReader::new(server_in), server_out)
            .await
            .unwrap();
    });
    let client = Client {
        requests,
        frames: BufReader::new(client_out).lines(),
    };
    (client, server)
}

#[tokio::test(start_paused = true)]
async fn monitor_outcome_is_pushed_after_submit() {
    let page = Arc::new(MemoryPage::new("https://example.test/form"));
    page.append(MemoryNode::input("email"));
    page.append(
        MemoryNode::new("button")
            .attr("id", "send")
            .on_click(ClickEffect::Navigate("https://example.test/form?sent=1".into())),
    );
    let (mut client, server) = start_bridge(page.clone());

    client
        .send(json!({
            "id": "watch",
            "type": "startSuccessMonitor",
            "config": {"trigger": "url_change", "pattern": "sent=1", "timeoutMs": 5000}
        }))
        .await;
    let started = client.until(|f| f["type"] == "response").await;
    let response = started.last().unwrap();
    assert_eq!(response["id"], "watch");
    assert_eq!(response["ok"], true);
    let monitor_id = response["result"]["monitorId"].clone();

    client
        .send(json!({
            "id": "fill",
            "type": "runFill",
            "steps": [
                {"id": 1, "action": "fill", "primary": {"kind": "css", "value": "#email"},
                 "sourceFieldKey": "email", "stepOrder": 1},
                {"id": 2, "action": "click", "primary": {"kind": "css", "value": "#send"},
                 "stepOrder": 2}
            ],
            "rowData": {"email": "ana@example.test"}
        }))
        .await;

    let frames = client
        .until(|f| f["type"] == "event" && f["event"] == "monitor_finished")
        .await;
    let finished = frames.last().unwrap();
    assert_eq!(finished["monitor_id"], monitor_id);
    assert_eq!(finished["outcome"]["succeeded"], true);

    let progress: Vec<(i64, String)> = frames
        .iter()
        .filter(|f| f["event"] == "step_finished")
        .map(|f| (f["index"].as_i64().unwrap(), f["status"].as_str().unwrap().to_string()))
        .collect();
    assert_eq!(
        progress,
        vec![(0, "success".to_string()), (1, "success".to_string())]
    );
    let fill_response = frames
        .iter()
        .find(|f| f["type"] == "response" && f["id"] == "fill")
        .unwrap();
    assert_eq!(fill_response["result"]["success"], true);

    client.close().await;
    server.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn second_monitor_silences_the_first() {
    let page = Arc::new(MemoryPage::new("https://example.test/form"));
    let (mut client, server) = start_bridge(page.clone());

    for id in ["first", "second"] {
        client
            .send(json!({
                "id": id,
                "type": "startSuccessMonitor",
                "config": {"trigger": "url_change", "timeoutMs": 300}
            }))
            .await;
    }
    let frames = client
        .until(|f| f["event"] == "monitor_finished")
        .await;
    let second_id = frames
        .iter()
        .find(|f| f["type"] == "response" && f["id"] == "second")
        .map(|f| f["result"]["monitorId"].clone())
        .unwrap();

    let finished = frames.last().unwrap();
    assert_eq!(finished["monitor_id"], second_id);
    assert_eq!(finished["outcome"]["reason"], "timeout after 300ms");

    client
        .send(json!({"id": "stop", "type": "stopSuccessMonitor"}))
        .await;
    let tail = client.until(|f| f["type"] == "response").await;
    let stop = tail.last().unwrap();
    assert_eq!(stop["result"]["stopped"], false);
    assert!(tail
        .iter()
        .all(|f| f["event"] != "monitor_finished"));

    let rest = client.close().await;
    assert!(rest.iter().all(|f| f["event"] != "monitor_finished"));
    server.await.unwrap();
}
