//! Shared harness for gateway integration tests: an in-process mock
//! upstream REST API, an in-process gateway, and minimal MCP clients for
//! both transports. The clients intentionally reimplement just enough of
//! the wire protocol to drive the server; no MCP logic from production
//! code is reused here.

// Each integration test binary compiles this module and uses a subset of it.
#![allow(dead_code)]

use anyhow::Context as _;
use apigate_gateway::build_router;
use apigate_gateway::service::GatewayService;
use apigate_rest_tools::config::CatalogConfig;
use apigate_rest_tools::dispatch::ToolDispatcher;
use futures::StreamExt as _;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

/// Catalog served by the test gateway, templated on the mock upstream URL.
pub fn test_catalog(upstream_base: &str) -> CatalogConfig {
    let yaml = format!(
        r#"
serverName: Pharmaceutical Patents API
baseUrl: {upstream_base}
operations:
  getPatentByNumber:
    method: GET
    path: /patents/{{patentNumber}}
    fields:
      patentNumber: {{ kind: string }}
  getAllInventors:
    method: GET
    path: /inventors
  addPet:
    method: POST
    path: /pet
    fields:
      name: {{ kind: string, required: true }}
      photoUrls:
        kind: array
        required: true
        items: {{ kind: string }}
  deletePet:
    method: DELETE
    path: /pet/{{petId}}
    confirmation: Pet deleted successfully.
    fields:
      petId: {{ kind: number }}
"#
    );
    serde_yaml::from_str(&yaml).expect("test catalog parses")
}

/// Mock upstream REST API with a request counter.
pub struct MockUpstream {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl MockUpstream {
    pub async fn start() -> anyhow::Result<Self> {
        use axum::extract::{Path, State};
        use axum::http::StatusCode;
        use axum::routing::{delete, get};

        let hits = Arc::new(AtomicUsize::new(0));

        let app = axum::Router::new()
            .route(
                "/patents/{number}",
                get(
                    |State(hits): State<Arc<AtomicUsize>>, Path(number): Path<String>| async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        axum::Json(json!({
                            "publication_number": number,
                            "title": "Widget",
                        }))
                    },
                ),
            )
            .route(
                "/inventors",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    // Slow on purpose: drives the timeout and ordering tests.
                    tokio::time::sleep(Duration::from_millis(1500)).await;
                    axum::Json(json!([{"id": 1, "name": "Ada Lovelace"}]))
                }),
            )
            .route(
                "/pet/{id}",
                delete(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::NOT_FOUND,
                        axum::Json(json!({"message": "Pet not found"})),
                    )
                }),
            )
            .fallback(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::NOT_FOUND
            })
            .with_state(hits.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.context("bind upstream")?;
        let addr = listener.local_addr().context("upstream local_addr")?;
        let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move { server.await });

        Ok(Self {
            base_url: format!("http://{addr}"),
            hits,
            shutdown: Some(shutdown),
            handle,
        })
    }

    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// In-process gateway bound to an ephemeral port.
pub struct TestGateway {
    pub base_url: String,
    sse_ct: tokio_util::sync::CancellationToken,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestGateway {
    pub async fn start(catalog: CatalogConfig, timeout: Duration) -> anyhow::Result<Self> {
        let dispatcher = ToolDispatcher::new(catalog, timeout).context("compile catalog")?;

        let listener = TcpListener::bind("127.0.0.1:0").await.context("bind gateway")?;
        let addr = listener.local_addr().context("gateway local_addr")?;
        let (router, sse_ct) = build_router(GatewayService::new(dispatcher), addr);

        let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move { server.await });

        let gateway = Self {
            base_url: format!("http://{addr}"),
            sse_ct,
            shutdown: Some(shutdown),
            handle,
        };
        gateway.wait_healthy().await?;
        Ok(gateway)
    }

    async fn wait_healthy(&self) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/health", self.base_url);
        let start = std::time::Instant::now();
        loop {
            if start.elapsed() > Duration::from_secs(10) {
                anyhow::bail!("timed out waiting for {url}");
            }
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    }

    pub async fn stop(mut self) {
        self.sse_ct.cancel();
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Parse a byte stream of `text/event-stream` frames into (event, data)
/// pairs, invoking `on_event` for each complete frame. Returns when the
/// stream ends or `on_event` returns `false`.
async fn drain_sse_stream(
    resp: reqwest::Response,
    mut on_event: impl FnMut(&str, &str) -> bool,
) -> anyhow::Result<()> {
    let mut stream = resp.bytes_stream();
    let mut buf = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("read SSE chunk")?;
        buf.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buf.find("\n\n") {
            let frame = buf[..pos].to_string();
            buf.drain(..=pos + 1);

            let mut event = "message";
            let mut data_lines: Vec<&str> = Vec::new();
            for line in frame.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = v.trim();
                } else if let Some(v) = line.strip_prefix("data:") {
                    data_lines.push(v.trim());
                }
            }
            if data_lines.is_empty() {
                continue;
            }
            if !on_event(event, &data_lines.join("\n")) {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// First JSON message on an event stream (used for `/mcp` POST responses).
pub async fn read_first_sse_json(resp: reqwest::Response) -> anyhow::Result<Value> {
    let mut found: Option<Value> = None;
    drain_sse_stream(resp, |_event, data| {
        match serde_json::from_str(data) {
            Ok(v) => {
                found = Some(v);
                false
            }
            Err(_) => true,
        }
    })
    .await?;
    found.context("event stream ended without a JSON message")
}

/// Minimal client for the bidirectional streamable HTTP endpoint (`/mcp`).
pub struct McpHttpSession {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl McpHttpSession {
    pub async fn connect(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();

        let init_resp = post_mcp(&client, &base_url, None, &initialize_request(0)).await?;
        let session_id = init_resp
            .headers()
            .get("Mcp-Session-Id")
            .and_then(|h| h.to_str().ok())
            .context("missing Mcp-Session-Id header")?
            .to_string();

        let init_msg = read_first_sse_json(init_resp).await?;
        anyhow::ensure!(init_msg.get("id") == Some(&json!(0)), "unexpected init id");

        let resp = post_mcp(
            &client,
            &base_url,
            Some(&session_id),
            &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await?;
        anyhow::ensure!(
            resp.status().as_u16() == 202,
            "notifications/initialized returned {}",
            resp.status()
        );

        Ok(Self {
            client,
            base_url,
            session_id,
        })
    }

    pub async fn request(
        &self,
        id: u64,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> anyhow::Result<Value> {
        let resp = post_mcp(
            &self.client,
            &self.base_url,
            Some(&self.session_id),
            &json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}),
        )
        .await?;

        tokio::time::timeout(timeout, read_first_sse_json(resp))
            .await
            .context("timed out waiting for response")?
    }
}

async fn post_mcp(
    client: &reqwest::Client,
    base_url: &str,
    session_id: Option<&str>,
    body: &Value,
) -> anyhow::Result<reqwest::Response> {
    let mut req = client
        .post(format!("{base_url}/mcp"))
        .header("Accept", "application/json, text/event-stream")
        .json(body);
    if let Some(session_id) = session_id {
        req = req.header("Mcp-Session-Id", session_id);
    }
    req.send()
        .await
        .context("POST /mcp")?
        .error_for_status()
        .context("POST /mcp status")
}

/// Minimal client for the push-stream endpoint (`/sse` + `/sse/message`).
///
/// Invocations go out as short-lived POSTs; results arrive on the
/// long-lived event stream and are correlated by JSON-RPC id, in whatever
/// order the server finishes them.
pub struct SseSession {
    client: reqwest::Client,
    message_url: String,
    events: tokio::sync::mpsc::UnboundedReceiver<Value>,
    _reader: tokio::task::JoinHandle<()>,
}

impl SseSession {
    pub async fn connect(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();

        let resp = client
            .get(format!("{base_url}/sse"))
            .send()
            .await
            .context("GET /sse")?
            .error_for_status()
            .context("GET /sse status")?;

        let (endpoint_tx, endpoint_rx) = tokio::sync::oneshot::channel::<String>();
        let (msg_tx, msg_rx) = tokio::sync::mpsc::unbounded_channel::<Value>();

        let reader = tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            let _ = drain_sse_stream(resp, |event, data| {
                if event == "endpoint" {
                    if let Some(tx) = endpoint_tx.take() {
                        let _ = tx.send(data.to_string());
                    }
                } else if let Ok(v) = serde_json::from_str::<Value>(data) {
                    if msg_tx.send(v).is_err() {
                        return false;
                    }
                }
                true
            })
            .await;
        });

        let endpoint = tokio::time::timeout(Duration::from_secs(5), endpoint_rx)
            .await
            .context("timed out waiting for endpoint event")?
            .context("stream closed before endpoint event")?;
        let message_url = resolve_endpoint(&base_url, &endpoint);

        let mut session = Self {
            client,
            message_url,
            events: msg_rx,
            _reader: reader,
        };

        session.post(&initialize_request(0)).await?;
        let init = session.wait_for_id(0, Duration::from_secs(5)).await?;
        anyhow::ensure!(init.get("result").is_some(), "initialize failed: {init}");
        session
            .post(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await?;

        Ok(session)
    }

    /// Fire an invocation without waiting for its result.
    pub async fn send_request(&self, id: u64, method: &str, params: Value) -> anyhow::Result<()> {
        self.post(&json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await
    }

    /// Next JSON-RPC response of any id pushed on the stream.
    pub async fn next_response(&mut self, timeout: Duration) -> anyhow::Result<Value> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            let msg = tokio::time::timeout(remaining, self.events.recv())
                .await
                .context("timed out waiting for SSE message")?
                .context("SSE stream closed")?;
            if msg.get("id").is_some() && (msg.get("result").is_some() || msg.get("error").is_some())
            {
                return Ok(msg);
            }
        }
    }

    pub async fn wait_for_id(&mut self, id: u64, timeout: Duration) -> anyhow::Result<Value> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            anyhow::ensure!(!remaining.is_zero(), "no response for id {id} in time");
            let msg = self.next_response(remaining).await?;
            if msg.get("id") == Some(&json!(id)) {
                return Ok(msg);
            }
        }
    }

    pub async fn request(
        &mut self,
        id: u64,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> anyhow::Result<Value> {
        self.send_request(id, method, params).await?;
        self.wait_for_id(id, timeout).await
    }

    async fn post(&self, body: &Value) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(&self.message_url)
            .json(body)
            .send()
            .await
            .context("POST message")?;
        anyhow::ensure!(
            resp.status().is_success() || resp.status().as_u16() == 202,
            "message POST returned {}",
            resp.status()
        );
        Ok(())
    }
}

fn resolve_endpoint(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else if endpoint.starts_with('/') {
        format!("{base_url}{endpoint}")
    } else if endpoint.starts_with('?') {
        format!("{base_url}/sse/message{endpoint}")
    } else {
        format!("{base_url}/{endpoint}")
    }
}

fn initialize_request(id: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "apigate-gateway-integration-tests", "version": "0" }
        }
    })
}

/// Extract `result.content[0].text` from a tools/call response.
pub fn tool_call_text(msg: &Value) -> anyhow::Result<&str> {
    msg.get("result")
        .and_then(|r| r.get("content"))
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .context("tools/call missing result.content[0].text")
}

/// Extract `result.isError` from a tools/call response (absent counts as
/// false).
pub fn tool_call_is_error(msg: &Value) -> bool {
    msg.get("result")
        .and_then(|r| r.get("isError"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
