//! apigate gateway: serves a REST operation catalog as MCP tools.
//!
//! Two inbound transports share one [`service::GatewayService`]:
//! - `/sse` + `/sse/message` — push-stream style: short-lived POSTs carry
//!   invocations, results are pushed asynchronously on the long-lived event
//!   stream and correlated by request id;
//! - `/mcp` — bidirectional streamable HTTP: one session carries requests
//!   and results, multiplexed by request id.

pub mod config;
pub mod error;
pub mod service;

use rmcp::transport::sse_server::{SseServer, SseServerConfig};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use service::GatewayService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Assemble the inbound HTTP surface: `/health`, `/mcp`, `/sse` and
/// `/sse/message`. The returned token cancels the SSE session tasks; cancel
/// it during shutdown so open event streams close instead of lingering.
#[must_use]
pub fn build_router(service: GatewayService, bind: SocketAddr) -> (axum::Router, CancellationToken) {
    let streamable = StreamableHttpService::new(
        {
            let service = service.clone();
            move || Ok::<_, std::io::Error>(service.clone())
        },
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    );

    let ct = CancellationToken::new();
    let (sse_server, sse_router) = SseServer::new(SseServerConfig {
        bind,
        sse_path: "/sse".to_string(),
        post_path: "/sse/message".to_string(),
        ct: ct.clone(),
        sse_keep_alive: None,
    });
    let _service_ct = sse_server.with_service(move || service.clone());

    let router = axum::Router::new()
        .route("/health", axum::routing::get(health))
        .nest_service("/mcp", streamable)
        .merge(sse_router);

    (router, ct)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({"status": "ok"}))
}
