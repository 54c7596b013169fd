//! The MCP surface over one tool dispatcher.
//!
//! Both inbound transports (`/sse` and `/mcp`) hand every session to a
//! clone of [`GatewayService`]; the dispatcher behind it is shared, so
//! concurrent invocations across any number of connections ride the same
//! compiled catalog and HTTP connection pool. Result correlation and
//! per-session teardown are handled by the rmcp session layer: when a
//! connection drops, its pending `call_tool` futures drop with it, which
//! aborts the in-flight upstream requests.

use apigate_rest_tools::dispatch::ToolDispatcher;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ErrorData, Implementation, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::Value;

#[derive(Clone)]
pub struct GatewayService {
    dispatcher: ToolDispatcher,
}

impl GatewayService {
    #[must_use]
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }

    fn display_name(&self) -> String {
        self.dispatcher
            .server_name()
            .unwrap_or("apigate-gateway")
            .to_string()
    }
}

impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.display_name(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Each tool is one REST operation against the upstream API. \
                 Tool results carry the upstream response as text; failures \
                 are returned as tool errors prefixed with 'Error: '."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.dispatcher.list_tools(),
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let arguments = request.arguments.map_or(Value::Null, Value::Object);
        // Never a protocol-level error: every failure converges to a
        // failure envelope inside the dispatcher.
        Ok(self.dispatcher.call_tool(&request.name, arguments).await)
    }
}
