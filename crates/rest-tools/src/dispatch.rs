//! The tool dispatcher: one invocation in, one envelope out.
//!
//! Per invocation the dispatcher resolves the named operation, validates
//! arguments, translates them into an HTTP request, performs exactly one
//! upstream call, and normalizes the outcome. Any stage can short-circuit
//! straight to a failure envelope; nothing on this path raises past
//! [`dispatch`](ToolDispatcher::dispatch).
//!
//! The dispatcher is stateless per call and cheap to clone; concurrent
//! invocations share only the read-only catalog and the HTTP client's
//! connection pool.

use crate::config::CatalogConfig;
use crate::descriptor::{OperationDescriptor, compile_catalog};
use crate::error::{DispatchError, sanitize_reqwest_error};
use crate::request::{PartKind, PreparedRequest, RequestBody, build_request};
use crate::response::{ResultEnvelope, normalize_response};
use crate::schema::{JsonObject, validate_arguments};
use reqwest::Client;
use rmcp::model::{CallToolResult, JsonObject as McpJsonObject, Tool};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Shareable dispatcher over one compiled catalog.
#[derive(Clone)]
pub struct ToolDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    config: CatalogConfig,
    operations: Vec<OperationDescriptor>,
    client: Client,
    /// Per-request timeout; `None` means unbounded.
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    /// Compile a catalog into a ready dispatcher.
    ///
    /// The resulting instance is immutable and safe to share across tasks.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if the base URL or any operation
    /// descriptor is invalid.
    pub fn new(config: CatalogConfig, default_timeout: Duration) -> Result<Self, DispatchError> {
        Url::parse(&config.base_url).map_err(|e| {
            DispatchError::Config(format!("invalid baseUrl '{}': {e}", config.base_url))
        })?;

        let operations = compile_catalog(&config)?;

        let timeout = match config.defaults.timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(default_timeout),
        };

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                config,
                operations,
                client: Client::new(),
                timeout,
            }),
        })
    }

    /// Name advertised to clients, when the catalog declares one.
    #[must_use]
    pub fn server_name(&self) -> Option<&str> {
        self.inner.config.server_name.as_deref()
    }

    /// MCP `Tool` listing for every catalog operation.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.inner
            .operations
            .iter()
            .map(|op| {
                let schema_obj = op
                    .input_schema
                    .as_object()
                    .cloned()
                    .unwrap_or_else(McpJsonObject::new);
                let mut tool = Tool::new(
                    op.name.clone(),
                    op.description.clone().unwrap_or_default(),
                    Arc::new(schema_obj),
                );
                tool.annotations = Some(crate::semantics::annotations_for_method(&op.method));
                tool
            })
            .collect()
    }

    /// Execute one invocation. Infallible by construction: every error on
    /// the way converges to a failure envelope.
    pub async fn dispatch(&self, operation: &str, arguments: Value) -> ResultEnvelope {
        match self.try_dispatch(operation, arguments).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(operation, error = %e, "dispatch failed");
                ResultEnvelope::from_error(&e)
            }
        }
    }

    /// [`dispatch`](Self::dispatch), shaped as an MCP tool result.
    pub async fn call_tool(&self, operation: &str, arguments: Value) -> CallToolResult {
        self.dispatch(operation, arguments)
            .await
            .into_call_tool_result()
    }

    async fn try_dispatch(
        &self,
        operation: &str,
        arguments: Value,
    ) -> Result<ResultEnvelope, DispatchError> {
        let op = self
            .inner
            .operations
            .iter()
            .find(|op| op.name == operation)
            .ok_or_else(|| DispatchError::UnknownOperation(operation.to_string()))?;

        let raw = raw_argument_object(arguments)?;
        let validated = validate_arguments(&op.schema, &raw)?;
        let prepared = build_request(
            op,
            &self.inner.config.base_url,
            &self.inner.config.defaults,
            &validated,
        )?;

        tracing::debug!(
            operation,
            method = %prepared.method,
            url = %crate::error::redact_url(&prepared.url),
            "calling upstream"
        );

        let (status, content_type, body) = self.send(prepared).await?;
        Ok(normalize_response(op, status, content_type.as_deref(), &body))
    }

    async fn send(
        &self,
        prepared: PreparedRequest,
    ) -> Result<(reqwest::StatusCode, Option<String>, Vec<u8>), DispatchError> {
        let mut request = self
            .inner
            .client
            .request(prepared.method, prepared.url.clone());

        for (key, value) in &prepared.headers {
            request = request.header(key, value);
        }

        request = match prepared.body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Form(pairs) => request.form(&pairs),
            RequestBody::Multipart(parts) => {
                let mut form = reqwest::multipart::Form::new();
                for part in parts {
                    form = match part.kind {
                        PartKind::Text(value) => form.text(part.name, value),
                        PartKind::File { bytes, filename } => form.part(
                            part.name,
                            reqwest::multipart::Part::bytes(bytes).file_name(filename),
                        ),
                    };
                }
                request.multipart(form)
            }
        };

        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        Ok((status, content_type, body.to_vec()))
    }

    fn map_send_error(&self, e: &reqwest::Error) -> DispatchError {
        if e.is_timeout() {
            let bound = self
                .inner
                .timeout
                .map_or_else(|| "unbounded".to_string(), |t| format!("{}ms", t.as_millis()));
            return DispatchError::Transport(format!("request timed out after {bound}"));
        }
        DispatchError::Transport(sanitize_reqwest_error(e))
    }
}

fn raw_argument_object(arguments: Value) -> Result<JsonObject, DispatchError> {
    match arguments {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(JsonObject::new()),
        other => Err(DispatchError::Internal(format!(
            "invocation arguments must be an object, got {}",
            match other {
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                Value::String(_) => "a string",
                Value::Array(_) => "an array",
                _ => "an unexpected value",
            }
        ))),
    }
}
