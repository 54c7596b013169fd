//! Response normalization: every upstream outcome becomes one envelope.
//!
//! The normalizer is total. HTTP successes, HTTP errors, garbage bodies and
//! network failures all map to a [`ResultEnvelope`]; nothing on this path
//! may panic or surface a raw transport error to a caller.

use crate::descriptor::OperationDescriptor;
use crate::error::DispatchError;
use base64::Engine as _;
use reqwest::StatusCode;
use rmcp::model::{CallToolResult, Content};
use serde_json::Value;

/// Uniform result shape returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEnvelope {
    pub outcome: Outcome,
    /// On success: the normalized upstream body (or a confirmation string).
    /// On failure: a single human-readable diagnostic, prefixed `Error: `.
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl ResultEnvelope {
    #[must_use]
    pub fn success(payload: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Success,
            payload: payload.into(),
        }
    }

    /// Build a failure envelope. All failures funnel through here so the
    /// `Error: ` prefix stays consistent and pattern-matchable.
    #[must_use]
    pub fn failure(message: impl std::fmt::Display) -> Self {
        Self {
            outcome: Outcome::Failure,
            payload: format!("Error: {message}"),
        }
    }

    #[must_use]
    pub fn from_error(error: &DispatchError) -> Self {
        Self::failure(error)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Map the envelope onto an MCP tool result; `is_error` mirrors the
    /// outcome.
    #[must_use]
    pub fn into_call_tool_result(self) -> CallToolResult {
        match self.outcome {
            Outcome::Success => CallToolResult::success(vec![Content::text(self.payload)]),
            Outcome::Failure => CallToolResult {
                content: vec![Content::text(self.payload)],
                structured_content: None,
                is_error: Some(true),
                meta: None,
            },
        }
    }
}

/// Shape an upstream HTTP response into an envelope.
///
/// Status is always inspected first, including for confirmation-style
/// operations: a delete or logout that comes back non-2xx is a failure, not
/// a success with canned text.
#[must_use]
pub fn normalize_response(
    op: &OperationDescriptor,
    status: StatusCode,
    content_type: Option<&str>,
    body: &[u8],
) -> ResultEnvelope {
    if status.is_success() {
        if let Some(confirmation) = &op.confirmation {
            return ResultEnvelope::success(confirmation.clone());
        }
        return ResultEnvelope::success(success_body_text(body, content_type));
    }

    ResultEnvelope::from_error(&http_status_error(status, body))
}

/// Build the taxonomy error for a non-2xx upstream response.
#[must_use]
pub fn http_status_error(status: StatusCode, body: &[u8]) -> DispatchError {
    let code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let detail = error_body_text(body);

    if detail.is_empty() {
        DispatchError::Http(format!("API returned {code} {reason}"))
    } else {
        DispatchError::Http(format!("API returned {code} {reason}: {detail}"))
    }
}

/// Successful body: pretty-printed JSON when the body parses, the raw text
/// verbatim when it doesn't, and a small base64 envelope for non-UTF-8
/// payloads.
fn success_body_text(body: &[u8], content_type: Option<&str>) -> String {
    let Ok(text) = std::str::from_utf8(body) else {
        let b64 = base64::engine::general_purpose::STANDARD.encode(body);
        let wrapped = serde_json::json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": b64,
        });
        return serde_json::to_string_pretty(&wrapped).unwrap_or_else(|_| wrapped.to_string());
    };

    match serde_json::from_str::<Value>(text) {
        Ok(parsed) => {
            serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| text.to_string())
        }
        Err(_) => text.to_string(),
    }
}

/// Best-effort structured dump of an error body: compact JSON when it
/// parses, trimmed text otherwise.
fn error_body_text(body: &[u8]) -> String {
    let Ok(text) = std::str::from_utf8(body) else {
        return format!("({} bytes of binary data)", body.len());
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => trimmed.to_string(),
    }
}
