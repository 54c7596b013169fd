//! MCP tool annotations derived from HTTP method semantics.

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// Annotation hints for a catalog operation, following RFC 9110 method
/// semantics. `openWorldHint` is always set: these tools talk to an
/// external system.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = if *method == Method::GET {
        (Some(true), Some(false), Some(true))
    } else if *method == Method::POST {
        (Some(false), Some(false), Some(false))
    } else if *method == Method::PUT {
        (Some(false), Some(true), Some(true))
    } else if *method == Method::DELETE {
        (Some(false), Some(true), Some(true))
    } else {
        (None, None, None)
    };

    ToolAnnotations {
        title: None,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}
