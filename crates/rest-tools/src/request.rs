//! Request translation: validated arguments -> concrete HTTP request.
//!
//! This module is a pure builder. It substitutes path placeholders, routes
//! the remaining arguments to the body or query per the operation's
//! encoding, and assembles the final URL. No network I/O happens here.

use crate::config::{BodyEncoding, CatalogDefaults};
use crate::descriptor::OperationDescriptor;
use crate::error::DispatchError;
use crate::schema::JsonObject;
use base64::Engine as _;
use reqwest::Method;
use serde_json::Value;
use url::Url;

/// A fully-built upstream request, ready to hand to the HTTP client.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// Single JSON object body (`Content-Type: application/json`).
    Json(Value),
    /// Form-urlencoded `key=value` pairs, already stringified.
    Form(Vec<(String, String)>),
    Multipart(Vec<MultipartPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    pub kind: PartKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartKind {
    Text(String),
    /// Decoded binary blob, sent as a file part.
    File { bytes: Vec<u8>, filename: String },
}

/// Build the upstream request for one validated invocation.
///
/// # Errors
///
/// Returns [`DispatchError::Internal`] if a path placeholder has no
/// argument (the validator guarantees this cannot happen for a compiled
/// catalog) and [`DispatchError::Config`] if the assembled URL is invalid.
pub fn build_request(
    op: &OperationDescriptor,
    base_url: &str,
    defaults: &CatalogDefaults,
    args: &JsonObject,
) -> Result<PreparedRequest, DispatchError> {
    let path = substitute_path(op, args)?;

    // Everything not bound into the path goes to the body or query.
    let remaining: Vec<(&String, &Value)> = args
        .iter()
        .filter(|(name, _)| !op.is_placeholder(name))
        .collect();

    let mut query_pairs: Vec<(String, String)> = Vec::new();
    let body = match op.encoding {
        BodyEncoding::None => {
            for (name, value) in &remaining {
                query_pairs.push(((*name).clone(), query_value_string(value)));
            }
            RequestBody::Empty
        }
        BodyEncoding::Json => {
            let mut obj = JsonObject::new();
            for (name, value) in &remaining {
                obj.insert((*name).clone(), (*value).clone());
            }
            RequestBody::Json(Value::Object(obj))
        }
        BodyEncoding::Form => RequestBody::Form(
            remaining
                .iter()
                .map(|(name, value)| ((*name).clone(), query_value_string(value)))
                .collect(),
        ),
        BodyEncoding::Multipart => RequestBody::Multipart(build_multipart_parts(op, &remaining)?),
    };

    let url = build_url(base_url, &path, &query_pairs)?;

    Ok(PreparedRequest {
        method: op.method.clone(),
        url,
        headers: defaults
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        body,
    })
}

fn substitute_path(op: &OperationDescriptor, args: &JsonObject) -> Result<String, DispatchError> {
    let mut path = op.path_template.clone();
    if !path.starts_with('/') {
        path = format!("/{path}");
    }

    for placeholder in &op.placeholders {
        let value = args.get(placeholder).ok_or_else(|| {
            DispatchError::Internal(format!(
                "operation '{}': placeholder '{placeholder}' missing after validation",
                op.name
            ))
        })?;
        path = path.replace(
            &format!("{{{placeholder}}}"),
            &encode_path_segment(&value_to_string(value)),
        );
    }

    Ok(path)
}

fn build_multipart_parts(
    op: &OperationDescriptor,
    remaining: &[(&String, &Value)],
) -> Result<Vec<MultipartPart>, DispatchError> {
    let mut parts = Vec::with_capacity(remaining.len());
    for (name, value) in remaining {
        let kind = if op.is_binary_field(name) {
            let encoded = value.as_str().ok_or_else(|| {
                DispatchError::Internal(format!(
                    "operation '{}': binary field '{name}' is not a string after validation",
                    op.name
                ))
            })?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| {
                    DispatchError::Internal(format!(
                        "operation '{}': binary field '{name}' failed to decode: {e}",
                        op.name
                    ))
                })?;
            PartKind::File {
                bytes,
                filename: (*name).clone(),
            }
        } else {
            PartKind::Text(value_to_string(value))
        };
        parts.push(MultipartPart {
            name: (*name).clone(),
            kind,
        });
    }
    Ok(parts)
}

fn build_url(
    base_url: &str,
    path: &str,
    query_pairs: &[(String, String)],
) -> Result<Url, DispatchError> {
    let joined = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url =
        Url::parse(&joined).map_err(|e| DispatchError::Config(format!("invalid URL: {e}")))?;

    if !query_pairs.is_empty() {
        let mut query = String::new();
        for (i, (key, value)) in query_pairs.iter().enumerate() {
            if i > 0 {
                query.push('&');
            }
            query.push_str(&encode_query_component(key));
            query.push('=');
            query.push_str(&encode_query_component(value));
        }
        url.set_query(Some(&query));
    }

    Ok(url)
}

/// String form of a query/form value: scalars in literal form, arrays
/// comma-joined.
fn query_value_string(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => value_to_string(other),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn percent_encode(s: &str, keep: impl Fn(u8) -> bool) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if keep(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn encode_path_segment(s: &str) -> String {
    percent_encode(s, is_unreserved)
}

// NOTE: also encodes '&' and '=' to avoid breaking our own query joining.
fn encode_query_component(s: &str) -> String {
    percent_encode(s, is_unreserved)
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}
