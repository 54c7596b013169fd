//! Catalog configuration: the declarative operation table.
//!
//! A catalog describes one upstream REST API as a map of named operations.
//! The table is pure data; it is compiled into [`crate::descriptor`] form
//! once at startup and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A catalog of REST operations exposed as tools against one upstream API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    /// Name advertised to connecting clients (e.g. over MCP `initialize`).
    #[serde(default)]
    pub server_name: Option<String>,

    /// Upstream base URL, e.g. `https://petstore.example.com/v2`.
    pub base_url: String,

    /// Settings applied to every operation in this catalog.
    #[serde(default)]
    pub defaults: CatalogDefaults,

    /// Operation name -> descriptor. Names key invocation lookups and must
    /// be unique (guaranteed by the map representation).
    pub operations: BTreeMap<String, OperationConfig>,
}

/// Catalog-wide request defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDefaults {
    /// Extra headers attached to every upstream request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout in seconds. `0` disables the timeout entirely;
    /// absent falls back to the dispatcher-level default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// One named operation: how to validate its arguments and reach upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationConfig {
    /// HTTP method: GET, POST, PUT or DELETE.
    pub method: String,

    /// Path template with `{placeholder}` segments,
    /// e.g. `/patents/{patentNumber}`.
    pub path: String,

    #[serde(default)]
    pub description: Option<String>,

    /// How non-path arguments are carried. Defaults to `json` for POST/PUT
    /// and `none` (query parameters) for GET/DELETE.
    #[serde(default)]
    pub encoding: Option<BodyEncoding>,

    /// Field name -> schema. Fields named by a path placeholder are bound
    /// into the URL; the rest go to the body or query per `encoding`.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldConfig>,

    /// Literal success text for operations whose response body carries no
    /// useful payload (e.g. deletes). The response status is still
    /// inspected; this only replaces body parsing on success.
    #[serde(default)]
    pub confirmation: Option<String>,
}

/// Body encoding rule for non-path arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// No body; remaining arguments become URL query parameters.
    None,
    /// Remaining arguments serialize as a single JSON object body.
    Json,
    /// Remaining arguments become `application/x-www-form-urlencoded` pairs.
    Form,
    /// Binary fields become file parts, scalars become text parts.
    Multipart,
}

/// Declaration of one input field.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    #[serde(flatten)]
    pub kind: FieldKindConfig,

    #[serde(default)]
    pub required: bool,

    /// Value filled in when the caller omits the field.
    #[serde(default)]
    pub default: Option<serde_json::Value>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Primitive kind of an input field, tagged by `kind` in config files.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKindConfig {
    String,
    Number,
    Boolean,
    /// String restricted to a fixed set of literals.
    Enum { values: Vec<String> },
    Array { items: Box<FieldConfig> },
    Object { fields: BTreeMap<String, FieldConfig> },
    /// Base64-encoded bytes (e.g. file uploads).
    Binary,
}
