//! Catalog file loading.
//!
//! The gateway takes one catalog file (YAML or JSON) describing the
//! upstream API it fronts. Everything about which operations exist lives in
//! that file; the binary carries no per-operation code.

use crate::error::{GatewayError, Result};
use apigate_rest_tools::config::CatalogConfig;
use std::path::Path;

/// Load and parse a catalog file, dispatching on the file extension
/// (`.json` parses as JSON, anything else as YAML).
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse as a
/// catalog table.
pub fn load_catalog(path: &Path) -> Result<CatalogConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::Config(format!("cannot read catalog file '{}': {e}", path.display()))
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let catalog: CatalogConfig = if is_json {
        serde_json::from_str(&raw)?
    } else {
        serde_yaml::from_str(&raw)?
    };

    Ok(catalog)
}
