//! Compiled operation descriptors.
//!
//! [`compile_catalog`] turns the declarative [`crate::config`] table into
//! immutable runtime descriptors, rejecting invalid tables up front so the
//! dispatch path never has to revalidate them.

use crate::config::{BodyEncoding, CatalogConfig, OperationConfig};
use crate::error::DispatchError;
use crate::schema::{FieldKind, ObjectSchema, input_schema_json};
use reqwest::Method;
use serde_json::Value;

/// Immutable description of one operation, built once at startup.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub method: Method,
    pub path_template: String,
    pub encoding: BodyEncoding,
    /// Fields bound into the path template, in template order.
    pub placeholders: Vec<String>,
    pub schema: ObjectSchema,
    /// JSON Schema form of `schema`, advertised to clients.
    pub input_schema: Value,
    /// Literal success text for operations with no meaningful response body.
    pub confirmation: Option<String>,
}

/// Compile every operation in a catalog.
///
/// # Errors
///
/// Returns [`DispatchError::Config`] if an operation uses an unsupported
/// HTTP method, carries a body on GET/DELETE, has an unbalanced path
/// template, or names a placeholder without a matching scalar field.
pub fn compile_catalog(config: &CatalogConfig) -> Result<Vec<OperationDescriptor>, DispatchError> {
    config
        .operations
        .iter()
        .map(|(name, op)| compile_operation(name, op))
        .collect()
}

fn compile_operation(
    name: &str,
    op: &OperationConfig,
) -> Result<OperationDescriptor, DispatchError> {
    let method = parse_method(name, &op.method)?;

    let body_capable = method == Method::POST || method == Method::PUT;
    let encoding = op.encoding.unwrap_or(if body_capable {
        BodyEncoding::Json
    } else {
        BodyEncoding::None
    });
    if !body_capable && encoding != BodyEncoding::None {
        return Err(DispatchError::Config(format!(
            "operation '{name}': {method} requests cannot carry a body encoding"
        )));
    }

    let placeholders = path_placeholders(name, &op.path)?;

    let mut schema = ObjectSchema::from_config(&op.fields);
    for placeholder in &placeholders {
        let Some(field) = schema.fields.get_mut(placeholder) else {
            return Err(DispatchError::Config(format!(
                "operation '{name}': path placeholder '{{{placeholder}}}' has no declared field"
            )));
        };
        if !field.kind.is_scalar() {
            return Err(DispatchError::Config(format!(
                "operation '{name}': path placeholder field '{placeholder}' must be a scalar kind"
            )));
        }
        // Placeholder fields are always required, whatever the table says.
        field.required = true;
    }

    let input_schema = input_schema_json(&schema);

    Ok(OperationDescriptor {
        name: name.to_string(),
        description: op.description.clone(),
        method,
        path_template: op.path.clone(),
        encoding,
        placeholders,
        schema,
        input_schema,
        confirmation: op.confirmation.clone(),
    })
}

fn parse_method(name: &str, method: &str) -> Result<Method, DispatchError> {
    match method.trim().to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        other => Err(DispatchError::Config(format!(
            "unsupported HTTP method '{other}' in operation '{name}'"
        ))),
    }
}

/// Extract `{placeholder}` names from a path template, in order.
fn path_placeholders(name: &str, template: &str) -> Result<Vec<String>, DispatchError> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            return Err(DispatchError::Config(format!(
                "operation '{name}': unbalanced '{{' in path template '{template}'"
            )));
        };
        let placeholder = &after_open[..close];
        if placeholder.is_empty() || placeholder.contains('{') {
            return Err(DispatchError::Config(format!(
                "operation '{name}': malformed placeholder in path template '{template}'"
            )));
        }
        out.push(placeholder.to_string());
        rest = &after_open[close + 1..];
    }

    if rest.contains('}') {
        return Err(DispatchError::Config(format!(
            "operation '{name}': unbalanced '}}' in path template '{template}'"
        )));
    }

    Ok(out)
}

impl OperationDescriptor {
    /// Whether this field is bound into the path rather than the body/query.
    #[must_use]
    pub fn is_placeholder(&self, field: &str) -> bool {
        self.placeholders.iter().any(|p| p == field)
    }

    /// Whether the declared field is a binary blob (multipart file part).
    #[must_use]
    pub fn is_binary_field(&self, field: &str) -> bool {
        self.schema
            .fields
            .get(field)
            .is_some_and(|f| matches!(f.kind, FieldKind::Binary))
    }
}
