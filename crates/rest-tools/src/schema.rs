//! Input schema model and argument validation.
//!
//! Validation is a pure function: raw caller arguments go in, a typed and
//! defaulted argument object (or the first offending field) comes out. No
//! network request is made until validation has passed.

use crate::config::{FieldConfig, FieldKindConfig};
use base64::Engine as _;
use serde_json::Value;
use std::collections::BTreeMap;

pub type JsonObject = serde_json::Map<String, Value>;

/// Compiled schema for one operation's argument object.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    /// Field name -> schema, iterated in sorted order so the "first
    /// offending field" of a validation error is deterministic.
    pub fields: BTreeMap<String, FieldSchema>,
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Enum(Vec<String>),
    Array(Box<FieldSchema>),
    Object(ObjectSchema),
    /// Base64-encoded bytes.
    Binary,
}

impl FieldKind {
    /// Whether values of this kind have a canonical single-string form
    /// (usable in a path segment or query parameter).
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldKind::String | FieldKind::Number | FieldKind::Boolean | FieldKind::Enum(_)
        )
    }
}

/// First schema violation found in a raw argument object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}' {reason}")]
pub struct ValidationError {
    /// Dotted/indexed path to the offending field, e.g. `tags[2].name`.
    pub field: String,
    pub reason: ValidationReason,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationReason {
    #[error("is missing")]
    Missing,
    #[error("expects {expected}, got {received}")]
    WrongKind {
        expected: &'static str,
        received: String,
    },
    #[error("must be one of [{}]", allowed.join(", "))]
    NotInEnum { allowed: Vec<String> },
}

impl ValidationError {
    fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            reason: ValidationReason::Missing,
        }
    }

    fn wrong_kind(field: &str, expected: &'static str, received: &Value) -> Self {
        Self {
            field: field.to_string(),
            reason: ValidationReason::WrongKind {
                expected,
                received: json_kind_name(received).to_string(),
            },
        }
    }
}

impl ObjectSchema {
    /// Compile the declarative field table into its runtime form.
    #[must_use]
    pub fn from_config(fields: &BTreeMap<String, FieldConfig>) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(name, f)| (name.clone(), FieldSchema::from_config(f)))
                .collect(),
        }
    }
}

impl FieldSchema {
    fn from_config(f: &FieldConfig) -> Self {
        let kind = match &f.kind {
            FieldKindConfig::String => FieldKind::String,
            FieldKindConfig::Number => FieldKind::Number,
            FieldKindConfig::Boolean => FieldKind::Boolean,
            FieldKindConfig::Enum { values } => FieldKind::Enum(values.clone()),
            FieldKindConfig::Array { items } => {
                FieldKind::Array(Box::new(FieldSchema::from_config(items)))
            }
            FieldKindConfig::Object { fields } => FieldKind::Object(ObjectSchema::from_config(fields)),
            FieldKindConfig::Binary => FieldKind::Binary,
        };
        Self {
            kind,
            required: f.required,
            default: f.default.clone(),
            description: f.description.clone(),
        }
    }
}

/// Check `raw` against `schema` and return the validated argument object.
///
/// Rules:
/// - unknown keys are dropped silently (forward compatibility),
/// - absent optional fields stay absent unless the schema declares a default,
/// - arrays validate elementwise and report the first failing index,
/// - nested object fields report dotted paths.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered, in sorted field order.
pub fn validate_arguments(
    schema: &ObjectSchema,
    raw: &JsonObject,
) -> Result<JsonObject, ValidationError> {
    validate_object(schema, raw, "")
}

fn validate_object(
    schema: &ObjectSchema,
    raw: &JsonObject,
    prefix: &str,
) -> Result<JsonObject, ValidationError> {
    let mut out = JsonObject::new();

    for (name, field) in &schema.fields {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        let value = raw.get(name).cloned().or_else(|| field.default.clone());
        let Some(value) = value else {
            if field.required {
                return Err(ValidationError::missing(&path));
            }
            continue;
        };

        out.insert(name.clone(), validate_value(field, &value, &path)?);
    }

    Ok(out)
}

fn validate_value(
    field: &FieldSchema,
    value: &Value,
    path: &str,
) -> Result<Value, ValidationError> {
    match &field.kind {
        FieldKind::String => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(ValidationError::wrong_kind(path, "string", other)),
        },
        FieldKind::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            other => Err(ValidationError::wrong_kind(path, "number", other)),
        },
        FieldKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(ValidationError::wrong_kind(path, "boolean", other)),
        },
        FieldKind::Enum(allowed) => match value {
            Value::String(s) if allowed.iter().any(|a| a == s) => Ok(value.clone()),
            Value::String(_) => Err(ValidationError {
                field: path.to_string(),
                reason: ValidationReason::NotInEnum {
                    allowed: allowed.clone(),
                },
            }),
            other => Err(ValidationError::wrong_kind(path, "string", other)),
        },
        FieldKind::Array(item) => match value {
            Value::Array(elems) => {
                let mut out = Vec::with_capacity(elems.len());
                for (i, elem) in elems.iter().enumerate() {
                    out.push(validate_value(item, elem, &format!("{path}[{i}]"))?);
                }
                Ok(Value::Array(out))
            }
            other => Err(ValidationError::wrong_kind(path, "array", other)),
        },
        FieldKind::Object(inner) => match value {
            Value::Object(map) => Ok(Value::Object(validate_object(inner, map, path)?)),
            other => Err(ValidationError::wrong_kind(path, "object", other)),
        },
        FieldKind::Binary => match value {
            Value::String(s) => {
                if base64::engine::general_purpose::STANDARD.decode(s).is_ok() {
                    Ok(value.clone())
                } else {
                    Err(ValidationError::wrong_kind(path, "base64 string", value))
                }
            }
            other => Err(ValidationError::wrong_kind(path, "base64 string", other)),
        },
    }
}

/// JSON Schema rendering of an operation's input, advertised to clients.
#[must_use]
pub fn input_schema_json(schema: &ObjectSchema) -> Value {
    let mut properties = serde_json::json!({});
    let mut required: Vec<String> = Vec::new();

    for (name, field) in &schema.fields {
        let mut prop = field_schema_json(field);
        if let Some(desc) = &field.description {
            prop["description"] = Value::String(desc.clone());
        }
        if let Some(default) = &field.default {
            prop["default"] = default.clone();
        }
        properties[name] = prop;

        if field.required && field.default.is_none() {
            required.push(name.clone());
        }
    }

    let mut out = serde_json::json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        out["required"] = serde_json::json!(required);
    }
    out
}

fn field_schema_json(field: &FieldSchema) -> Value {
    match &field.kind {
        FieldKind::String => serde_json::json!({"type": "string"}),
        FieldKind::Number => serde_json::json!({"type": "number"}),
        FieldKind::Boolean => serde_json::json!({"type": "boolean"}),
        FieldKind::Enum(values) => serde_json::json!({"type": "string", "enum": values}),
        FieldKind::Array(item) => serde_json::json!({
            "type": "array",
            "items": field_schema_json(item),
        }),
        FieldKind::Object(inner) => input_schema_json(inner),
        FieldKind::Binary => serde_json::json!({"type": "string", "format": "byte"}),
    }
}

fn json_kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
