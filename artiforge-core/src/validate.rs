//! Validation of `config/admin` update payloads.
//!
//! Payloads arrive as loosely typed JSON maps. [`CONFIG_FIELDS`] lists every
//! accepted field with its kind; [`validate_update`] coerces each present
//! field according to that kind and produces a [`ConfigDelta`], or rejects
//! the whole payload. Nothing here touches storage or the network.
//!
//! Error texts are matched by existing tooling, in particular the boolean
//! conversion message which mirrors Go's `strconv.ParseBool` failure:
//!
//! ```text
//! Field validation failed: error converting input Sure, why not for field "use_expiring_tokens": strconv.ParseBool: parsing "Sure, why not": invalid syntax
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{AdminConfiguration, ConfigDelta};
use crate::store::Secret;
use crate::template::{TemplateError, UsernameTemplate};

pub const FIELD_ACCESS_TOKEN: &str = "access_token";
pub const FIELD_URL: &str = "url";
pub const FIELD_USE_EXPIRING_TOKENS: &str = "use_expiring_tokens";
pub const FIELD_BYPASS_TLS_VERIFICATION: &str = "bypass_artifactory_tls_verification";
pub const FIELD_USERNAME_TEMPLATE: &str = "username_template";
pub const FIELD_REVOKE_ON_DELETE: &str = "revoke_on_delete";
pub const FIELD_ALLOW_SCOPE_OVERRIDE: &str = "allow_scope_override";

/// How a field's raw value is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// String stored as a [`Secret`].
    Secret,
    /// Absolute `http`/`https` URL.
    Url,
    /// Native boolean or a `strconv.ParseBool` literal.
    Bool,
    /// Username template source; must compile.
    Template,
}

/// One accepted field of the `config/admin` payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must be present (and non-empty) once the update is merged.
    pub required: bool,
}

/// Accepted fields, in declared order. Required-field errors are reported
/// in this order.
pub const CONFIG_FIELDS: &[FieldSchema] = &[
    FieldSchema {
        name: FIELD_ACCESS_TOKEN,
        kind: FieldKind::Secret,
        required: true,
    },
    FieldSchema {
        name: FIELD_URL,
        kind: FieldKind::Url,
        required: true,
    },
    FieldSchema {
        name: FIELD_USE_EXPIRING_TOKENS,
        kind: FieldKind::Bool,
        required: false,
    },
    FieldSchema {
        name: FIELD_BYPASS_TLS_VERIFICATION,
        kind: FieldKind::Bool,
        required: false,
    },
    FieldSchema {
        name: FIELD_USERNAME_TEMPLATE,
        kind: FieldKind::Template,
        required: false,
    },
    FieldSchema {
        name: FIELD_REVOKE_ON_DELETE,
        kind: FieldKind::Bool,
        required: false,
    },
    FieldSchema {
        name: FIELD_ALLOW_SCOPE_OVERRIDE,
        kind: FieldKind::Bool,
        required: false,
    },
];

/// Look up a field in [`CONFIG_FIELDS`].
pub fn field_schema(name: &str) -> Option<&'static FieldSchema> {
    CONFIG_FIELDS.iter().find(|f| f.name == name)
}

/// A payload was rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A value could not be coerced to its field's kind.
    #[error(
        "Field validation failed: error converting input {input} for field {field:?}: {reason}"
    )]
    Conversion {
        field: &'static str,
        input: String,
        reason: String,
    },

    /// The payload names a field outside the schema.
    #[error("unknown field {field:?}")]
    UnknownField { field: String },

    /// A required field is missing or empty.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("url error: {message}")]
    InvalidUrl { message: String },

    #[error("username_template error: {0}")]
    Template(#[from] TemplateError),
}

impl ValidationError {
    /// The payload field this error is about, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Conversion { field, .. } | Self::MissingField { field } => Some(*field),
            Self::UnknownField { field } => Some(field.as_str()),
            Self::InvalidUrl { .. } => Some(FIELD_URL),
            Self::Template(_) => Some(FIELD_USERNAME_TEMPLATE),
        }
    }
}

/// Validate an update payload against the stored record (if any).
///
/// Absent and `null` fields are left out of the delta. After coercion the
/// merged result must carry a non-empty `access_token` and `url`; on a first
/// update that means both must be supplied.
pub fn validate_update(
    payload: &Map<String, Value>,
    existing: Option<&AdminConfiguration>,
) -> Result<ConfigDelta, ValidationError> {
    if let Some(unknown) = payload.keys().find(|k| field_schema(k).is_none()) {
        return Err(ValidationError::UnknownField {
            field: unknown.clone(),
        });
    }

    let mut delta = ConfigDelta::default();
    for schema in CONFIG_FIELDS {
        let Some(raw) = payload.get(schema.name).filter(|v| !v.is_null()) else {
            continue;
        };

        match schema.kind {
            FieldKind::Secret => {
                delta.access_token = Some(Secret::new(coerce_string(schema.name, raw)?));
            }
            FieldKind::Url => {
                let url = coerce_string(schema.name, raw)?;
                if !url.is_empty() {
                    check_url(&url)?;
                }
                delta.url = Some(url);
            }
            FieldKind::Template => {
                let source = coerce_string(schema.name, raw)?;
                UsernameTemplate::compile(&source)?;
                delta.username_template = Some(source);
            }
            FieldKind::Bool => {
                let value = Some(coerce_bool(schema.name, raw)?);
                match schema.name {
                    FIELD_USE_EXPIRING_TOKENS => delta.use_expiring_tokens = value,
                    FIELD_BYPASS_TLS_VERIFICATION => {
                        delta.bypass_artifactory_tls_verification = value
                    }
                    FIELD_REVOKE_ON_DELETE => delta.revoke_on_delete = value,
                    FIELD_ALLOW_SCOPE_OVERRIDE => delta.allow_scope_override = value,
                    _ => {}
                }
            }
        }
    }

    check_required(&delta, existing)?;
    Ok(delta)
}

fn check_required(
    delta: &ConfigDelta,
    existing: Option<&AdminConfiguration>,
) -> Result<(), ValidationError> {
    for schema in CONFIG_FIELDS.iter().filter(|f| f.required) {
        let present = match schema.name {
            FIELD_ACCESS_TOKEN => is_set(
                delta.access_token.as_ref().map(Secret::expose),
                existing.map(|c| c.access_token.expose()),
            ),
            FIELD_URL => is_set(
                delta.url.as_deref(),
                existing.map(|c| c.artifactory_url.as_str()),
            ),
            _ => true,
        };
        if !present {
            return Err(ValidationError::MissingField { field: schema.name });
        }
    }
    Ok(())
}

/// The update's value wins over the stored one; empty counts as unset.
fn is_set(update: Option<&str>, stored: Option<&str>) -> bool {
    update.or(stored).is_some_and(|v| !v.is_empty())
}

fn check_url(raw: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(raw).map_err(|e| ValidationError::InvalidUrl {
        message: format!("{:?}: {}", raw, e),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::InvalidUrl {
            message: format!("unsupported scheme {:?} in {:?}", other, raw),
        }),
    }
}

/// Render a raw value the way it appears in conversion errors.
fn describe(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_string(field: &'static str, raw: &Value) -> Result<String, ValidationError> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ValidationError::Conversion {
            field,
            input: describe(other),
            reason: "expected a string".to_string(),
        }),
    }
}

/// Parse a boolean literal the way `strconv.ParseBool` does.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn coerce_bool(field: &'static str, raw: &Value) -> Result<bool, ValidationError> {
    if let Value::Bool(b) = raw {
        return Ok(*b);
    }

    let input = describe(raw);
    parse_bool(&input).ok_or_else(|| ValidationError::Conversion {
        field,
        reason: format!("strconv.ParseBool: parsing {:?}: invalid syntax", input),
        input,
    })
}
