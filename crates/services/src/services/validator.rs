//! Field validation of incoming payloads against an [`EntitySchema`].
//!
//! Validation never fails: it always produces a [`ValidationResult`] and
//! never touches the payload.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use db::models::record::Fields;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use super::schema::{CompiledField, EntitySchema, FieldType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldErrorReason {
    MissingField,
    TypeMismatch { expected: String },
    UnknownField,
}

impl fmt::Display for FieldErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField => write!(f, "is required"),
            Self::TypeMismatch { expected } => write!(f, "expected {expected}"),
            Self::UnknownField => write!(f, "is not a known field"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct FieldError {
    pub field: String,
    pub reason: FieldErrorReason,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: FieldErrorReason) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<FieldError>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    fn from_errors(errors: Vec<FieldError>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(errors)
        }
    }
}

/// Full validation, used on create: every required field must be present.
pub fn validate(schema: &EntitySchema, payload: &Fields) -> ValidationResult {
    let mut errors = Vec::new();
    for field in schema.compiled_fields() {
        match payload.get(&field.spec.name) {
            value if field.spec.required && is_blank(value) => {
                errors.push(FieldError::new(
                    &field.spec.name,
                    FieldErrorReason::MissingField,
                ));
            }
            None | Some(Value::Null) => {}
            // A blank optional value is still a value: "" is not a date or an
            // enum member.
            Some(value) => {
                if let Some(reason) = check_value(field, value) {
                    errors.push(FieldError::new(&field.spec.name, reason));
                }
            }
        }
    }
    errors.extend(unknown_fields(schema, payload));
    ValidationResult::from_errors(errors)
}

/// Partial validation, used on update: only the keys being set are checked.
/// Blanking a required field counts as removing it.
pub fn validate_partial(schema: &EntitySchema, payload: &Fields) -> ValidationResult {
    let mut errors = Vec::new();
    for field in schema.compiled_fields() {
        let Some(value) = payload.get(&field.spec.name) else {
            continue;
        };
        if is_blank(Some(value)) {
            if field.spec.required {
                errors.push(FieldError::new(
                    &field.spec.name,
                    FieldErrorReason::MissingField,
                ));
            } else if !value.is_null() {
                if let Some(reason) = check_value(field, value) {
                    errors.push(FieldError::new(&field.spec.name, reason));
                }
            }
        } else if let Some(reason) = check_value(field, value) {
            errors.push(FieldError::new(&field.spec.name, reason));
        }
    }
    errors.extend(unknown_fields(schema, payload));
    ValidationResult::from_errors(errors)
}

/// Type check of one non-null value.
pub(crate) fn check_value(field: &CompiledField, value: &Value) -> Option<FieldErrorReason> {
    let mismatch = |expected: String| Some(FieldErrorReason::TypeMismatch { expected });
    match field.spec.field_type {
        FieldType::String => match value.as_str() {
            Some(s) => match &field.pattern {
                Some(re) if !re.is_match(s) => {
                    mismatch(format!("a value matching {}", re.as_str()))
                }
                _ => None,
            },
            None => mismatch("string".to_string()),
        },
        FieldType::Number if value.is_number() => None,
        FieldType::Number => mismatch("number".to_string()),
        FieldType::Boolean if value.is_boolean() => None,
        FieldType::Boolean => mismatch("boolean".to_string()),
        FieldType::Date => match value.as_str() {
            Some(s) if is_date(s) => None,
            _ => mismatch("date (RFC 3339 or YYYY-MM-DD)".to_string()),
        },
        FieldType::Enum => match value.as_str() {
            Some(s) if field.spec.values.iter().any(|v| v == s) => None,
            _ => mismatch(format!("one of: {}", field.spec.values.join(", "))),
        },
        FieldType::Json if value.is_null() => mismatch("json".to_string()),
        FieldType::Json => None,
    }
}

fn unknown_fields<'a>(
    schema: &'a EntitySchema,
    payload: &'a Fields,
) -> impl Iterator<Item = FieldError> + 'a {
    payload
        .keys()
        .filter(|key| schema.field(key).is_none())
        .map(|key| FieldError::new(key.as_str(), FieldErrorReason::UnknownField))
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn is_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
