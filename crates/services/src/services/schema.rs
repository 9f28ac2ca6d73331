//! Entity schemas: the declared shape of a resource kind.

use std::collections::HashSet;

use db::models::record::RESERVED_KEYS;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;

use super::{
    query::RESERVED_PARAMS,
    validator::{self, FieldErrorReason},
};

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("resource name must not be empty")]
    EmptyName,
    #[error("{resource}: invalid plural name '{plural}'")]
    InvalidPlural { resource: String, plural: String },
    #[error("{resource}: invalid field name '{field}'")]
    InvalidFieldName { resource: String, field: String },
    #[error("{resource}: field '{field}' is reserved")]
    ReservedField { resource: String, field: String },
    #[error("{resource}: field '{field}' collides with a list query parameter")]
    ReservedParam { resource: String, field: String },
    #[error("{resource}: field '{field}' declared twice")]
    DuplicateField { resource: String, field: String },
    #[error("{resource}: enum field '{field}' has no values")]
    EmptyEnum { resource: String, field: String },
    #[error("{resource}: field '{field}' has an invalid pattern: {message}")]
    InvalidPattern {
        resource: String,
        field: String,
        message: String,
    },
    #[error("{resource}: default for '{field}' does not match its type")]
    InvalidDefault { resource: String, field: String },
    #[error("{resource}: group key '{field}' must be a declared non-json field")]
    InvalidGroupKey { resource: String, field: String },
}

/// Type tag of a field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// RFC 3339 timestamp or `YYYY-MM-DD`, carried as a string.
    Date,
    /// One of the field's declared `values`.
    Enum,
    /// Arbitrary nested JSON.
    Json,
}

/// Declaration of a single field.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldSpec {
    pub fn required(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: true,
            values: Vec::new(),
            default: None,
            pattern: None,
        }
    }

    pub fn optional(name: &str, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    pub fn with_values(mut self, values: &[&str]) -> Self {
        self.values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }
}

/// Declarative input for [`EntitySchema::new`]; also the on-disk format of
/// resource definition files.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SchemaDefinition {
    /// Singular name used in messages, e.g. `lead`.
    pub name: String,
    /// Route segment, e.g. `leads`.
    pub plural: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledField {
    pub spec: FieldSpec,
    pub pattern: Option<Regex>,
}

/// A validated, immutable schema for one resource kind.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    definition: SchemaDefinition,
    fields: Vec<CompiledField>,
}

impl EntitySchema {
    pub fn new(definition: SchemaDefinition) -> Result<Self, SchemaError> {
        let resource = definition.name.clone();
        if definition.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if !is_identifier(&definition.plural.replace('-', "_")) {
            return Err(SchemaError::InvalidPlural {
                resource,
                plural: definition.plural.clone(),
            });
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(definition.fields.len());
        for spec in &definition.fields {
            let field = spec.name.clone();
            if RESERVED_KEYS.contains(&field.as_str()) {
                return Err(SchemaError::ReservedField { resource, field });
            }
            if RESERVED_PARAMS.contains(&field.as_str()) {
                return Err(SchemaError::ReservedParam { resource, field });
            }
            if !is_identifier(&field) {
                return Err(SchemaError::InvalidFieldName { resource, field });
            }
            if !seen.insert(field.clone()) {
                return Err(SchemaError::DuplicateField { resource, field });
            }
            if spec.field_type == FieldType::Enum && spec.values.is_empty() {
                return Err(SchemaError::EmptyEnum { resource, field });
            }

            let pattern = match &spec.pattern {
                Some(p) => Some(Regex::new(p).map_err(|e| SchemaError::InvalidPattern {
                    resource: resource.clone(),
                    field: field.clone(),
                    message: e.to_string(),
                })?),
                None => None,
            };
            let compiled = CompiledField {
                spec: spec.clone(),
                pattern,
            };

            if let Some(default) = &spec.default {
                if validator::check_value(&compiled, default).is_some() {
                    return Err(SchemaError::InvalidDefault { resource, field });
                }
            }
            fields.push(compiled);
        }

        if let Some(group_key) = &definition.group_key {
            let valid = fields
                .iter()
                .any(|f| &f.spec.name == group_key && f.spec.field_type != FieldType::Json);
            if !valid {
                return Err(SchemaError::InvalidGroupKey {
                    resource,
                    field: group_key.clone(),
                });
            }
        }

        Ok(Self { definition, fields })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn plural(&self) -> &str {
        &self.definition.plural
    }

    pub fn group_key(&self) -> Option<&str> {
        self.definition.group_key.as_deref()
    }

    pub fn definition(&self) -> &SchemaDefinition {
        &self.definition
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.compiled(name).map(|f| &f.spec)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().map(|f| &f.spec)
    }

    pub(crate) fn compiled_fields(&self) -> &[CompiledField] {
        &self.fields
    }

    pub(crate) fn compiled(&self, name: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.spec.name == name)
    }

    /// Checks a single value against a field's declaration.
    pub fn check(&self, field: &str, value: &Value) -> Option<FieldErrorReason> {
        match self.compiled(field) {
            Some(compiled) => validator::check_value(compiled, value),
            None => Some(FieldErrorReason::UnknownField),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
