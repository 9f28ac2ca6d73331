//! Translation of request query parameters into store queries.

use db::store::query::{Condition, Filter, ListQuery, Sort, SortDirection};
use serde_json::Value;

use super::{
    schema::{EntitySchema, FieldSpec, FieldType},
    validator::{FieldError, FieldErrorReason},
};

/// Parameters with a fixed meaning; every other key filters on a field.
pub const RESERVED_PARAMS: [&str; 5] = ["id", "sort", "order", "limit", "offset"];

/// Builds a [`ListQuery`] from raw `(key, value)` pairs.
///
/// Text and date fields filter by substring, everything else (the group key
/// included) by equality.
pub fn parse_list_params(
    schema: &EntitySchema,
    params: &[(String, String)],
) -> Result<ListQuery, Vec<FieldError>> {
    let mut query = ListQuery::default();
    let mut errors = Vec::new();
    let mut direction = SortDirection::default();

    for (key, raw) in params {
        match key.as_str() {
            "id" => {}
            "sort" => match schema.field(raw) {
                Some(spec) if spec.field_type != FieldType::Json => {
                    query.sort = Some(Sort {
                        field: spec.name.clone(),
                        direction,
                    });
                }
                _ => errors.push(mismatch("sort", "a sortable field name")),
            },
            "order" => match raw.parse::<SortDirection>() {
                Ok(d) => direction = d,
                Err(_) => errors.push(mismatch("order", "asc or desc")),
            },
            "limit" => match raw.parse::<u64>() {
                Ok(n) => query.limit = Some(n),
                Err(_) => errors.push(mismatch("limit", "a non-negative integer")),
            },
            "offset" => match raw.parse::<u64>() {
                Ok(n) => query.offset = n,
                Err(_) => errors.push(mismatch("offset", "a non-negative integer")),
            },
            field => match schema.field(field) {
                None => errors.push(FieldError::new(field, FieldErrorReason::UnknownField)),
                Some(spec) => match condition_for(schema, spec, raw) {
                    Ok(condition) => query.filter.conditions.push(condition),
                    Err(reason) => errors.push(FieldError::new(field, reason)),
                },
            },
        }
    }

    // `order` may come before or after `sort`.
    if let Some(sort) = query.sort.as_mut() {
        sort.direction = direction;
    }

    if errors.is_empty() {
        Ok(query)
    } else {
        Err(errors)
    }
}

/// Exact-match filter on the schema's group key.
pub fn group_filter(schema: &EntitySchema, raw: &str) -> Result<Filter, FieldError> {
    let Some(spec) = schema.group_key().and_then(|key| schema.field(key)) else {
        return Err(FieldError::new(
            schema.name(),
            FieldErrorReason::TypeMismatch {
                expected: "a resource with a group key".to_string(),
            },
        ));
    };
    let value = scalar_for(spec, raw).map_err(|reason| FieldError::new(&spec.name, reason))?;
    Ok(Filter::equals(spec.name.clone(), value))
}

fn condition_for(
    schema: &EntitySchema,
    spec: &FieldSpec,
    raw: &str,
) -> Result<Condition, FieldErrorReason> {
    let is_group_key = schema.group_key() == Some(spec.name.as_str());
    match spec.field_type {
        FieldType::String | FieldType::Date if !is_group_key => Ok(Condition::Contains {
            field: spec.name.clone(),
            needle: raw.to_string(),
        }),
        _ => Ok(Condition::Equals {
            field: spec.name.clone(),
            value: scalar_for(spec, raw)?,
        }),
    }
}

fn scalar_for(spec: &FieldSpec, raw: &str) -> Result<Value, FieldErrorReason> {
    let expected = |what: &str| FieldErrorReason::TypeMismatch {
        expected: what.to_string(),
    };
    match spec.field_type {
        FieldType::String | FieldType::Date => Ok(Value::String(raw.to_string())),
        FieldType::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(|n| {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Some(Value::from(n as i64))
                } else {
                    serde_json::Number::from_f64(n).map(Value::Number)
                }
            })
            .ok_or_else(|| expected("number")),
        FieldType::Boolean => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(expected("true or false")),
        },
        FieldType::Enum if spec.values.iter().any(|v| v == raw) => {
            Ok(Value::String(raw.to_string()))
        }
        FieldType::Enum => Err(expected(&format!("one of: {}", spec.values.join(", ")))),
        FieldType::Json => Err(expected("a filterable field")),
    }
}

fn mismatch(param: &str, expected: &str) -> FieldError {
    FieldError::new(
        param,
        FieldErrorReason::TypeMismatch {
            expected: expected.to_string(),
        },
    )
}
