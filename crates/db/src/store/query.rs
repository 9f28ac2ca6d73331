use std::{borrow::Cow, cmp::Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::models::record::{Fields, Record};

/// A single predicate over one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Case-insensitive substring match on the field's text.
    Contains { field: String, needle: String },
    /// Exact match. Numbers compare numerically, booleans as booleans.
    Equals { field: String, value: Value },
}

impl Condition {
    pub fn field(&self) -> &str {
        match self {
            Self::Contains { field, .. } | Self::Equals { field, .. } => field,
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Self::Contains { field, needle } => match fields.get(field) {
                None | Some(Value::Null) => false,
                Some(value) => text_of(value)
                    .to_ascii_lowercase()
                    .contains(&needle.to_ascii_lowercase()),
            },
            Self::Equals { field, value } => match (fields.get(field), value) {
                (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
                (Some(actual), expected) => actual == expected,
                (None, _) => false,
            },
        }
    }
}

/// Conjunction of conditions. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn equals(field: impl Into<String>, value: Value) -> Self {
        Self::new(vec![Condition::Equals {
            field: field.into(),
            value,
        }])
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.conditions.iter().all(|c| c.matches(fields))
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Parameters of a `list` call. The default lists everything in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl ListQuery {
    pub fn sorted_by(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            sort: Some(Sort {
                field: field.into(),
                direction,
            }),
            ..Self::default()
        }
    }
}

/// Ordering key for a field value. Mirrors SQLite's ordering of
/// `json_extract` results: NULL, then numbers (booleans as 0/1), then text.
#[derive(Debug, PartialEq, PartialOrd)]
enum SortKey<'a> {
    Null,
    Number(f64),
    Text(Cow<'a, str>),
}

impl<'a> SortKey<'a> {
    fn of(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Null,
            Some(Value::Bool(b)) => Self::Number(if *b { 1.0 } else { 0.0 }),
            Some(Value::Number(n)) => Self::Number(n.as_f64().unwrap_or_default()),
            Some(Value::String(s)) => Self::Text(Cow::Borrowed(s)),
            Some(other) => Self::Text(Cow::Owned(other.to_string())),
        }
    }
}

/// Compares two records on `sort`. Equal keys compare equal, so a stable sort
/// keeps insertion order among ties in both directions.
pub fn compare_records(a: &Record, b: &Record, sort: &Sort) -> Ordering {
    let left = SortKey::of(a.get(&sort.field));
    let right = SortKey::of(b.get(&sort.field));
    let ordering = left.partial_cmp(&right).unwrap_or(Ordering::Equal);
    match sort.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// SQLite JSON path selecting a top-level field.
pub(crate) fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field)
}

fn text_of(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn record(fields: Value) -> Record {
        let now = Utc::now();
        Record {
            id: Uuid::new_v4(),
            fields: fields.as_object().cloned().unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn contains_is_case_insensitive() {
        let r = record(json!({"customerName": "Acme Industries"}));
        let cond = Condition::Contains {
            field: "customerName".into(),
            needle: "acme".into(),
        };
        assert!(cond.matches(&r.fields));

        let missing = Condition::Contains {
            field: "city".into(),
            needle: "a".into(),
        };
        assert!(!missing.matches(&r.fields));
    }

    #[test]
    fn equals_compares_numbers_numerically() {
        let r = record(json!({"amount": 500}));
        assert!(Filter::equals("amount", json!(500.0)).matches(&r.fields));
        assert!(!Filter::equals("amount", json!(501)).matches(&r.fields));
    }

    #[test]
    fn nulls_sort_before_numbers_before_text() {
        let sort = Sort {
            field: "v".into(),
            direction: SortDirection::Asc,
        };
        let null = record(json!({}));
        let num = record(json!({"v": 3}));
        let text = record(json!({"v": "abc"}));
        assert_eq!(compare_records(&null, &num, &sort), Ordering::Less);
        assert_eq!(compare_records(&num, &text, &sort), Ordering::Less);
    }

    #[test]
    fn descending_keeps_ties_equal() {
        let sort = Sort {
            field: "v".into(),
            direction: SortDirection::Desc,
        };
        let a = record(json!({"v": 1}));
        let b = record(json!({"v": 1}));
        assert_eq!(compare_records(&a, &b, &sort), Ordering::Equal);
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }
}
