use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

/// Field values of a record, keyed by field name.
pub type Fields = Map<String, Value>;

/// Keys owned by the store. Schemas may not declare fields with these names.
pub const RESERVED_KEYS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// A persisted resource instance.
///
/// Serializes flat: the schema fields sit next to `id`, `createdAt` and
/// `updatedAt` in a single JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Row shape of the `records` table.
#[derive(Debug, FromRow)]
pub(crate) struct RecordRow {
    pub id: Uuid,
    pub fields: Json<Fields>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Self {
            id: row.id,
            fields: row.fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_flat_with_camel_case_timestamps() {
        let now = Utc::now();
        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!("Acme"));
        fields.insert("amount".to_string(), json!(500));
        let record = Record {
            id: Uuid::new_v4(),
            fields,
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["name"], json!("Acme"));
        assert_eq!(value["amount"], json!(500));
        assert_eq!(value["id"], json!(record.id.to_string()));
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("fields").is_none());

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
