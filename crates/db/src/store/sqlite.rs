use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, types::Json};
use tracing::debug;
use uuid::Uuid;

use super::{
    RecordStore, StoreError,
    query::{Condition, Filter, ListQuery, json_path},
};
use crate::models::record::{Fields, Record, RecordRow};

const RETURNING: &str = " RETURNING id, fields, created_at, updated_at";

/// Record store backed by the `records` table.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, kind: &str, fields: Fields) -> Result<Record, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let row = sqlx::query_as::<_, RecordRow>(
            r#"INSERT INTO records (id, kind, fields, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               RETURNING id, fields, created_at, updated_at"#,
        )
        .bind(id)
        .bind(kind)
        .bind(Json(&fields))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::DuplicateKey(id)
            }
            other => other.into(),
        })?;

        debug!(kind, id = %id, "Inserted record");
        Ok(row.into())
    }

    async fn get(&self, kind: &str, id: Uuid) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"SELECT id, fields, created_at, updated_at
               FROM records
               WHERE kind = ? AND id = ?"#,
        )
        .bind(kind)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Record::from))
    }

    async fn list(&self, kind: &str, query: &ListQuery) -> Result<Vec<Record>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, fields, created_at, updated_at FROM records WHERE kind = ",
        );
        qb.push_bind(kind);
        push_filter(&mut qb, &query.filter);

        match &query.sort {
            Some(sort) => {
                qb.push(" ORDER BY json_extract(fields, ")
                    .push_bind(json_path(&sort.field))
                    .push(") ")
                    .push(sort.direction.sql())
                    .push(", seq ASC");
            }
            None => {
                qb.push(" ORDER BY seq ASC");
            }
        }

        if query.limit.is_some() || query.offset > 0 {
            // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
            let limit = query
                .limit
                .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
                .unwrap_or(-1);
            qb.push(" LIMIT ")
                .push_bind(limit)
                .push(" OFFSET ")
                .push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));
        }

        let rows = qb
            .build_query_as::<RecordRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn update(
        &self,
        kind: &str,
        id: Uuid,
        changes: Fields,
    ) -> Result<Option<Record>, StoreError> {
        let (removals, assignments): (Vec<_>, Vec<_>) =
            changes.into_iter().partition(|(_, value)| value.is_null());

        // fields = json_remove(json_set(fields, path, json(value), ...), path, ...)
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE records SET fields = ");
        if !removals.is_empty() {
            qb.push("json_remove(");
        }
        if !assignments.is_empty() {
            qb.push("json_set(");
        }
        qb.push("fields");
        if !assignments.is_empty() {
            for (field, value) in &assignments {
                qb.push(", ")
                    .push_bind(json_path(field))
                    .push(", json(")
                    .push_bind(value.to_string())
                    .push(")");
            }
            qb.push(")");
        }
        if !removals.is_empty() {
            for (field, _) in &removals {
                qb.push(", ").push_bind(json_path(field));
            }
            qb.push(")");
        }
        qb.push(", updated_at = ")
            .push_bind(Utc::now())
            .push(" WHERE kind = ")
            .push_bind(kind)
            .push(" AND id = ")
            .push_bind(id)
            .push(RETURNING);

        let row = qb
            .build_query_as::<RecordRow>()
            .fetch_optional(&self.pool)
            .await?;

        if row.is_some() {
            debug!(
                kind,
                id = %id,
                set = assignments.len(),
                cleared = removals.len(),
                "Updated record"
            );
        }
        Ok(row.map(Record::from))
    }

    async fn delete(&self, kind: &str, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE kind = ? AND id = ?")
            .bind(kind)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, kind: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM records WHERE kind = ");
        qb.push_bind(kind);
        push_filter(&mut qb, filter);
        let result = qb.build().execute(&self.pool).await?;
        debug!(kind, count = result.rows_affected(), "Deleted records");
        Ok(result.rows_affected())
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
    for condition in &filter.conditions {
        qb.push(" AND ");
        match condition {
            Condition::Contains { field, needle } => {
                qb.push("instr(lower(CAST(json_extract(fields, ")
                    .push_bind(json_path(field))
                    .push(") AS TEXT)), lower(")
                    .push_bind(needle.clone())
                    .push(")) > 0");
            }
            Condition::Equals { field, value } => {
                qb.push("json_extract(fields, ")
                    .push_bind(json_path(field))
                    .push(") = ");
                push_scalar(qb, value);
            }
        }
    }
}

/// Binds a JSON scalar the way `json_extract` would surface it.
fn push_scalar(qb: &mut QueryBuilder<'_, Sqlite>, value: &serde_json::Value) {
    use serde_json::Value;

    match value {
        Value::Bool(b) => {
            qb.push_bind(i64::from(*b));
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push_bind(i);
            }
            None => {
                qb.push_bind(n.as_f64().unwrap_or_default());
            }
        },
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        Value::Null => {
            qb.push("NULL");
        }
        other => {
            qb.push_bind(other.to_string());
        }
    }
}
