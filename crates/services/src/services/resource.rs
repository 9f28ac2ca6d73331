//! Generic CRUD over one resource kind.

use std::{future::Future, sync::Arc, time::Duration};

use db::{
    RecordStore, StoreError,
    models::record::{Fields, Record},
    store::query::ListQuery,
};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    query,
    schema::EntitySchema,
    validator::{self, FieldError, ValidationResult},
};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid payload: {}", format_field_errors(.0))]
    Invalid(Vec<FieldError>),
    #[error("no fields provided for update")]
    EmptyUpdate,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result of [`ResourceService::read`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    One(Record),
    Many(Vec<Record>),
}

/// Create/read/update/delete for the records of one [`EntitySchema`].
///
/// Cheap to clone; all clones share the schema and the store handle.
#[derive(Clone)]
pub struct ResourceService {
    schema: Arc<EntitySchema>,
    store: Arc<dyn RecordStore>,
    store_timeout: Duration,
}

impl ResourceService {
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(schema: EntitySchema, store: Arc<dyn RecordStore>) -> Self {
        Self {
            schema: Arc::new(schema),
            store,
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn kind(&self) -> &str {
        self.schema.plural()
    }

    /// Validate and persist a new record. Nothing reaches the store when the
    /// payload is invalid.
    pub async fn create(&self, payload: Fields) -> Result<Record, ResourceError> {
        if let ValidationResult::Invalid(errors) = validator::validate(&self.schema, &payload) {
            debug!(resource = self.kind(), errors = errors.len(), "Rejected create");
            return Err(ResourceError::Invalid(errors));
        }

        let mut fields: Fields = payload.into_iter().filter(|(_, v)| !v.is_null()).collect();
        for spec in self.schema.fields() {
            if let Some(default) = &spec.default {
                fields
                    .entry(spec.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        let record = self
            .bounded("insert", self.store.insert(self.kind(), fields))
            .await?;
        info!(resource = self.kind(), id = %record.id, "Created record");
        Ok(record)
    }

    /// A single record when `id` is given, otherwise every record.
    pub async fn read(&self, id: Option<Uuid>) -> Result<ReadOutcome, ResourceError> {
        match id {
            Some(id) => self.get(id).await.map(ReadOutcome::One),
            None => self.list(&ListQuery::default()).await.map(ReadOutcome::Many),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Record, ResourceError> {
        self.bounded("get", self.store.get(self.kind(), id))
            .await?
            .ok_or(ResourceError::NotFound)
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Vec<Record>, ResourceError> {
        Ok(self
            .bounded("list", self.store.list(self.kind(), query))
            .await?)
    }

    /// List using raw query parameters, checked against the schema.
    pub async fn list_with_params(
        &self,
        params: &[(String, String)],
    ) -> Result<Vec<Record>, ResourceError> {
        let query =
            query::parse_list_params(&self.schema, params).map_err(ResourceError::Invalid)?;
        self.list(&query).await
    }

    /// Apply a sparse patch. Only the fields present in `payload` are
    /// validated; `null` clears an optional field.
    pub async fn update(&self, id: Uuid, payload: Fields) -> Result<Record, ResourceError> {
        self.get(id).await?;

        if payload.is_empty() {
            return Err(ResourceError::EmptyUpdate);
        }
        if let ValidationResult::Invalid(errors) =
            validator::validate_partial(&self.schema, &payload)
        {
            debug!(resource = self.kind(), id = %id, errors = errors.len(), "Rejected update");
            return Err(ResourceError::Invalid(errors));
        }

        let record = self
            .bounded("update", self.store.update(self.kind(), id, payload))
            .await?
            .ok_or(ResourceError::NotFound)?;
        info!(resource = self.kind(), id = %id, "Updated record");
        Ok(record)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ResourceError> {
        self.get(id).await?;

        if !self
            .bounded("delete", self.store.delete(self.kind(), id))
            .await?
        {
            return Err(ResourceError::NotFound);
        }
        info!(resource = self.kind(), id = %id, "Deleted record");
        Ok(())
    }

    /// Delete every record whose group key equals `group_value`.
    pub async fn delete_group(&self, group_value: &str) -> Result<u64, ResourceError> {
        let filter = query::group_filter(&self.schema, group_value)
            .map_err(|e| ResourceError::Invalid(vec![e]))?;
        let count = self
            .bounded("delete_many", self.store.delete_many(self.kind(), &filter))
            .await?;
        info!(resource = self.kind(), group = group_value, count, "Deleted record group");
        Ok(count)
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    resource = self.kind(),
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(StoreError::timed_out(operation))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use db::{MemoryRecordStore, store::query::{Filter, SortDirection}};
    use serde_json::{Value, json};

    use super::*;
    use crate::services::{
        catalog,
        schema::{FieldSpec, FieldType, SchemaDefinition},
        validator::FieldErrorReason,
    };

    /// Memory store that counts inserts and can be made to hang.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryRecordStore,
        inserts: AtomicUsize,
        hang: bool,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn insert(&self, kind: &str, fields: Fields) -> Result<Record, StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.inner.insert(kind, fields).await
        }
        async fn get(&self, kind: &str, id: Uuid) -> Result<Option<Record>, StoreError> {
            self.inner.get(kind, id).await
        }
        async fn list(&self, kind: &str, query: &ListQuery) -> Result<Vec<Record>, StoreError> {
            self.inner.list(kind, query).await
        }
        async fn update(
            &self,
            kind: &str,
            id: Uuid,
            changes: Fields,
        ) -> Result<Option<Record>, StoreError> {
            self.inner.update(kind, id, changes).await
        }
        async fn delete(&self, kind: &str, id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete(kind, id).await
        }
        async fn delete_many(&self, kind: &str, filter: &Filter) -> Result<u64, StoreError> {
            self.inner.delete_many(kind, filter).await
        }
    }

    fn schema() -> EntitySchema {
        EntitySchema::new(SchemaDefinition {
            name: "deal".to_string(),
            plural: "deals".to_string(),
            group_key: Some("group".to_string()),
            fields: vec![
                FieldSpec::required("name", FieldType::String),
                FieldSpec::required("amount", FieldType::Number),
                FieldSpec::optional("group", FieldType::String),
                FieldSpec::optional("notes", FieldType::String),
                FieldSpec::optional("isActive", FieldType::Boolean).with_default(json!(true)),
            ],
        })
        .unwrap()
    }

    fn service(store: Arc<CountingStore>) -> ResourceService {
        ResourceService::new(schema(), store)
    }

    fn payload(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn invalid_create_never_reaches_the_store() {
        let store = Arc::new(CountingStore::default());
        let svc = service(store.clone());

        let err = svc.create(payload(json!({"amount": 5}))).await.unwrap_err();
        let ResourceError::Invalid(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors, vec![FieldError::new("name", FieldErrorReason::MissingField)]);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let svc = service(Arc::new(CountingStore::default()));
        let created = svc
            .create(payload(json!({"name": "Acme", "amount": 500, "isActive": false})))
            .await
            .unwrap();

        let ReadOutcome::One(read) = svc.read(Some(created.id)).await.unwrap() else {
            panic!("expected a single record");
        };
        assert_eq!(read, created);
        assert_eq!(
            read.fields,
            payload(json!({"name": "Acme", "amount": 500, "isActive": false}))
        );
    }

    #[tokio::test]
    async fn defaults_fill_absent_fields_and_nulls_are_dropped() {
        let svc = service(Arc::new(CountingStore::default()));
        let created = svc
            .create(payload(json!({"name": "Acme", "amount": 1, "notes": null})))
            .await
            .unwrap();
        assert_eq!(created.fields.get("isActive"), Some(&json!(true)));
        assert!(!created.fields.contains_key("notes"));
    }

    #[tokio::test]
    async fn update_is_partial() {
        let svc = service(Arc::new(CountingStore::default()));
        let created = svc
            .create(payload(json!({"name": "Acme", "amount": 500, "notes": "n"})))
            .await
            .unwrap();

        let updated = svc
            .update(created.id, payload(json!({"amount": 750})))
            .await
            .unwrap();
        assert_eq!(updated.fields["amount"], json!(750));
        assert_eq!(updated.fields["name"], json!("Acme"));
        assert_eq!(updated.fields["notes"], json!("n"));
        assert_eq!(updated.created_at, created.created_at);

        let err = svc
            .update(created.id, payload(json!({"name": null})))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Invalid(_)));

        let err = svc.update(created.id, Fields::new()).await.unwrap_err();
        assert!(matches!(err, ResourceError::EmptyUpdate));
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found_before_validation() {
        let svc = service(Arc::new(CountingStore::default()));
        let err = svc
            .update(Uuid::new_v4(), payload(json!({"amount": "oops"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::NotFound));
    }

    #[tokio::test]
    async fn delete_is_idempotent_from_the_callers_view() {
        let svc = service(Arc::new(CountingStore::default()));
        let created = svc
            .create(payload(json!({"name": "Acme", "amount": 1})))
            .await
            .unwrap();
        svc.delete(created.id).await.unwrap();
        assert!(matches!(
            svc.read(Some(created.id)).await.unwrap_err(),
            ResourceError::NotFound
        ));
        assert!(matches!(
            svc.delete(created.id).await.unwrap_err(),
            ResourceError::NotFound
        ));
    }

    #[tokio::test]
    async fn list_sort_is_stable_on_ties() {
        let svc = service(Arc::new(CountingStore::default()));
        for (name, amount) in [("first", 10), ("second", 5), ("third", 10), ("fourth", 5)] {
            svc.create(payload(json!({"name": name, "amount": amount})))
                .await
                .unwrap();
        }
        let names: Vec<_> = svc
            .list(&ListQuery::sorted_by("amount", SortDirection::Asc))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.fields["name"].clone())
            .collect();
        assert_eq!(
            names,
            vec![json!("second"), json!("fourth"), json!("first"), json!("third")]
        );
    }

    #[tokio::test]
    async fn delete_group_removes_only_matching_records() {
        let svc = service(Arc::new(CountingStore::default()));
        for group in ["X", "Y", "X", "Y", "X"] {
            svc.create(payload(json!({"name": "m", "amount": 1, "group": group})))
                .await
                .unwrap();
        }
        assert_eq!(svc.delete_group("X").await.unwrap(), 3);

        let ReadOutcome::Many(left) = svc.read(None).await.unwrap() else {
            panic!("expected a list");
        };
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|r| r.fields["group"] == json!("Y")));
    }

    #[tokio::test]
    async fn list_params_are_checked_against_the_schema() {
        let svc = service(Arc::new(CountingStore::default()));
        let err = svc
            .list_with_params(&[("colour".to_string(), "red".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Invalid(_)));
    }

    #[tokio::test]
    async fn hung_store_becomes_unavailable() {
        let store = Arc::new(CountingStore {
            hang: true,
            ..CountingStore::default()
        });
        let svc = service(store).with_store_timeout(Duration::from_millis(20));
        let err = svc
            .create(payload(json!({"name": "Acme", "amount": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Store(StoreError::Unavailable(_))));
    }

    fn complaint(extra: Value) -> Fields {
        let mut fields = payload(json!({
            "companyName": "Acme",
            "complainerName": "Ravi",
            "emailAddress": "ravi@acme.io",
            "subject": "Detector alarm stuck"
        }));
        fields.extend(payload(extra));
        fields
    }

    #[tokio::test]
    async fn blank_enum_and_date_values_are_rejected_on_create() {
        let store = Arc::new(CountingStore::default());
        let svc = ResourceService::new(
            EntitySchema::new(catalog::complaint()).unwrap(),
            store.clone(),
        );

        let err = svc
            .create(complaint(json!({"caseStatus": "", "priority": "  ", "date": ""})))
            .await
            .unwrap_err();
        let ResourceError::Invalid(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["date", "caseStatus", "priority"]);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);

        let created = svc.create(complaint(json!({}))).await.unwrap();
        assert_eq!(created.fields["caseStatus"], json!("Pending"));
        assert_eq!(created.fields["priority"], json!("Medium"));
    }

    #[tokio::test]
    async fn group_key_filter_is_exact() {
        let svc = ResourceService::new(
            EntitySchema::new(catalog::chat_message()).unwrap(),
            Arc::new(CountingStore::default()),
        );
        for chat in ["1", "12", "21"] {
            svc.create(payload(
                json!({"sender": "user", "content": "hi", "chatId": chat}),
            ))
            .await
            .unwrap();
        }

        let listed = svc
            .list_with_params(&[("chatId".to_string(), "1".to_string())])
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].fields["chatId"], json!("1"));
        assert_eq!(svc.delete_group("1").await.unwrap(), 1);
    }
}
