//! Name-to-service lookup for every mounted resource kind.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use db::RecordStore;
use thiserror::Error;
use tracing::info;

use super::{
    catalog::{self, DefinitionFile},
    resource::ResourceService,
    schema::{EntitySchema, SchemaDefinition, SchemaError},
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("resource '{0}' is registered twice")]
    Duplicate(String),
    #[error("'{0}' is reserved and cannot be used as a resource name")]
    ReservedName(String),
    #[error("failed to parse resource definitions: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Route segments taken by non-resource endpoints.
pub const RESERVED_ROUTES: [&str; 2] = ["resources", "health"];

#[derive(Clone, Default)]
pub struct ResourceRegistry {
    services: BTreeMap<String, ResourceService>,
}

impl ResourceRegistry {
    /// Builds a registry from definitions, all sharing one store.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = SchemaDefinition>,
        store: Arc<dyn RecordStore>,
        store_timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for definition in definitions {
            let schema = EntitySchema::new(definition)?;
            registry.register(
                ResourceService::new(schema, store.clone()).with_store_timeout(store_timeout),
            )?;
        }
        Ok(registry)
    }

    /// The built-in catalog plus any definitions read from `extra` (TOML).
    pub fn with_builtins(
        store: Arc<dyn RecordStore>,
        store_timeout: Duration,
        extra: Option<&str>,
    ) -> Result<Self, RegistryError> {
        let mut definitions = catalog::builtin_definitions();
        if let Some(contents) = extra {
            let file = DefinitionFile::parse(contents)?;
            info!(count = file.resources.len(), "Loaded resource definitions");
            definitions.extend(file.resources);
        }
        Self::from_definitions(definitions, store, store_timeout)
    }

    pub fn register(&mut self, service: ResourceService) -> Result<(), RegistryError> {
        let plural = service.schema().plural().to_string();
        if RESERVED_ROUTES.contains(&plural.as_str()) {
            return Err(RegistryError::ReservedName(plural));
        }
        if self.services.contains_key(&plural) {
            return Err(RegistryError::Duplicate(plural));
        }
        self.services.insert(plural, service);
        Ok(())
    }

    pub fn get(&self, plural: &str) -> Option<&ResourceService> {
        self.services.get(plural)
    }

    pub fn services(&self) -> impl Iterator<Item = &ResourceService> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use db::MemoryRecordStore;

    use super::*;
    use crate::services::schema::{FieldSpec, FieldType};

    fn store() -> Arc<dyn RecordStore> {
        Arc::new(MemoryRecordStore::new())
    }

    #[test]
    fn builtins_are_mounted_by_plural() {
        let registry =
            ResourceRegistry::with_builtins(store(), Duration::from_secs(1), None).unwrap();
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.get("leads").unwrap().schema().name(), "lead");
        assert!(registry.get("lead").is_none());
    }

    #[test]
    fn extra_definitions_extend_the_catalog() {
        let extra = r#"
            [[resources]]
            name = "ticket"
            plural = "tickets"

            [[resources.fields]]
            name = "title"
            type = "string"
            required = true
        "#;
        let registry =
            ResourceRegistry::with_builtins(store(), Duration::from_secs(1), Some(extra))
                .unwrap();
        assert_eq!(registry.len(), 11);
        assert!(registry.get("tickets").is_some());
    }

    #[test]
    fn duplicate_and_reserved_plurals_are_rejected() {
        let def = |plural: &str| SchemaDefinition {
            name: "thing".to_string(),
            plural: plural.to_string(),
            group_key: None,
            fields: vec![FieldSpec::required("title", FieldType::String)],
        };
        let err = ResourceRegistry::from_definitions(
            [def("things"), def("things")],
            store(),
            Duration::from_secs(1),
        )
        .err()
        .unwrap();
        assert!(matches!(err, RegistryError::Duplicate(p) if p == "things"));

        let err =
            ResourceRegistry::from_definitions([def("health")], store(), Duration::from_secs(1))
                .err()
                .unwrap();
        assert!(matches!(err, RegistryError::ReservedName(_)));
    }

    #[test]
    fn malformed_definition_file_is_an_error() {
        let err = ResourceRegistry::with_builtins(
            store(),
            Duration::from_secs(1),
            Some("[[resources]]\nname = 3"),
        )
        .err()
        .unwrap();
        assert!(matches!(err, RegistryError::Parse(_)));
    }
}
