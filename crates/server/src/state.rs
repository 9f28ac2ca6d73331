use std::sync::Arc;

use db::DBService;
use services::services::{registry::ResourceRegistry, resource::ResourceService};

use crate::error::ApiError;

/// Shared by every handler. `db` is `None` when records live in memory.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<ResourceRegistry>,
    db: Option<DBService>,
}

impl AppState {
    pub fn new(registry: ResourceRegistry, db: Option<DBService>) -> Self {
        Self {
            registry: Arc::new(registry),
            db,
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn db(&self) -> Option<&DBService> {
        self.db.as_ref()
    }

    pub fn resource(&self, plural: &str) -> Result<&ResourceService, ApiError> {
        self.registry
            .get(plural)
            .ok_or_else(|| ApiError::UnknownResource(plural.to_string()))
    }
}
