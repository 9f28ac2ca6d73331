use axum::{Json, Router, extract::State, routing::get};
use tracing::warn;

use crate::{error::ApiError, response::HealthBody, state::AppState};

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthBody>, ApiError> {
    let store = match state.db() {
        Some(db) => {
            if let Err(e) = db.ping().await {
                warn!(error = %e, "Health check could not reach the database");
                return Err(ApiError::StoreUnreachable);
            }
            "sqlite"
        }
        None => "memory",
    };
    Ok(Json(HealthBody {
        status: "ok".to_string(),
        store: store.to_string(),
        resources: state.registry().len(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
