use axum::Router;

use crate::{error::ApiError, state::AppState};

pub mod health;
pub mod resources;

pub fn router() -> Router<AppState> {
    let api = Router::new()
        .merge(health::router())
        .merge(resources::router());

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
}

async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
