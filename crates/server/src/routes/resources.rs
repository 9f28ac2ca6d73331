use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use db::models::record::Fields;
use services::services::{resource::ResourceService, schema::SchemaDefinition};
use uuid::Uuid;

use crate::{
    error::ApiError,
    extract::{JsonObject, Params, parse_id},
    response::{BulkDeleteBody, MessageBody},
    state::AppState,
};

/// GET /api/resources
pub async fn list_definitions(State(state): State<AppState>) -> Json<Vec<SchemaDefinition>> {
    Json(
        state
            .registry()
            .services()
            .map(|service| service.schema().definition().clone())
            .collect(),
    )
}

/// POST /api/{resource}
pub async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    JsonObject(payload): JsonObject,
) -> Result<Response, ApiError> {
    let service = state.resource(&resource)?;
    let record = service
        .create(payload)
        .await
        .map_err(ApiError::from_resource(service.schema().name()))?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

/// GET /api/{resource}
/// Single record with `?id=`, otherwise a filtered, sorted page.
pub async fn read(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    params: Params,
) -> Result<Response, ApiError> {
    let service = state.resource(&resource)?;
    match params.id()? {
        Some(id) => fetch(service, id).await,
        None => {
            let records = service
                .list_with_params(&params.0)
                .await
                .map_err(ApiError::from_resource(service.schema().name()))?;
            Ok(Json(records).into_response())
        }
    }
}

/// PUT /api/{resource}?id=
pub async fn update_by_query(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    params: Params,
    JsonObject(payload): JsonObject,
) -> Result<Response, ApiError> {
    let service = state.resource(&resource)?;
    let id = params.id()?.ok_or_else(missing_id)?;
    update(service, id, payload).await
}

/// DELETE /api/{resource}?id= or DELETE /api/{resource}?{groupKey}=
pub async fn delete_by_query(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    params: Params,
) -> Result<Response, ApiError> {
    let service = state.resource(&resource)?;
    if let Some(id) = params.id()? {
        return delete(service, id).await;
    }

    let group = service
        .schema()
        .group_key()
        .and_then(|key| params.get(key));
    let Some(group) = group else {
        return Err(missing_id());
    };
    let count = service
        .delete_group(group)
        .await
        .map_err(ApiError::from_resource(service.schema().name()))?;
    Ok(Json(BulkDeleteBody {
        message: format!("{count} {} deleted", service.schema().plural()),
        count,
    })
    .into_response())
}

/// GET /api/{resource}/{id}
pub async fn get_member(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let service = state.resource(&resource)?;
    fetch(service, parse_id(&id)?).await
}

/// PUT /api/{resource}/{id}
pub async fn update_member(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    JsonObject(payload): JsonObject,
) -> Result<Response, ApiError> {
    let service = state.resource(&resource)?;
    update(service, parse_id(&id)?, payload).await
}

/// DELETE /api/{resource}/{id}
pub async fn delete_member(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let service = state.resource(&resource)?;
    delete(service, parse_id(&id)?).await
}

async fn fetch(service: &ResourceService, id: Uuid) -> Result<Response, ApiError> {
    let record = service
        .get(id)
        .await
        .map_err(ApiError::from_resource(service.schema().name()))?;
    Ok(Json(record).into_response())
}

async fn update(
    service: &ResourceService,
    id: Uuid,
    payload: Fields,
) -> Result<Response, ApiError> {
    let record = service
        .update(id, payload)
        .await
        .map_err(ApiError::from_resource(service.schema().name()))?;
    Ok(Json(record).into_response())
}

async fn delete(service: &ResourceService, id: Uuid) -> Result<Response, ApiError> {
    let name = service.schema().name();
    service
        .delete(id)
        .await
        .map_err(ApiError::from_resource(name))?;
    Ok(Json(MessageBody {
        message: format!("{name} deleted successfully"),
    })
    .into_response())
}

fn missing_id() -> ApiError {
    ApiError::BadRequest("missing id parameter".to_string())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resources", get(list_definitions))
        .route(
            "/{resource}",
            get(read)
                .post(create)
                .put(update_by_query)
                .delete(delete_by_query),
        )
        .route(
            "/{resource}/{id}",
            get(get_member).put(update_member).delete(delete_member),
        )
}
