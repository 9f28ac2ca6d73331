use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::StoreError;
use services::services::resource::{ResourceError, format_field_errors};
use thiserror::Error;
use tracing::error;

use crate::response::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{resource}: {source}")]
    Resource {
        resource: String,
        #[source]
        source: ResourceError,
    },
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("route not found")]
    RouteNotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("storage is unreachable")]
    StoreUnreachable,
}

impl ApiError {
    /// Tags a service failure with the singular resource name used in
    /// client-facing messages.
    pub fn from_resource(resource: &str) -> impl FnOnce(ResourceError) -> Self + use<> {
        let resource = resource.to_string();
        move |source| Self::Resource { resource, source }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Resource { resource, source } => match source {
                ResourceError::Invalid(errors) => (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        error: format!("invalid {resource}: {}", format_field_errors(&errors)),
                        details: Some(errors),
                    },
                ),
                ResourceError::EmptyUpdate => (
                    StatusCode::BAD_REQUEST,
                    ErrorBody::new("no fields provided for update"),
                ),
                ResourceError::NotFound => (
                    StatusCode::NOT_FOUND,
                    ErrorBody::new(format!("{resource} not found")),
                ),
                ResourceError::Store(e) => {
                    error!(resource = %resource, error = %e, "Store operation failed");
                    let message = match e {
                        StoreError::Unavailable(_) => "storage is unavailable",
                        _ => "internal server error",
                    };
                    (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(message))
                }
            },
            ApiError::UnknownResource(_) | ApiError::RouteNotFound => {
                (StatusCode::NOT_FOUND, ErrorBody::new(self.to_string()))
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, ErrorBody::new(message)),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorBody::new(self.to_string()),
            ),
            ApiError::StoreUnreachable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::new(self.to_string()),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::{Value, json};
    use services::services::validator::{FieldError, FieldErrorReason};

    use super::*;

    async fn render(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let (status, body) = render(ApiError::from_resource("lead")(ResourceError::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "lead not found"}));
    }

    #[tokio::test]
    async fn invalid_payload_lists_details() {
        let error = ApiError::from_resource("lead")(ResourceError::Invalid(vec![FieldError::new(
            "amount",
            FieldErrorReason::MissingField,
        )]));
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid lead: amount is required");
        assert_eq!(
            body["details"],
            json!([{"field": "amount", "reason": {"kind": "missing_field"}}])
        );
    }

    #[tokio::test]
    async fn store_failures_hide_detail() {
        let error = ApiError::from_resource("lead")(ResourceError::Store(
            StoreError::Unavailable("pool timed out after 5s at /var/db".to_string()),
        ));
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "storage is unavailable"}));
    }
}
