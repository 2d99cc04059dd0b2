use appin_common::error::AppinError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub struct ApiError(pub AppinError);

impl From<AppinError> for ApiError {
    fn from(err: AppinError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppinError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppinError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppinError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %self.0, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
