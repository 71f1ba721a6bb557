use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use guestbook_chat::ChatError;

/// REST rendering of an engine rejection: a status code plus
/// `{ "message": "…" }`, the same message the live gateway puts in an
/// `error_message` event.
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Unauthorized => StatusCode::UNAUTHORIZED,
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::TransportUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Store(detail) => {
                // Clients get the generic message only.
                error!("Store failure on REST request: {:#}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(serde_json::json!({ "message": self.0.to_string() }));
        (status, body).into_response()
    }
}
