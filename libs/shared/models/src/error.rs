use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Hospital search failed: {0}")]
    SearchFailed(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Lookup in progress: {0}")]
    LookupInProgress(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::LocationUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SearchFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidTransition(_) | AppError::LookupInProgress(_) => StatusCode::CONFLICT,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::LocationUnavailable(_) => "location_unavailable",
            AppError::SearchFailed(_) => "search_failed",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::LookupInProgress(_) => "lookup_in_progress",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::LocationUnavailable(msg)
            | AppError::SearchFailed(msg)
            | AppError::InvalidTransition(msg)
            | AppError::LookupInProgress(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();

        tracing::error!("Error: {}: {}", status, message);

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_locator_failures_to_distinct_statuses() {
        assert_eq!(
            AppError::LocationUnavailable("denied".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::SearchFailed("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AppError::InvalidTransition("x".into()).code(), "invalid_transition");
    }

    #[test]
    fn every_variant_is_a_client_or_gateway_error() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "bad_request"),
            (
                AppError::LocationUnavailable("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "location_unavailable",
            ),
            (AppError::SearchFailed("x".into()), StatusCode::BAD_GATEWAY, "search_failed"),
            (AppError::InvalidTransition("x".into()), StatusCode::CONFLICT, "invalid_transition"),
            (AppError::LookupInProgress("x".into()), StatusCode::CONFLICT, "lookup_in_progress"),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status_code(), status);
            assert_eq!(error.code(), code);
            assert!(!error.status_code().is_server_error() || status == StatusCode::BAD_GATEWAY);
        }
    }
}
