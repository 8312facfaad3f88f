//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use storefleet_core::Error;

/// Error returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    Core(Error),
    Timeout(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Core(Error::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::Core(Error::StoreNotFound(_)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Store not found".to_string(),
            ),
            ApiError::Core(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, error = %error, "Request failed");
        }
        (status, Json(ErrorResponse { error, code })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(Error::validation("Store name is required")), StatusCode::BAD_REQUEST),
            (ApiError::from(Error::StoreNotFound("abc".to_string())), StatusCode::NOT_FOUND),
            (ApiError::from(Error::LockPoisoned), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Timeout("slow".to_string()), StatusCode::GATEWAY_TIMEOUT),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
