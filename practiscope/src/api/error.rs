//! Mapping of core errors onto HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use practiscope_core::{Error, ErrorKind};
use serde_json::json;

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(Error::validation("body", rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match (&self.0, self.0.kind()) {
            (Error::Timeout(_), _) => StatusCode::GATEWAY_TIMEOUT,
            (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::Aggregation) | (_, ErrorKind::Internal) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            Error::Validation { field, message } => json!({
                "error": "validation",
                "field": field,
                "message": message,
            }),
            Error::NotFound { entity, id } => json!({
                "error": "not_found",
                "entity": entity,
                "id": id,
            }),
            other => {
                tracing::error!(error = %other, "Request failed");
                let code = match other.kind() {
                    ErrorKind::Aggregation => "aggregation",
                    _ => "internal",
                };
                json!({ "error": code, "message": other.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(Error::validation("childId", "is required")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(Error::not_found("attempt", 3)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(Error::Timeout(100)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError(Error::Aggregation("boom".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
