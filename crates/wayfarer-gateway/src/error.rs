use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use wayfarer_core::error::WayfarerError;
use wayfarer_core::types::ErrorPayload;

/// Errors returned by the HTTP handlers, rendered as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    BadBody { status: StatusCode, message: String },

    #[error("Model returned invalid JSON")]
    MalformedOutput { raw: String },

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadBody { status, .. } => *status,
            ApiError::MalformedOutput { .. } | ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorPayload {
            error: self.to_string(),
            raw: match self {
                ApiError::MalformedOutput { raw } => Some(raw),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<WayfarerError> for ApiError {
    fn from(e: WayfarerError) -> Self {
        match e {
            WayfarerError::Validation(msg) => ApiError::Validation(msg),
            WayfarerError::Provider(msg) => ApiError::Upstream(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::MalformedOutput { raw: "x".into() }.status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_from_core_error() {
        let err: ApiError = WayfarerError::Validation("budget must not be negative".into()).into();
        assert!(matches!(err, ApiError::Validation(ref m) if m.contains("budget")));
    }

    #[test]
    fn test_malformed_output_message() {
        let err = ApiError::MalformedOutput { raw: "oops".into() };
        assert_eq!(err.to_string(), "Model returned invalid JSON");
    }
}
