//! Error types for fedreg-server
//!
//! Every handler returns [`ApiResult`]; errors render as the standard
//! `{code, message, data: null}` envelope with `code` equal to the HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fedreg_common::api::{ApiAuthError, ApiEnvelope};
use thiserror::Error;
use tracing::error;

use crate::services::diagnosis::DiagnosisError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// A collaborator (inference endpoint) failed (500)
    #[error("{0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// fedreg-common error
    #[error("{0}")]
    Common(#[from] fedreg_common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Common(fedreg_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Common(fedreg_common::Error::InvalidDate(_)) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_)
            | ApiError::Internal(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApiAuthError> for ApiError {
    fn from(err: ApiAuthError) -> Self {
        match err {
            ApiAuthError::Encoding(_) => ApiError::Internal(err.to_string()),
            _ => ApiError::Unauthorized(err.to_string()),
        }
    }
}

impl From<DiagnosisError> for ApiError {
    fn from(err: DiagnosisError) -> Self {
        match err {
            DiagnosisError::Validation(msg) => ApiError::BadRequest(msg),
            DiagnosisError::NotFound(_) => {
                ApiError::NotFound("Diagnosis record not found".to_string())
            }
            DiagnosisError::Upstream(_) => ApiError::Upstream(err.to_string()),
            DiagnosisError::Render(_) | DiagnosisError::Store(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(ApiEnvelope::<()>::error(status.as_u16(), self.to_string()));
        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Common(fedreg_common::Error::NotFound("m".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Common(fedreg_common::Error::InvalidDate("2024-13-01".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Upstream("down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_errors_are_unauthorized() {
        let err: ApiError = ApiAuthError::Expired.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Token has expired");
    }

    #[test]
    fn test_diagnosis_validation_is_bad_request() {
        let err: ApiError =
            DiagnosisError::Validation("Clinical information is required".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Clinical information is required");
    }
}
