use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::error;

use crate::security::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// A foreign key violation on delete means the row is still referenced.
    pub fn from_delete(err: DieselError, what: &str) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                Self::Conflict(format!("{what} is still referenced and cannot be deleted"))
            }
            other => other.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Conflict(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Unavailable(msg) => msg.clone(),
            // Internal details stay in the log.
            Self::Database(msg) | Self::Internal(msg) => {
                error!("[API] {status}: {msg}");
                "Internal server error".to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound("Record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Conflict(format!("Duplicate value: {}", info.message()))
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Self::Validation(format!("Referenced record missing or in use: {}", info.message()))
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                Self::Validation(info.message().to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Unavailable(format!("Database connection unavailable: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden(_) => Self::Forbidden(err.to_string()),
            _ => Self::Unauthorized(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::not_found("Task").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation("bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("dup").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Database("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_diesel_not_found_maps_to_404() {
        let err: ApiError = DieselError::NotFound.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_auth_error_mapping() {
        let err: ApiError = AuthError::MissingToken.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err: ApiError = AuthError::Forbidden("payments.approve".into()).into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_from_delete_passes_through_not_found() {
        let err = ApiError::from_delete(DieselError::NotFound, "Project");
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(ApiError::not_found("Thread").to_string(), "Not found: Thread not found");
    }
}
