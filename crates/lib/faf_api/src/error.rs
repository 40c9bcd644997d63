//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use faf_core::accounts::{AccountError, ErrorDetail};
use thiserror::Error;
use tracing::error;

use crate::models::{ErrorResponse, ErrorsResponse};

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    /// A business rule rejected the request.
    #[error("Rejected: {}", .0.detail)]
    Rejected(ErrorDetail),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Mail delivery or the Steam gateway failed.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::Rejected(detail) => {
                let body = Json(ErrorsResponse {
                    errors: vec![detail],
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m),
            AppError::Upstream(m) => (StatusCode::BAD_GATEWAY, "upstream_error", m),
            AppError::Internal(m) => {
                error!("internal error: {m}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });
        (status, body).into_response()
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        if let Some(detail) = e.detail() {
            return AppError::Rejected(detail);
        }
        match e {
            AccountError::MailError(msg) | AccountError::SteamError(msg) => AppError::Upstream(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_become_rejections() {
        let err = AppError::from(AccountError::UsernameTaken("Player1".into()));
        match err {
            AppError::Rejected(detail) => {
                assert_eq!(detail.code, "102");
                assert!(detail.detail.contains("Player1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn collaborator_failures_map_to_upstream() {
        assert!(matches!(
            AppError::from(AccountError::MailError("smtp".into())),
            AppError::Upstream(_)
        ));
        assert!(matches!(
            AppError::from(AccountError::SteamError("timeout".into())),
            AppError::Upstream(_)
        ));
        assert!(matches!(
            AppError::from(AccountError::Internal("boom".into())),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn status_codes() {
        let cases = [
            (
                AppError::from(AccountError::TokenInvalid),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
