//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mailsift_core::error::{ErrorClass, MailSiftError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The user's mailbox rejected us or could not be reached.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("API error: {self}");
        }
        (status, Json(serde_json::json!({"ok": false, "error": self.to_string()}))).into_response()
    }
}

impl From<MailSiftError> for ApiError {
    fn from(err: MailSiftError) -> Self {
        let msg = err.to_string();
        match err {
            MailSiftError::NotFound(_) => Self::NotFound(msg),
            MailSiftError::AlreadyScheduled(_) => Self::Conflict(msg),
            _ => match err.class() {
                ErrorClass::Config | ErrorClass::Informational => Self::BadRequest(msg),
                ErrorClass::Transient => Self::Upstream(msg),
                _ => Self::Internal(msg),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(MailSiftError::NotFound("user x".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(MailSiftError::AlreadyScheduled("u1".into())).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(MailSiftError::NoSuchGroup("30".into())).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(MailSiftError::Auth("bad".into())).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::from(MailSiftError::Storage("io".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
