//! Server error types and their HTTP mapping.
//!
//! Every failure leaves the server as `{"error": message}` with a status
//! code picked in [`ApiError::status`].

use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gramseva_types::api::ErrorResponse;
use gramseva_types::PolicyError;

/// Collection-store write failures. Read failures never surface.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {0}: {1}")]
    Serialize(String, #[source] serde_json::Error),
    #[error("{name} is unreadable; refusing to overwrite it: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Login and registration rejections. Messages are shown to users verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email, password, role or department.")]
    InvalidCredentials,
    #[error("{0}")]
    Blocked(&'static str),
    #[error("An account with this email already exists.")]
    DuplicateEmail,
    #[error("An account with this mobile number already exists.")]
    DuplicateMobile,
    #[error("Officer registration requires a registration key.")]
    MissingOfficerKey,
    #[error("Invalid officer registration key.")]
    InvalidOfficerKey,
    #[error("Officers must select a department.")]
    MissingDepartment,
    #[error("{0} is required.")]
    MissingField(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownCollection(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Auth(AuthError::Blocked(_)) => StatusCode::FORBIDDEN,
            ApiError::Auth(_) => StatusCode::BAD_REQUEST,
            ApiError::Policy(PolicyError::AlreadyPaid(_)) => StatusCode::CONFLICT,
            ApiError::Policy(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(AuthError::InvalidCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::Blocked("pending")).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(AuthError::DuplicateEmail).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(PolicyError::AlreadyPaid("BILL-1".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::UnknownCollection("widgets".into()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_blocked_message_is_verbatim() {
        let err = ApiError::from(AuthError::Blocked("Your account is pending."));
        assert_eq!(err.to_string(), "Your account is pending.");
    }
}
