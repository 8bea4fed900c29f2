//! Mapping from core failures to HTTP responses.
//!
//! Bodies never carry internal detail: internal failures are logged and answered with a
//! generic message, both credential failures share one 401 body and every 403 carries
//! the same body whichever check refused the caller.

use api_shared::auth::AuthError;
use api_shared::ErrorRes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use medhelp_core::{CoreError, ErrorKind};

pub const INVALID_CREDENTIALS: &str = "invalid username or password";
pub const INTERNAL_ERROR: &str = "internal error";
pub const ACCESS_DENIED: &str = "access denied";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(reason: impl std::fmt::Display) -> Self {
        tracing::debug!("access denied: {}", reason);
        Self::new(StatusCode::FORBIDDEN, ACCESS_DENIED)
    }

    pub fn internal(context: &str, error: impl std::fmt::Debug) -> Self {
        tracing::error!("{} error: {:?}", context, error);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err.kind() {
            ErrorKind::Unauthorized => match err {
                CoreError::UserNotFound | CoreError::BadCredentials => {
                    Self::new(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS)
                }
                _ => Self::new(StatusCode::UNAUTHORIZED, "invalid or expired token"),
            },
            ErrorKind::Forbidden => Self::forbidden(err),
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            ErrorKind::Conflict => Self::new(StatusCode::CONFLICT, err.to_string()),
            ErrorKind::BadInput => Self::bad_request(err.to_string()),
            ErrorKind::Internal => Self::internal("core", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorRes {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medhelp_core::{ReferralId, TokenError};

    #[test]
    fn credential_errors_share_one_body() {
        let a = ApiError::from(CoreError::UserNotFound);
        let b = ApiError::from(CoreError::BadCredentials);
        assert_eq!(a.status, StatusCode::UNAUTHORIZED);
        assert_eq!(a.status, b.status);
        assert_eq!(a.message, INVALID_CREDENTIALS);
        assert_eq!(a.message, b.message);
    }

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(
            ApiError::from(CoreError::Token(TokenError::Expired)).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::from(CoreError::RegistrarOnly).status, StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(CoreError::ReferralNotFound(ReferralId::new(1))).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::from(CoreError::UsernameTaken).status, StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(CoreError::InvalidInput("x".into())).status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn forbidden_errors_share_one_body() {
        let role = ApiError::from(CoreError::RegistrarOnly);
        let owner = ApiError::from(CoreError::ReferralForbidden(ReferralId::new(4)));
        assert_eq!(role.status, StatusCode::FORBIDDEN);
        assert_eq!(owner.status, StatusCode::FORBIDDEN);
        assert_eq!(role.message, ACCESS_DENIED);
        assert_eq!(owner.message, ACCESS_DENIED);
    }

    #[test]
    fn internal_errors_hide_detail() {
        let err = ApiError::from(CoreError::AccountNotLinked("smith".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, INTERNAL_ERROR);
    }
}
