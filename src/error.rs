use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::middleware::bearer_auth::resource_metadata_challenge;

/// The OAuth 2.1 error taxonomy this crate works in. Every endpoint maps its
/// failures onto one of these before they reach `IntoResponse`. The two
/// token-rejection variants carry the issuer so their 401 response can
/// advertise `resource_metadata`, since `IntoResponse` has no other way to
/// reach `AppState`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),
    #[error("invalid_client: {0}")]
    InvalidClient(String),
    #[error("invalid_scope: {0}")]
    InvalidScope(String),
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),
    #[error("invalid_token: {message}")]
    InvalidToken { message: String, issuer: String },
    #[error("token_not_found: {0}")]
    TokenNotFound(String),
    #[error("insufficient_scope: {0}")]
    InsufficientScope(String),
    #[error("upstream token invalid")]
    UpstreamTokenInvalid { issuer: String },
    #[error("upstream error: {0}")]
    UpstreamError(u16),
    #[error("upstream call timed out")]
    UpstreamTimeout,
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("internal server error: {0}")]
    ServerError(String),
}

impl AppError {
    pub fn invalid_token(message: impl Into<String>, issuer: impl Into<String>) -> Self {
        AppError::InvalidToken {
            message: message.into(),
            issuer: issuer.into(),
        }
    }

    pub fn upstream_token_invalid(issuer: impl Into<String>) -> Self {
        AppError::UpstreamTokenInvalid {
            issuer: issuer.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OAuthErrorBody {
    error: &'static str,
    error_description: String,
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::InvalidGrant(_) => "invalid_grant",
            AppError::InvalidClient(_) => "invalid_client",
            AppError::InvalidScope(_) => "invalid_scope",
            AppError::UnsupportedGrantType(_) => "unsupported_grant_type",
            AppError::InvalidToken { .. } => "invalid_token",
            AppError::TokenNotFound(_) => "token_not_found",
            AppError::InsufficientScope(_) => "insufficient_scope",
            AppError::UpstreamTokenInvalid { .. } => "privy_token_invalid",
            AppError::UpstreamError(_) => "upstream_error",
            AppError::UpstreamTimeout => "upstream_timeout",
            AppError::StorageError(_) => "server_error",
            AppError::ServerError(_) => "server_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_)
            | AppError::InvalidGrant(_)
            | AppError::InvalidClient(_)
            | AppError::InvalidScope(_)
            | AppError::UnsupportedGrantType(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidToken { .. } | AppError::UpstreamTokenInvalid { .. } => {
                StatusCode::UNAUTHORIZED
            }
            AppError::TokenNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientScope(_) => StatusCode::FORBIDDEN,
            AppError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::StorageError(_) | AppError::ServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_description(&self) -> String {
        match self {
            AppError::UpstreamTokenInvalid { .. } => {
                "Your connection has expired. Please sign in again.".to_string()
            }
            AppError::StorageError(_) | AppError::ServerError(_) => {
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    /// The `WWW-Authenticate` header value for a 401 response, carrying
    /// `resource_metadata` per the protected-resource discovery flow. The
    /// header's `error` attribute is always `invalid_token` even for
    /// `UpstreamTokenInvalid`, whose JSON body still reports the more
    /// specific `privy_token_invalid` code.
    fn www_authenticate(&self, issuer: &str) -> Option<String> {
        match self {
            AppError::InvalidToken { .. } | AppError::UpstreamTokenInvalid { .. } => {
                Some(format!(
                    "{}, error=\"invalid_token\", error_description=\"{}\"",
                    resource_metadata_challenge(issuer),
                    self.public_description()
                ))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::StorageError(detail) | AppError::ServerError(detail) => {
                tracing::error!(error = %detail, "request failed with server error")
            }
            AppError::UpstreamError(status) => {
                tracing::error!(upstream_status = status, "upstream call failed")
            }
            AppError::UpstreamTimeout => tracing::error!("upstream call timed out"),
            other => tracing::warn!(error = %other, "request rejected"),
        }

        let challenge = match &self {
            AppError::InvalidToken { issuer, .. } | AppError::UpstreamTokenInvalid { issuer } => {
                self.www_authenticate(issuer)
            }
            _ => None,
        };

        let body = OAuthErrorBody {
            error: self.code(),
            error_description: self.public_description(),
        };
        let mut response = (self.status(), Json(body)).into_response();
        if let Some(value) = challenge.and_then(|v| HeaderValue::from_str(&v).ok()) {
            response.headers_mut().insert(axum::http::header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

impl From<crate::repositories::RepositoryError> for AppError {
    fn from(err: crate::repositories::RepositoryError) -> Self {
        AppError::StorageError(err.to_string())
    }
}

/// Maps an upstream call failure onto the OAuth error taxonomy. Takes the
/// issuer explicitly since `UpstreamTokenInvalid` needs it to build its 401
/// `WWW-Authenticate` challenge and `UpstreamError` carries no state of its
/// own.
pub fn map_upstream_error(err: crate::upstream::UpstreamError, issuer: &str) -> AppError {
    match err {
        crate::upstream::UpstreamError::TokenInvalid => AppError::upstream_token_invalid(issuer),
        crate::upstream::UpstreamError::Status(code) => AppError::UpstreamError(code),
        crate::upstream::UpstreamError::Timeout => AppError::UpstreamTimeout,
        crate::upstream::UpstreamError::Transport(detail) => AppError::ServerError(detail),
    }
}
