//! Error types for CodeIQ
//!
//! Every failure a handler can produce is an `AppError`. Its
//! `IntoResponse` impl is the only place that turns a failure into an
//! HTTP status and a `{ error, code }` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Each variant carries a fixed HTTP status and a stable machine-readable
/// code. Clients branch on `code`; `error` is for humans.
#[derive(Debug, Error)]
pub enum AppError {
    /// No `jwt` cookie was presented (401)
    #[error("No authentication token provided")]
    NoToken,

    /// Access token failed signature, expiry, issuer or audience checks (401)
    #[error("Invalid authentication token")]
    InvalidToken,

    /// No `refresh` cookie was presented (401)
    #[error("No refresh token provided")]
    NoRefreshToken,

    /// Refresh secret does not resolve to a live session (401)
    #[error("No active session found")]
    NoActiveSession,

    /// User row or its upstream GitHub token is missing (401)
    #[error("No access token found")]
    AccessTokenMissing,

    /// Upstream GitHub token is stale and could not be refreshed (401)
    #[error("Access token expired and refresh failed")]
    TokenExpiredRefreshFailed,

    /// GitHub rejected the authorization code (400)
    #[error("Invalid authorization code")]
    InvalidAuthCode,

    /// GitHub returned a profile without an id (400)
    #[error("Invalid user data from GitHub")]
    InvalidUserData,

    /// No user with the requested id (404)
    #[error("User not found")]
    UserNotFound,

    /// The GitHub App is not installed for this user (404)
    #[error("Installation not found")]
    InstallationNotFound,

    /// No route matches the request path (404)
    #[error("Endpoint not found")]
    NotFound,

    /// Too many auth attempts from one client (429)
    #[error("Too many authentication attempts")]
    RateLimited,

    /// GitHub token or user endpoint failed or timed out (502)
    #[error("GitHub is unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Persistence failure (500)
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    /// Configuration error (500, startup only)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::UpstreamUnavailable("request timed out".to_string())
        } else {
            AppError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl AppError {
    /// HTTP status for this failure
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoToken
            | AppError::InvalidToken
            | AppError::NoRefreshToken
            | AppError::NoActiveSession
            | AppError::AccessTokenMissing
            | AppError::TokenExpiredRefreshFailed => StatusCode::UNAUTHORIZED,
            AppError::InvalidAuthCode | AppError::InvalidUserData => StatusCode::BAD_REQUEST,
            AppError::UserNotFound | AppError::InstallationNotFound | AppError::NotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable code carried in the response body
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NoToken => "NO_TOKEN",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::NoRefreshToken => "NO_REFRESH_TOKEN",
            AppError::NoActiveSession => "NO_ACTIVE_SESSION",
            AppError::AccessTokenMissing => "NO_ACCESS_TOKEN",
            AppError::TokenExpiredRefreshFailed => "TOKEN_EXPIRED_REFRESH_FAILED",
            AppError::InvalidAuthCode => "INVALID_AUTH_CODE",
            AppError::InvalidUserData => "INVALID_USER_DATA",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::InstallationNotFound => "INSTALLATION_NOT_FOUND",
            AppError::NotFound => "NOT_FOUND",
            AppError::RateLimited => "RATE_LIMIT_EXCEEDED",
            AppError::UpstreamUnavailable(_) => "GITHUB_UNAVAILABLE",
            AppError::Store(_) => "DB_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the client
    ///
    /// Server-side failures never leak their cause.
    pub fn user_message(&self) -> String {
        match self {
            AppError::UpstreamUnavailable(_) => "GitHub request failed".to_string(),
            AppError::Store(_) => "Database error".to_string(),
            AppError::Config(_) | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let code = self.code();

        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, code, "Request failed");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[code]).inc();

        let body = Json(serde_json::json!({
            "error": self.user_message(),
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
