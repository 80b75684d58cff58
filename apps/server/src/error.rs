use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

use crate::models::{ActionType, Platform};

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

// =============================================================================
// Platform Errors
// =============================================================================

/// Failures raised while talking to a social platform.
///
/// Transport and provider failures come from the HTTP executor; the remaining
/// variants are raised locally by adapters before any request is made.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlatformError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by provider: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error(
        "Rate limit reached for {platform} {action} actions. Retry after {retry_after} seconds (resets at {reset_at})"
    )]
    LimitReached {
        platform: Platform,
        action: ActionType,
        retry_after: u64,
        reset_at: String,
    },

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{platform} account requires re-authentication: {reason}")]
    ReauthRequired { platform: Platform, reason: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Invalid OAuth state: {0}")]
    InvalidState(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("{0} integration is not configured")]
    NotConfigured(Platform),
}

impl PlatformError {
    /// True for failures the executor retries: transport errors, 429 and 502/503/504.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::Network(_) | PlatformError::RateLimited { .. } => true,
            PlatformError::Server { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// True when the user must reconnect the account.
    pub fn is_reauth(&self) -> bool {
        matches!(self, PlatformError::ReauthRequired { .. })
    }

    /// Folds provider rejections during an OAuth exchange into `Auth`.
    pub fn into_auth(self) -> Self {
        match self {
            PlatformError::BadRequest(msg)
            | PlatformError::Forbidden(msg)
            | PlatformError::NotFound(msg) => PlatformError::Auth(msg),
            PlatformError::Api { message, .. } => PlatformError::Auth(message),
            other => other,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PlatformError::Validation(_)
            | PlatformError::BadRequest(_)
            | PlatformError::InvalidState(_) => StatusCode::BAD_REQUEST,
            PlatformError::Auth(_) | PlatformError::ReauthRequired { .. } => {
                StatusCode::UNAUTHORIZED
            }
            PlatformError::Forbidden(_) => StatusCode::FORBIDDEN,
            PlatformError::NotFound(_) | PlatformError::UnknownPlatform(_) => {
                StatusCode::NOT_FOUND
            }
            PlatformError::RateLimited { .. } | PlatformError::LimitReached { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            PlatformError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            PlatformError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            PlatformError::Network(_)
            | PlatformError::Server { .. }
            | PlatformError::Api { .. }
            | PlatformError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            PlatformError::Network(_) => "NetworkError",
            PlatformError::BadRequest(_) => "BadRequest",
            PlatformError::Auth(_) => "AuthError",
            PlatformError::Forbidden(_) => "Forbidden",
            PlatformError::NotFound(_) => "NotFound",
            PlatformError::RateLimited { .. } => "RateLimited",
            PlatformError::Server { .. } => "ServerError",
            PlatformError::Api { .. } => "ApiError",
            PlatformError::LimitReached { .. } => "RateLimitReached",
            PlatformError::Validation(_) => "ValidationError",
            PlatformError::ReauthRequired { .. } => "ReauthRequired",
            PlatformError::Unsupported(_) => "Unsupported",
            PlatformError::UnknownPlatform(_) => "UnknownPlatform",
            PlatformError::InvalidState(_) => "InvalidState",
            PlatformError::InvalidResponse(_) => "InvalidResponse",
            PlatformError::NotConfigured(_) => "NotConfigured",
        }
    }
}

// =============================================================================
// Application Errors
// =============================================================================

/// Application errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Platform(e) => e.status_code(),
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_type = match self {
            AppError::NotFound(_) => "NotFound",
            AppError::Validation(_) => "ValidationError",
            AppError::Conflict(_) => "Conflict",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Database(_) => "DatabaseError",
            AppError::Platform(e) => e.error_type(),
            AppError::Internal(_) => "InternalError",
        };

        let response = ErrorResponse {
            error: ErrorDetail {
                error_type: error_type.to_string(),
                message: self.to_string(),
            },
        };

        HttpResponse::build(self.status_code()).json(response)
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
