use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    #[error("Password reuse rejected")]
    ReuseRejected,

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<i64>,
}

impl AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Expired(_) => "EXPIRED",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::ReuseRejected => "PASSWORD_REUSED",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Crypto(_) => "CRYPTO_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Redis(_) => "CACHE_ERROR",
            AppError::Email(_) => "EMAIL_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for server-side failures whose message must not reach the client.
    fn is_server_side(&self) -> bool {
        matches!(
            self,
            AppError::Crypto(_)
                | AppError::Database(_)
                | AppError::Redis(_)
                | AppError::Email(_)
                | AppError::Internal(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Expired(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ReuseRejected => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Crypto(_)
            | AppError::Database(_)
            | AppError::Redis(_)
            | AppError::Email(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_server_side() {
            tracing::error!(error = %self, "request failed with server-side error");
        }

        let message = if self.is_server_side() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let retry_after_secs = match self {
            AppError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.error_code(),
            message,
            retry_after_secs,
        })
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Expired("token expired".to_string())
            }
            _ => AppError::InvalidState("invalid token".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_maps_to_429() {
        let err = AppError::RateLimited {
            retry_after_secs: 300,
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn server_side_errors_hide_details() {
        let err = AppError::Internal("pool exhausted on pg-7".to_string());
        assert!(err.is_server_side());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn expired_jwt_maps_to_expired() {
        let err: AppError = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        )
        .into();
        assert!(matches!(err, AppError::Expired(_)));
    }

    #[test]
    fn invalid_jwt_maps_to_invalid_state() {
        let err: AppError =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature)
                .into();
        assert!(matches!(err, AppError::InvalidState(_)));
    }
}
