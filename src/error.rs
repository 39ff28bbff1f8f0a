use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not eligible: {0}")]
    Eligibility(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Gift card vendor unavailable: {0}")]
    VendorUnavailable(String),

    #[error("Gift card vendor protocol error: {0}")]
    VendorProtocol(String),

    #[error("Email dispatch failed: {0}")]
    EmailDispatch(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Whether a caller may safely retry the failed operation.
    ///
    /// Vendor transport failures are retryable because every vendor call is
    /// idempotent (stable creation request ids). A protocol error means the
    /// vendor contract changed under us; retrying won't help.
    pub fn retryable(&self) -> bool {
        matches!(self, AppError::VendorUnavailable(_))
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::Eligibility(msg) => {
                log::warn!("Eligibility check failed: {msg}");
                (
                    actix_web::http::StatusCode::BAD_REQUEST,
                    "NOT_ELIGIBLE",
                    msg.clone(),
                )
            }
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
            ),
            AppError::PermissionDenied => {
                log::warn!("Permission denied");
                (
                    actix_web::http::StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "Permission denied".to_string(),
                )
            }
            // Never leak vendor internals to the end user; the entry stays
            // unissued and the same validation link can be visited again.
            AppError::VendorUnavailable(msg) => {
                log::error!("Gift card vendor unavailable: {msg}");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "PRIZE_UNAVAILABLE",
                    "Something went wrong issuing your prize. Please try again later.".to_string(),
                )
            }
            AppError::VendorProtocol(msg) => {
                log::error!("Gift card vendor protocol error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "PRIZE_UNAVAILABLE",
                    "Something went wrong issuing your prize. Please try again later.".to_string(),
                )
            }
            AppError::EmailDispatch(msg) => {
                log::error!("Email dispatch failed: {msg}");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "EMAIL_ERROR",
                    "We could not send the email. Please try again later.".to_string(),
                )
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_unavailable_is_retryable() {
        assert!(AppError::VendorUnavailable("timeout".into()).retryable());
    }

    #[test]
    fn test_other_errors_are_not_retryable() {
        assert!(!AppError::VendorProtocol("bad shape".into()).retryable());
        assert!(!AppError::Eligibility("wrong school".into()).retryable());
        assert!(!AppError::EmailDispatch("bounced".into()).retryable());
    }
}
