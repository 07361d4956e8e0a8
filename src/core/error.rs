use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

use crate::payment::GatewayError;
use crate::web::models::ErrorResponse;

/// Error type shared by the store, payment and web layers
#[derive(Debug, Error)]
pub enum AppError {
    /// Request failed validation
    #[error("{0}")]
    BadRequest(String),
    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated, but the role may not perform the action
    #[error("{0}")]
    Forbidden(String),
    /// Referenced row does not exist
    #[error("{0}")]
    NotFound(String),
    /// Row changed underneath the request (stock, availability)
    #[error("{0}")]
    Conflict(String),
    /// Storage failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Payment gateway failure
    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Machine readable code carried in the error envelope
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Gateway(_) => "PAYMENT_GATEWAY_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Failed to encode or decode JSON: {}", err))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Storage details never leave the process
        let message = match self {
            AppError::Database(e) => {
                error!("Database failure: {:?}", e);
                "Internal Server Error".to_string()
            }
            AppError::Internal(msg) => {
                error!("Internal failure: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Gateway(e) => {
                error!("Payment gateway failure: {}", e);
                self.to_string()
            }
            _ => self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            success: false,
            error: message,
            error_code: self.error_code().to_string(),
        })
    }
}
