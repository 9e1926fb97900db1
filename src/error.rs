//! Error types for Shelfkeeper server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes returned alongside every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    BookUnavailable = 7,
    Duplicate = 8,
    BadValue = 18,
    NoOpenLoan = 20,
    UserHasOpenLoans = 21,
    InvalidCredentials = 22,
    Forbidden = 23,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Identity already registered: {0}")]
    DuplicateIdentity(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing authorization token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Book {0} not found")]
    BookNotFound(i32),

    #[error("Book {0} is not available")]
    BookUnavailable(i32),

    #[error("No open loan for book {book_id} and {user_email}")]
    NoOpenLoan { book_id: i32, user_email: String },

    #[error("Account {0} still has books on loan")]
    AccountHasOpenLoans(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::DuplicateIdentity(_) => (StatusCode::BAD_REQUEST, ErrorCode::Duplicate),
            AppError::InvalidCredentials => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidCredentials)
            }
            AppError::MissingToken | AppError::InvalidToken(_) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized)
            }
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, ErrorCode::Forbidden),
            AppError::UserNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchUser),
            AppError::BookNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook),
            AppError::BookUnavailable(_) => (StatusCode::BAD_REQUEST, ErrorCode::BookUnavailable),
            AppError::NoOpenLoan { .. } => (StatusCode::NOT_FOUND, ErrorCode::NoOpenLoan),
            AppError::AccountHasOpenLoans(_) => {
                (StatusCode::CONFLICT, ErrorCode::UserHasOpenLoans)
            }
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    pub fn code(&self) -> ErrorCode {
        self.parts().1
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                match e {
                    sqlx::Error::PoolTimedOut => "Database unavailable, please retry".to_string(),
                    _ => "Database error".to_string(),
                }
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::InvalidToken(reason) => {
                tracing::debug!("Rejected token: {}", reason);
                "Invalid or expired token".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
