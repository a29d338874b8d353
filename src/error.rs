// src/error.rs
use axum::{http::StatusCode, response::Html, response::IntoResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Password processing failed")]
    PasswordHashingError,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("CSRF token validation failed")]
    CsrfRejected,

    /// A stored row holds a value outside its column's domain.
    #[error("Invalid record data: {0}")]
    InvalidRecord(String),

    #[error("Not found")]
    NotFound,

    #[error("Unexpected internal error")]
    InternalServerError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("Request failed: {:?}", self);

        let (status, user_message) = match self {
            AppError::SqlxError(_) | AppError::SqlxMigrateError(_) | AppError::InvalidRecord(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not access the data.")
            }
            AppError::EnvVarError(_) | AppError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error.")
            }
            AppError::PasswordHashingError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not process credentials.")
            }
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password.")
            }
            AppError::SessionError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong with your session.")
            }
            AppError::CsrfRejected => {
                (StatusCode::FORBIDDEN, "Security validation failed. Reload the page and try again.")
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "The requested record does not exist."),
            AppError::InternalServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred.")
            }
        };

        (status, Html(format!(r#"
            <!DOCTYPE html><html><head><title>Error</title><style>body{{font-family:sans-serif;}}</style></head>
            <body><h1>Error {status_code}</h1><p>{message}</p><a href="javascript:history.back()">Back</a></body></html>
         "#, status_code = status.as_u16(), message = user_message))).into_response()
    }
}

pub type AppResult<T = ()> = Result<T, AppError>;
