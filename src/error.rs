use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("username or email already exists")]
    DuplicateIdentity,

    #[error("invalid username or password")]
    InvalidCredentials,

    /// Missing multipart part or empty filename; carries the client message.
    #[error("{0}")]
    NoFile(&'static str),

    #[error("unsupported file type")]
    UnsupportedType,

    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("inference failed: {0:#}")]
    InferenceFailed(anyhow::Error),

    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_)
            | AppError::NoFile(_)
            | AppError::UnsupportedType => StatusCode::BAD_REQUEST,
            AppError::DuplicateIdentity => StatusCode::CONFLICT,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InferenceFailed(_) | AppError::StorageUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text that is safe to show to the browser. Internal causes stay in the logs.
    pub fn message(&self) -> String {
        match self {
            AppError::InvalidInput(msg) | AppError::NoFile(msg) => (*msg).to_string(),
            AppError::DuplicateIdentity => "Username or email already exists!".into(),
            AppError::InvalidCredentials => "Invalid username or password!".into(),
            AppError::UnsupportedType => "Invalid file type".into(),
            AppError::PayloadTooLarge { limit } => {
                format!("File too large (max {} MB)", limit / (1024 * 1024))
            }
            AppError::InferenceFailed(_) | AppError::StorageUnavailable(_) => {
                "Analysis failed".into()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::DuplicateIdentity,
            _ => AppError::StorageUnavailable(e.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}
