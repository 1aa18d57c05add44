use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Every failure an operation on the board can report to its caller.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The allow-list is absent or empty; nobody can log in.
    #[error("No registered emails are configured")]
    ConfigurationMissing,

    #[error("This email is not registered")]
    NotAllowed,

    #[error("Login required")]
    Unauthenticated,

    #[error("Access denied")]
    AccessDenied,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage format error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ConfigurationMissing => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotAllowed | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Io(_) | AppError::Csv(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("Malformed upload: {e}"))
    }
}
