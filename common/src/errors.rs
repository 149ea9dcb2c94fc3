//! Application error type.
//!
//! Every failure a handler can produce is an `AppError`; the `IntoResponse`
//! impl turns it into the standard error envelope.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use validator::ValidationErrors;

use crate::config::ConfigError;
use crate::models::geometry::CoordinateError;
use crate::response::{ApiError, ApiResponse};

/// Result alias used across the service.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database connection failed: {0}")]
    DatabaseConnection(String),

    #[error("database query failed: {0}")]
    DatabaseQuery(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    InvalidFields(#[from] ValidationErrors),

    #[error(transparent)]
    Coordinates(#[from] CoordinateError),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Body, query string or path that could not be extracted.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Point not found")]
    PointNotFound(i64),

    #[error("Polygon not found")]
    PolygonNotFound(i64),

    #[error("server error: {0}")]
    Server(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidFields(_) | AppError::Coordinates(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Rejected { status, .. } => *status,
            AppError::PointNotFound(_) | AppError::PolygonNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseConnection(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) | AppError::DatabaseQuery(_) | AppError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::DatabaseConnection(_) => "DATABASE_UNAVAILABLE",
            AppError::DatabaseQuery(_) => "DATABASE_ERROR",
            AppError::Validation(_) | AppError::InvalidFields(_) | AppError::Coordinates(_) => {
                "VALIDATION_ERROR"
            }
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Rejected { status, .. } if *status == StatusCode::UNPROCESSABLE_ENTITY => {
                "VALIDATION_ERROR"
            }
            AppError::Rejected { .. } => "BAD_REQUEST",
            AppError::PointNotFound(_) | AppError::PolygonNotFound(_) => "NOT_FOUND",
            AppError::Server(_) => "INTERNAL_ERROR",
        }
    }
}

/// Classifies sqlx failures: anything that never reached the server, and
/// server-side connection or authentication refusals, are connection
/// problems; everything else is a query problem.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => AppError::DatabaseConnection(err.to_string()),
            sqlx::Error::Database(ref db)
                if db.code().is_some_and(|code| is_connection_sqlstate(&code)) =>
            {
                AppError::DatabaseConnection(err.to_string())
            }
            other => AppError::DatabaseQuery(other.to_string()),
        }
    }
}

/// SQLSTATE class 08 (connection exception) or 28 (invalid authorization).
fn is_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08") || code.starts_with("28")
}

macro_rules! impl_from_rejection {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for AppError {
                fn from(rejection: $rejection) -> Self {
                    AppError::Rejected {
                        status: rejection.status(),
                        message: rejection.body_text(),
                    }
                }
            }
        )+
    };
}

impl_from_rejection!(JsonRejection, QueryRejection, PathRejection);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        if status.is_server_error() {
            tracing::error!(code, status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(code, status = status.as_u16(), error = %self, "request rejected");
        }

        let mut error = ApiError::new(code, self.to_string());
        if let AppError::InvalidFields(errors) = &self {
            error = error.with_details(serde_json::to_value(errors).unwrap_or_default());
        }

        (status, Json(ApiResponse::failure(error))).into_response()
    }
}
