use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors raised by the crawl engine, the tree store, the queues and the
/// recovery procedure.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// I/O error while listing or reading a folder or file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The crawler's credentials are not allowed to open a folder
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// A work queue or event queue operation failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Deliveries of one task failed too often; the service must stop
    #[error("Queue delivery failed {attempts} times, giving up")]
    DeliveryExhausted { attempts: u32 },

    /// The shutdown token fired while a task was running
    #[error("Cancelled")]
    Cancelled,

    /// Tree store load/flush error
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The authoritative index could not be read
    #[error("Index error: {0}")]
    Index(String),

    /// A path could not be turned into a crawlable location
    #[error("Invalid path {path:?}: {message}")]
    InvalidPath { path: String, message: String },

    /// Invalid crawl rules or settings
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CrawlError {
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        CrawlError::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for CrawlError {
    fn from(e: sqlx::Error) -> Self {
        CrawlError::Queue(e.to_string())
    }
}

impl From<serde_json::Error> for CrawlError {
    fn from(e: serde_json::Error) -> Self {
        CrawlError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CrawlError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        CrawlError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CrawlError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        CrawlError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for CrawlError {
    fn from(e: reqwest::Error) -> Self {
        CrawlError::Index(e.to_string())
    }
}

/// The error type of the admin HTTP API.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// For when a request conflicts with the current state of the server.
    Conflict(String),
    /// For when a service is temporarily unavailable.
    ServiceUnavailable(String),
    /// For errors related to database operations.
    Database(String),
    /// For errors reported by the crawler core.
    Crawl(CrawlError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Crawl(e) => write!(f, "Crawler error: {}", e),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            AppError::Crawl(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message, details) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Error ID: {}", error_id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg, None)
            }
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    Some(json!({ "details": msg })),
                )
            }
            AppError::Crawl(e) => {
                tracing::warn!("Crawler error: {}", e);
                let status = match &e {
                    CrawlError::Index(_) => StatusCode::BAD_GATEWAY,
                    CrawlError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "CRAWLER_ERROR", e.to_string(), None)
            }
        };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": error_message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(format!("Database error: {}", err)),
        }
    }
}

impl From<CrawlError> for AppError {
    fn from(err: CrawlError) -> Self {
        AppError::Crawl(err)
    }
}

/// A type alias for `Result<T, AppError>`, used by the route handlers.
pub type AppResult<T> = Result<T, AppError>;
