use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Failure kinds reported by the backend clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Network failure or timeout before a response body was read.
    TransportFailure(String),
    /// Body was not JSON, or an expected nested field was missing.
    MalformedResponse(String),
    /// The backend answered with `success: false`.
    BackendRejected(String),
    /// No site identity is cached yet.
    NotRegistered,
    /// The identity could not be read from or written to the option store.
    Storage(String),
}

/// Error returned by site registration.
pub type RegistrationError = ClientError;

/// Error returned by calculation submission.
pub type SubmissionError = ClientError;

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::TransportFailure(msg) => write!(f, "Transport failure: {}", msg),
            ClientError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            ClientError::BackendRejected(msg) => write!(f, "Backend rejected request: {}", msg),
            ClientError::NotRegistered => write!(f, "Site not registered with backend"),
            ClientError::Storage(msg) => write!(f, "Option storage error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

/// Errors surfaced by the host HTTP layer.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// A backend client operation failed.
    Client(ClientError),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Client(e) => write!(f, "{}", e),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each variant to a status code and the `{success, message}` envelope
    /// the calculator widget expects.
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Client(ClientError::NotRegistered) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ClientError::NotRegistered.to_string(),
            ),
            AppError::Client(ClientError::Storage(msg)) => {
                tracing::error!("Option storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Client(ClientError::BackendRejected(msg)) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Client(e) => {
                tracing::error!("Backend error: {}", e);
                (StatusCode::BAD_GATEWAY, "Backend unavailable".to_string())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (*source).into_response();
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        AppError::Client(err)
    }
}

impl From<AppError> for ClientError {
    /// Store failures reach the clients as `Storage`.
    fn from(err: AppError) -> Self {
        match err {
            AppError::Client(e) => e,
            other => ClientError::Storage(other.to_string()),
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}
