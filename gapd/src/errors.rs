use crate::storage::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} {name} not found")]
    NotFound { resource: String, name: String },

    /// Request body exceeds the configured limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Session storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Storage(storage_err) => match storage_err {
                StorageError::InvalidComponent { .. } => StatusCode::BAD_REQUEST,
                StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, name } => format!("{resource} {name} not found"),
            Error::PayloadTooLarge { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Storage(storage_err) => match storage_err {
                StorageError::InvalidComponent { component } => {
                    format!("Invalid path component: {component}")
                }
                StorageError::Io(_) => "Internal server error".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Other(_) | Error::Storage(StorageError::Io(_)) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Storage(_) => {
                tracing::debug!("Storage path error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({ "error": self.user_message() });
        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
