//! HTTP request handlers for all API endpoints.
//!
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Kicking off or querying session state
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`sessions`]: session-start intake (JSON and multipart) and job spawn
//! - [`files`]: retrieval and listing of session artifacts
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! the appropriate HTTP status code and a JSON `{"error": ...}` body.

pub mod files;
pub mod sessions;
