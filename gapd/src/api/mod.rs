//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all endpoints
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Sessions** (`POST /start_market_gap`): validate a session-start
//!   request and kick off the background analysis job
//! - **Files** (`GET /files/{session_id}/{filename}`,
//!   `GET /sessions/{session_id}/files`): retrieve and list artifacts
//!   produced for a session
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! Interactive documentation is served at `/docs` while the server runs.

pub mod handlers;
pub mod models;
