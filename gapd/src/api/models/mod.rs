//! Request/response data structures for the HTTP API.

pub mod files;
pub mod sessions;
