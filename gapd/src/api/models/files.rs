use crate::storage::StagedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A file staged in a session directory (input document or generated report).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionFileResponse {
    pub filename: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

impl SessionFileResponse {
    pub fn from_staged(file: &StagedFile) -> Self {
        Self {
            filename: file.filename.clone(),
            size_bytes: file.size_bytes,
            modified_at: file.modified_at,
        }
    }
}

/// Response for `GET /sessions/{session_id}/files`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionFileListResponse {
    pub session_id: String,
    pub files: Vec<SessionFileResponse>,
}
