//! Session-scoped artifact storage on the local filesystem.
//!
//! Every analysis session gets its own directory under the configured base
//! directory. Input documents are staged there by the job pipeline and the
//! generated reports land there too, which is what makes them retrievable
//! via `GET /files/{session_id}/{filename}`.
//!
//! Path components are validated before they ever touch the filesystem: a
//! session id or filename that is empty, a dot segment, or contains a path
//! separator is rejected, so a request can never escape the session root.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum StorageError {
    /// Path component that would escape the session root or is otherwise unusable
    #[error("invalid path component {component:?}")]
    InvalidComponent { component: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A file currently staged in a session directory.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub filename: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

/// Filesystem-backed store for session directories.
#[derive(Debug, Clone)]
pub struct SessionStore {
    base_dir: PathBuf,
}

impl SessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Directory name for a session. Session ids already carrying the `Temp_`
    /// prefix are used as-is, everything else gets the prefix prepended.
    pub fn folder_name(session_id: &str) -> String {
        if session_id.starts_with("Temp_") {
            session_id.to_string()
        } else {
            format!("Temp_{session_id}")
        }
    }

    /// Validate a single path component (session id or filename).
    pub fn validate_component(component: &str) -> Result<(), StorageError> {
        let invalid = component.is_empty()
            || component == "."
            || component == ".."
            || component.contains('/')
            || component.contains('\\')
            || component.contains('\0');
        if invalid {
            return Err(StorageError::InvalidComponent {
                component: component.to_string(),
            });
        }
        Ok(())
    }

    /// Resolve the directory for a session without touching the filesystem.
    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf, StorageError> {
        Self::validate_component(session_id)?;
        Ok(self.base_dir.join(Self::folder_name(session_id)))
    }

    /// Create (if needed) and return the session directory.
    pub async fn create_session_dir(&self, session_id: &str) -> Result<PathBuf, StorageError> {
        let dir = self.session_dir(session_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Resolve the full path of a file inside a session directory.
    pub fn resolve(&self, session_id: &str, filename: &str) -> Result<PathBuf, StorageError> {
        let dir = self.session_dir(session_id)?;
        Self::validate_component(filename)?;
        Ok(dir.join(filename))
    }

    /// Read a staged file. Returns `None` when the session or file does not exist.
    pub async fn read(&self, session_id: &str, filename: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.resolve(session_id, filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a staged file, replacing any previous content.
    pub async fn write(&self, session_id: &str, filename: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.resolve(session_id, filename)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// List the files staged for a session, sorted by filename.
    /// Returns `None` when the session directory does not exist.
    pub async fn list(&self, session_id: &str) -> Result<Option<Vec<StagedFile>>, StorageError> {
        let dir = self.session_dir(session_id)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Ok(filename) = entry.file_name().into_string() else {
                // Non-UTF-8 names are not addressable through the API, skip them
                continue;
            };
            let modified_at = metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
            files.push(StagedFile {
                filename,
                size_bytes: metadata.len(),
                modified_at,
            });
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(Some(files))
    }
}
