//! Request/response types for the session-start endpoint.
//!
//! The canonical request schema is the open-ended form: `session_id` and
//! `email` are required, `folder_id` is optional, and input documents are
//! referenced through dynamic `file_{n}_drive_url` keys, each optionally
//! paired with a `file_{n}_name`. Earlier fixed-slot and array-shaped
//! revisions of this contract are deprecated and not accepted.

use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;
use utoipa::ToSchema;

/// Body of `POST /start_market_gap`.
///
/// Required fields are modelled as `Option` so validation can report which
/// one is missing instead of a generic deserialization error.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    /// Caller-supplied opaque id correlating this request with its output files
    pub session_id: Option<String>,
    /// Contact address forwarded to the report engine
    pub email: Option<String>,
    /// Optional upstream folder the caller wants results associated with
    pub folder_id: Option<String>,
    /// Dynamic `file_{n}_drive_url` / `file_{n}_name` keys
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An input document referenced by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileRef {
    pub file_name: String,
    pub url: Url,
}

impl StartSessionRequest {
    /// Extract and validate the required fields.
    pub fn required_fields(&self) -> Result<(String, String), Error> {
        let session_id = match self.session_id.as_deref() {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => {
                return Err(Error::BadRequest {
                    message: "Missing session_id".to_string(),
                });
            }
        };
        let email = match self.email.as_deref() {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => {
                return Err(Error::BadRequest {
                    message: "Missing email".to_string(),
                });
            }
        };
        Ok((session_id, email))
    }

    /// Collect the `file_{n}_drive_url` references, ordered by their index.
    ///
    /// The file name comes from the paired `file_{n}_name` key when present,
    /// otherwise from the last URL path segment, otherwise `file_{n}`.
    pub fn file_refs(&self) -> Result<Vec<RemoteFileRef>, Error> {
        let mut refs: Vec<(u64, RemoteFileRef)> = Vec::new();

        for (key, value) in &self.extra {
            let Some(index) = key
                .strip_prefix("file_")
                .and_then(|rest| rest.strip_suffix("_drive_url"))
                .and_then(|n| n.parse::<u64>().ok())
            else {
                // Unknown extra keys are ignored for forward compatibility
                continue;
            };

            let Some(raw_url) = value.as_str() else {
                return Err(Error::BadRequest {
                    message: format!("{key} must be a string URL"),
                });
            };
            let url = Url::parse(raw_url).map_err(|_| Error::BadRequest {
                message: format!("{key} is not a valid URL"),
            })?;

            let file_name = self
                .extra
                .get(&format!("file_{index}_name"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| filename_from_url(&url))
                .unwrap_or_else(|| format!("file_{index}"));

            refs.push((index, RemoteFileRef { file_name, url }));
        }

        refs.sort_by_key(|(index, _)| *index);
        Ok(refs.into_iter().map(|(_, r)| r).collect())
    }
}

fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?.rev().find(|segment| !segment.is_empty()).map(str::to_string)
}

/// Acknowledgement returned by `POST /start_market_gap`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartSessionResponse {
    /// Human-readable start acknowledgement
    #[schema(example = "Market GAP analysis started with 0 files")]
    pub message: String,
}

impl StartSessionResponse {
    pub fn started(file_count: usize) -> Self {
        Self {
            message: format!("Market GAP analysis started with {file_count} files"),
        }
    }
}

/// Error body shared by all endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Free-text description of what went wrong
    pub error: String,
}
