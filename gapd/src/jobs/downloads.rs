//! Streaming HTTP downloads into session directories.

use futures::StreamExt;
use std::path::Path;
use thiserror::Error as ThisError;
use tokio::io::AsyncWriteExt;
use url::Url;

#[derive(ThisError, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("download of {url} returned {status}")]
    Status { url: Url, status: reqwest::StatusCode },

    #[error("download of {url} exceeds the {limit} byte limit")]
    TooLarge { url: Url, limit: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Stream `url` to `dest`, enforcing a byte limit as chunks arrive.
///
/// The destination is removed again on any failure so a partial download is
/// never served back to a caller.
pub async fn fetch_to_path(client: &reqwest::Client, url: &Url, dest: &Path, max_bytes: u64) -> Result<u64, DownloadError> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status { url: url.clone(), status });
    }

    let result = write_stream(response, dest, max_bytes).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(dest).await;
    }
    result.map_err(|e| match e {
        WriteError::TooLarge => DownloadError::TooLarge {
            url: url.clone(),
            limit: max_bytes,
        },
        WriteError::Transport(e) => DownloadError::Transport(e),
        WriteError::Io(e) => DownloadError::Io(e),
    })
}

enum WriteError {
    TooLarge,
    Transport(reqwest::Error),
    Io(std::io::Error),
}

async fn write_stream(response: reqwest::Response, dest: &Path, max_bytes: u64) -> Result<u64, WriteError> {
    let mut file = tokio::fs::File::create(dest).await.map_err(WriteError::Io)?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(WriteError::Transport)?;
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(WriteError::TooLarge);
        }
        file.write_all(&chunk).await.map_err(WriteError::Io)?;
    }

    file.flush().await.map_err(WriteError::Io)?;
    Ok(written)
}

/// Last non-empty path segment of a URL, used to name downloaded reports.
pub fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?.rev().find(|segment| !segment.is_empty()).map(str::to_string)
}
