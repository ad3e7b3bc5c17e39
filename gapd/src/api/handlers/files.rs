use crate::AppState;
use crate::api::models::files::{SessionFileListResponse, SessionFileResponse};
use crate::api::models::sessions::ErrorResponse;
use crate::errors::{Error, Result};
use crate::storage::StorageError;
use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

#[utoipa::path(
    get,
    path = "/files/{session_id}/{filename}",
    tag = "files",
    summary = "Retrieve a generated file",
    description = "Returns the raw bytes of a file staged for a session, exactly as stored. \
                   The content type is guessed from the filename extension.",
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "Session or file not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("session_id" = String, Path, description = "The session the file belongs to"),
        ("filename" = String, Path, description = "The name of the file to retrieve")
    )
)]
pub async fn get_generated_file(
    State(state): State<AppState>,
    Path((session_id, filename)): Path<(String, String)>,
) -> Result<Response> {
    let bytes = match state.store.read(&session_id, &filename).await {
        Ok(Some(bytes)) => bytes,
        // A traversal attempt gets the same 404 as a missing file
        Ok(None) | Err(StorageError::InvalidComponent { .. }) => {
            return Err(Error::NotFound {
                resource: "File".to_string(),
                name: format!("{session_id}/{filename}"),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let mime = mime_guess::from_path(&filename).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.as_ref())], bytes).into_response())
}

#[utoipa::path(
    get,
    path = "/sessions/{session_id}/files",
    tag = "files",
    summary = "List a session's files",
    description = "Returns the files currently staged for a session: input documents and any \
                   generated reports that have been collected so far.",
    responses(
        (status = 200, description = "Staged files", body = SessionFileListResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("session_id" = String, Path, description = "The session to list files for")
    )
)]
pub async fn list_session_files(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionFileListResponse>> {
    let files = match state.store.list(&session_id).await {
        Ok(Some(files)) => files,
        Ok(None) | Err(StorageError::InvalidComponent { .. }) => {
            return Err(Error::NotFound {
                resource: "Session".to_string(),
                name: session_id,
            });
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(SessionFileListResponse {
        session_id,
        files: files.iter().map(SessionFileResponse::from_staged).collect(),
    }))
}
