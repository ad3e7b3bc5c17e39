use crate::AppState;
use crate::api::models::sessions::{ErrorResponse, StartSessionRequest, StartSessionResponse};
use crate::errors::{Error, Result};
use crate::jobs::{AnalysisJob, InputFile};
use crate::storage::SessionStore;
use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State},
    http::header,
};
use axum::body::Bytes;

#[utoipa::path(
    post,
    path = "/start_market_gap",
    tag = "sessions",
    summary = "Start a market GAP analysis session",
    description = "Validates the session request and starts the analysis job in the background. \
                   Input documents are referenced through dynamic `file_{n}_drive_url` keys \
                   (optionally paired with `file_{n}_name`), or uploaded directly as \
                   `multipart/form-data` file parts named `files`.",
    request_body(content = StartSessionRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Analysis started", body = StartSessionResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn start_market_gap(State(state): State<AppState>, request: Request) -> Result<Json<StartSessionResponse>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"));

    let job = if is_multipart {
        let multipart = Multipart::from_request(request, &state).await.map_err(|e| Error::BadRequest {
            message: format!("Failed to parse multipart data: {e}"),
        })?;
        intake_multipart(&state, multipart).await?
    } else {
        let Json(body) = Json::<StartSessionRequest>::from_request(request, &state)
            .await
            .map_err(|e| Error::BadRequest {
                message: format!("Invalid JSON body: {e}"),
            })?;
        intake_json(&state, body)?
    };

    let file_count = job.inputs.len();
    tracing::info!(
        session_id = %job.session_id,
        files = file_count,
        "Accepted market GAP session request"
    );
    state.jobs.spawn(job);

    Ok(Json(StartSessionResponse::started(file_count)))
}

/// Build a job from the canonical JSON shape.
fn intake_json(state: &AppState, body: StartSessionRequest) -> Result<AnalysisJob> {
    let (session_id, email) = body.required_fields()?;
    SessionStore::validate_component(&session_id)?;

    let refs = body.file_refs()?;
    if refs.len() > state.config.limits.max_input_files {
        return Err(Error::BadRequest {
            message: format!(
                "Too many input files: {} (maximum is {})",
                refs.len(),
                state.config.limits.max_input_files
            ),
        });
    }

    let mut inputs = Vec::with_capacity(refs.len());
    for file_ref in refs {
        SessionStore::validate_component(&file_ref.file_name)?;
        inputs.push(InputFile::Remote {
            file_name: file_ref.file_name,
            url: file_ref.url,
        });
    }

    Ok(AnalysisJob {
        session_id,
        email,
        folder_id: body.folder_id,
        inputs,
    })
}

/// Build a job from a multipart form: text fields `session_id`, `email` and
/// `folder_id` plus any number of `files` file parts, which are written
/// straight into the session directory.
///
/// Parts may arrive in any order, so uploads are buffered until the required
/// fields have been seen. The buffered size is bounded by the request body
/// limit on this route.
async fn intake_multipart(state: &AppState, mut multipart: Multipart) -> Result<AnalysisJob> {
    let mut session_id: Option<String> = None;
    let mut email: Option<String> = None;
    let mut folder_id: Option<String> = None;
    let mut uploads: Vec<(String, Bytes)> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "session_id" => session_id = Some(read_text(field, "session_id").await?),
            "email" => email = Some(read_text(field, "email").await?),
            "folder_id" => folder_id = Some(read_text(field, "folder_id").await?),
            "files" => {
                let filename = field.file_name().map(str::to_string).ok_or_else(|| Error::BadRequest {
                    message: "File part is missing a filename".to_string(),
                })?;
                SessionStore::validate_component(&filename)?;

                if uploads.len() >= state.config.limits.max_input_files {
                    return Err(Error::BadRequest {
                        message: format!("Too many uploaded files (maximum is {})", state.config.limits.max_input_files),
                    });
                }

                let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read uploaded file {filename}: {e}"),
                })?;
                uploads.push((filename, bytes));
            }
            _ => {
                // Ignore unknown fields (forward compatibility)
            }
        }
    }

    let session_id = session_id.filter(|s| !s.trim().is_empty()).ok_or_else(|| Error::BadRequest {
        message: "Missing session_id".to_string(),
    })?;
    let email = email.filter(|s| !s.trim().is_empty()).ok_or_else(|| Error::BadRequest {
        message: "Missing email".to_string(),
    })?;
    SessionStore::validate_component(&session_id)?;

    let mut inputs = Vec::with_capacity(uploads.len());
    for (filename, bytes) in uploads {
        state.store.write(&session_id, &filename, &bytes).await?;
        tracing::info!(%session_id, %filename, bytes = bytes.len(), "Staged uploaded input file");
        inputs.push(InputFile::Staged { file_name: filename });
    }

    Ok(AnalysisJob {
        session_id,
        email,
        folder_id,
        inputs,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String> {
    field.text().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to read {name}: {e}"),
    })
}
