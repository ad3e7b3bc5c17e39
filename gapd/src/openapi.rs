//! OpenAPI documentation configuration.
//!
//! The generated document is served at `/api-docs/openapi.json` and rendered
//! interactively at `/docs`.

use crate::api::models::files::{SessionFileListResponse, SessionFileResponse};
use crate::api::models::sessions::{ErrorResponse, StartSessionRequest, StartSessionResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Market GAP Analysis API",
        description = "Gateway for market GAP analysis sessions: accepts session-start requests, \
                       drives the external report engine, and serves the generated artifacts.",
    ),
    paths(
        crate::api::handlers::sessions::start_market_gap,
        crate::api::handlers::files::get_generated_file,
        crate::api::handlers::files::list_session_files,
    ),
    components(schemas(
        StartSessionRequest,
        StartSessionResponse,
        ErrorResponse,
        SessionFileResponse,
        SessionFileListResponse,
    )),
    tags(
        (name = "sessions", description = "Start market GAP analysis sessions"),
        (name = "files", description = "Retrieve generated session artifacts")
    )
)]
pub struct ApiDoc;
