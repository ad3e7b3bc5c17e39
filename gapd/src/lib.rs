//! # gapd: Market GAP Analysis Gateway
//!
//! `gapd` is the HTTP gateway in front of a market GAP analysis pipeline. An
//! upstream orchestration module posts a session-start request; the gateway
//! validates it, acknowledges immediately, and runs the analysis as a
//! background job. The job stages the referenced input documents in a
//! session directory, calls the external report engine that performs the
//! actual analysis and document rendering, and collects the generated
//! reports so they can be fetched back through the files endpoint.
//!
//! ## HTTP surface
//!
//! - `POST /start_market_gap` - validate and acknowledge a session request,
//!   then run the analysis job in the background. Accepts the canonical JSON
//!   shape (`session_id`, `email`, optional `folder_id`, dynamic
//!   `file_{n}_drive_url` keys) or a `multipart/form-data` upload.
//! - `GET /files/{session_id}/{filename}` - raw bytes of a staged artifact.
//! - `GET /sessions/{session_id}/files` - list a session's staged files.
//! - `GET /` and `GET /healthz` - liveness probes.
//! - `/docs` and `/api-docs/openapi.json` - OpenAPI documentation.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer. There is deliberately no database: session state *is* the
//! session directory on disk ([`storage`]), and the analysis itself lives in
//! an external service reached over HTTP ([`jobs::reports`]). Background
//! jobs ([`jobs`]) run on the tokio runtime behind a concurrency semaphore
//! and are drained gracefully on shutdown.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use gapd::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Parse CLI arguments and load configuration
//!     let args = gapd::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     // Initialize structured logging
//!     gapd::telemetry::init_telemetry()?;
//!
//!     // Create and start the application
//!     let app = Application::new(config).await?;
//!
//!     // Run with graceful shutdown on Ctrl+C
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod errors;
pub mod jobs;
mod openapi;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod test;

use crate::config::CorsOrigin;
use crate::jobs::JobRunner;
use crate::openapi::ApiDoc;
use crate::storage::SessionStore;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Json, Router,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// Contains the configuration, the session store, and the job runner that
/// executes analysis pipelines in the background.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: SessionStore,
    pub jobs: JobRunner,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    // tower-http forbids passing `*` to `AllowOrigin::list`; a wildcard must
    // be expressed as `AllowOrigin::any()`.
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            let header_value = match origin {
                CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
                CorsOrigin::Url(url) => url.as_str().parse::<HeaderValue>()?,
            };
            origins.push(header_value);
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(config.cors.allow_credentials);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// This function constructs the complete Axum router with:
/// - The session-start endpoint (with its own body limit for uploads)
/// - File retrieval and listing endpoints
/// - Health endpoints and OpenAPI documentation
/// - Optional Prometheus metrics
/// - CORS configuration and tracing middleware
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let upload_limit = state.config.limits.max_upload_size as usize;

    let api_routes = Router::new()
        .route(
            "/start_market_gap",
            post(api::handlers::sessions::start_market_gap).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/{session_id}/{filename}", get(api::handlers::files::get_generated_file))
        .route("/sessions/{session_id}/files", get(api::handlers::files::list_session_files))
        .with_state(state.clone());

    let router = Router::new()
        .route("/", get(|| async { "Market GAP Analysis API is up and running" }))
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    // Add Prometheus metrics if enabled
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] prepares the session base directory,
///    builds the job runner, and assembles the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles
///    requests until the shutdown signal fires
/// 3. **Shutdown**: in-flight analysis jobs are drained before exit
pub struct Application {
    router: Router,
    state: AppState,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting gateway with configuration: {:#?}", config);

        tokio::fs::create_dir_all(&config.base_dir).await?;
        let store = SessionStore::new(&config.base_dir);
        let jobs = JobRunner::new(&config, store.clone())?;

        let state = AppState::builder().config(config).store(store).jobs(jobs).build();
        let router = build_router(&state)?;

        Ok(Self { router, state })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, AppState) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.state)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.state.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Market GAP gateway listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("HTTP server stopped, draining analysis jobs");
        self.state.jobs.shutdown().await;

        Ok(())
    }
}
