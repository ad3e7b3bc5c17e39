//! Background analysis jobs.
//!
//! `POST /start_market_gap` acknowledges immediately; the actual work runs
//! here, on the tokio runtime, scoped to the session directory:
//!
//! 1. Stage the referenced input documents (download, or already uploaded).
//! 2. Call the external report engine with the session context.
//! 3. Collect the generated reports into the session directory so they
//!    become retrievable via `GET /files/{session_id}/{filename}`.
//!
//! There is no completion or progress contract for callers; outcomes are
//! observable through logs and through the files that appear in the session
//! directory. Concurrency is bounded by a semaphore, and shutdown drains
//! in-flight jobs up to a configurable timeout before cancelling them.

pub mod downloads;
pub mod reports;

use crate::config::Config;
use crate::storage::SessionStore;
use reports::{GenerateReportsRequest, InputFileRef, ReportEngineClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

/// One input document for an analysis session.
#[derive(Debug, Clone)]
pub enum InputFile {
    /// Referenced by URL; the job downloads it into the session directory
    Remote { file_name: String, url: Url },
    /// Already written into the session directory (multipart upload path)
    Staged { file_name: String },
}

/// A validated session request, ready to run.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub session_id: String,
    pub email: String,
    pub folder_id: Option<String>,
    pub inputs: Vec<InputFile>,
}

/// Spawns and tracks analysis jobs.
///
/// Cheap to clone; all clones share the same tracker, shutdown token and
/// concurrency permits.
#[derive(Debug, Clone)]
pub struct JobRunner {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: SessionStore,
    engine: ReportEngineClient,
    download_client: reqwest::Client,
    max_file_size: u64,
    drain_timeout: Duration,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    permits: Arc<Semaphore>,
}

impl JobRunner {
    pub fn new(config: &Config, store: SessionStore) -> anyhow::Result<Self> {
        let download_client = reqwest::Client::builder().timeout(config.downloads.request_timeout).build()?;
        let engine = ReportEngineClient::new(&config.report_engine.url, config.report_engine.request_timeout)?;

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                engine,
                download_client,
                max_file_size: config.downloads.max_file_size,
                drain_timeout: config.jobs.drain_timeout,
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                permits: Arc::new(Semaphore::new(config.jobs.max_concurrent)),
            }),
        })
    }

    /// Spawn a job onto the runtime. Returns immediately.
    pub fn spawn(&self, job: AnalysisJob) {
        let inner = self.inner.clone();
        self.inner.tracker.spawn(async move {
            inner.run(job).await;
        });
    }

    /// Drain in-flight jobs, cancelling whatever is still running after the
    /// configured drain timeout.
    pub async fn shutdown(&self) {
        self.inner.tracker.close();

        tokio::select! {
            _ = self.inner.tracker.wait() => {
                info!("All analysis jobs drained");
            }
            _ = tokio::time::sleep(self.inner.drain_timeout) => {
                warn!("Drain timeout reached, cancelling remaining analysis jobs");
                self.inner.shutdown.cancel();
                self.inner.tracker.wait().await;
            }
        }
    }

    /// Wait until no jobs are running. Test-only synchronization point.
    #[cfg(test)]
    pub async fn wait_idle(&self) {
        while !self.inner.tracker.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Inner {
    async fn run(&self, job: AnalysisJob) {
        let permit = tokio::select! {
            permit = self.permits.clone().acquire_owned() => permit,
            _ = self.shutdown.cancelled() => {
                warn!(session_id = %job.session_id, "Shutdown requested before job started");
                return;
            }
        };
        // The semaphore is never closed while the runner is alive
        let Ok(_permit) = permit else { return };

        let job_id = Uuid::new_v4();
        info!(
            %job_id,
            session_id = %job.session_id,
            inputs = job.inputs.len(),
            "Starting market GAP analysis job"
        );

        match self.run_pipeline(&job).await {
            Ok(reports) => {
                info!(%job_id, session_id = %job.session_id, reports, "Market GAP analysis job finished");
            }
            Err(e) => {
                error!(%job_id, session_id = %job.session_id, "Market GAP analysis job failed: {e:#}");
            }
        }
    }

    /// Returns the number of report documents staged for retrieval.
    async fn run_pipeline(&self, job: &AnalysisJob) -> anyhow::Result<u64> {
        let session_dir = self.store.create_session_dir(&job.session_id).await?;

        // Stage the inputs. A failing download is logged and skipped; the
        // session continues with whatever did stage.
        let mut staged = Vec::new();
        for input in &job.inputs {
            if self.shutdown.is_cancelled() {
                anyhow::bail!("shutdown requested");
            }
            match input {
                InputFile::Staged { file_name } => staged.push(file_name.clone()),
                InputFile::Remote { file_name, url } => {
                    let dest = session_dir.join(file_name);
                    match downloads::fetch_to_path(&self.download_client, url, &dest, self.max_file_size).await {
                        Ok(bytes) => {
                            info!(session_id = %job.session_id, %file_name, bytes, "Staged input file");
                            staged.push(file_name.clone());
                        }
                        Err(e) => {
                            warn!(session_id = %job.session_id, %file_name, "Skipping input file: {e}");
                        }
                    }
                }
            }
        }

        let request = GenerateReportsRequest {
            session_id: job.session_id.clone(),
            email: job.email.clone(),
            folder_id: job.folder_id.clone(),
            input_files: staged.into_iter().map(|file_name| InputFileRef { file_name }).collect(),
        };
        let response = self.engine.generate(&request).await?;

        // Collect the generated documents so the files endpoint can serve them
        let mut collected = 0u64;
        for report_url in &response.report_urls {
            if self.shutdown.is_cancelled() {
                anyhow::bail!("shutdown requested");
            }
            let Some(filename) = downloads::filename_from_url(report_url) else {
                warn!(session_id = %job.session_id, %report_url, "Report URL has no filename, skipping");
                continue;
            };
            let dest = match self.store.resolve(&job.session_id, &filename) {
                Ok(dest) => dest,
                Err(e) => {
                    warn!(session_id = %job.session_id, %report_url, "Unusable report filename: {e}");
                    continue;
                }
            };
            match downloads::fetch_to_path(&self.download_client, report_url, &dest, self.max_file_size).await {
                Ok(bytes) => {
                    info!(session_id = %job.session_id, %filename, bytes, "Collected generated report");
                    collected += 1;
                }
                Err(e) => {
                    warn!(session_id = %job.session_id, %report_url, "Failed to collect report: {e}");
                }
            }
        }

        Ok(collected)
    }
}
