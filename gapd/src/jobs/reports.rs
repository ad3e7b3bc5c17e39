//! HTTP client for the external report engine.
//!
//! The report engine is the service that performs the actual GAP analysis
//! and renders the Word/PowerPoint documents. From the gateway's point of
//! view it is a single `POST /generate_market_reports` call: we send the
//! session context plus the staged input file names, and get back URLs of
//! the generated reports to collect.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error as ThisError;
use url::Url;

#[derive(ThisError, Debug)]
pub enum ReportEngineError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("report engine returned {status}")]
    Status { status: reqwest::StatusCode },
}

/// Payload for the generate-reports call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateReportsRequest {
    pub session_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    pub input_files: Vec<InputFileRef>,
}

/// A staged input file, referenced by name only.
#[derive(Debug, Clone, Serialize)]
pub struct InputFileRef {
    pub file_name: String,
}

/// Response from the generate-reports call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateReportsResponse {
    /// URLs of the generated report documents, ready to download
    #[serde(default)]
    pub report_urls: Vec<Url>,
}

#[derive(Debug, Clone)]
pub struct ReportEngineClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl ReportEngineClient {
    pub fn new(base_url: &Url, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        let endpoint = base_url.join("generate_market_reports")?;
        Ok(Self { http, endpoint })
    }

    /// Trigger report generation for a session.
    pub async fn generate(&self, request: &GenerateReportsRequest) -> Result<GenerateReportsResponse, ReportEngineError> {
        let response = self.http.post(self.endpoint.clone()).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportEngineError::Status { status });
        }

        Ok(response.json().await?)
    }
}
