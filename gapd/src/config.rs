//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `GAPD_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `GAPD_` override YAML values
//! 3. **PORT** - Special case: overrides `port` if set (hosting platforms commonly inject it)
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `GAPD_REPORT_ENGINE__URL=https://reports.internal` sets the `report_engine.url` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port (both forms work)
//! PORT=8080
//! GAPD_PORT=8080
//!
//! # Point at a different report engine
//! GAPD_REPORT_ENGINE__URL="https://reports.staging.example.com"
//!
//! # Move the session staging directory
//! GAPD_BASE_DIR="/var/lib/gapd/sessions"
//! ```

use crate::errors::Error;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "GAPD_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base directory for session staging and generated artifacts
    pub base_dir: PathBuf,
    /// External report engine configuration
    pub report_engine: ReportEngineConfig,
    /// Input/report download configuration
    pub downloads: DownloadsConfig,
    /// Background analysis job configuration
    pub jobs: JobsConfig,
    /// Request limits for protecting system capacity
    pub limits: LimitsConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            base_dir: PathBuf::from("temp_sessions"),
            report_engine: ReportEngineConfig::default(),
            downloads: DownloadsConfig::default(),
            jobs: JobsConfig::default(),
            limits: LimitsConfig::default(),
            cors: CorsConfig::default(),
            enable_metrics: false,
        }
    }
}

/// External report engine settings.
///
/// The report engine is the collaborator that actually produces the Word and
/// PowerPoint documents. The gateway only calls its HTTP API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportEngineConfig {
    /// Base URL of the report engine
    pub url: Url,
    /// Timeout for the generate-reports call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ReportEngineConfig {
    fn default() -> Self {
        Self {
            // Default matches the deployed engine the orchestration module points at
            url: Url::parse("https://market-reports-api.onrender.com").expect("valid default URL"),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Settings for downloading session inputs and generated reports.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadsConfig {
    /// Per-download request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Maximum size in bytes for a single staged file
    pub max_file_size: u64,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_file_size: 100 * 1024 * 1024, // 100 MiB
        }
    }
}

/// Background analysis job settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsConfig {
    /// Maximum number of analysis jobs running concurrently
    pub max_concurrent: usize,
    /// How long to wait for in-flight jobs on shutdown before cancelling them
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Request limits configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum number of input file references accepted per session request
    pub max_input_files: usize,
    /// Maximum body size in bytes for multipart uploads on `/start_market_gap`
    pub max_upload_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_files: 32,
            max_upload_size: 50 * 1024 * 1024, // 50 MiB
        }
    }
}

/// CORS configuration for browser clients.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: None,
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.jobs.max_concurrent == 0 {
            return Err(Error::Internal {
                operation: "Config validation: jobs.max_concurrent must be at least 1".to_string(),
            });
        }

        if self.limits.max_input_files == 0 {
            return Err(Error::Internal {
                operation: "Config validation: limits.max_input_files must be at least 1".to_string(),
            });
        }

        match self.report_engine.url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Internal {
                    operation: format!("Config validation: report_engine.url must be http or https, got {other}"),
                });
            }
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("GAPD_").split("__"))
            // Hosting platforms inject the listen port as a bare PORT variable
            .merge(Env::raw().only(&["PORT"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_original_deployment() {
        let config = Config::default();
        assert_eq!(config.port, 10000);
        assert_eq!(config.base_dir, PathBuf::from("temp_sessions"));
        assert_eq!(config.report_engine.request_timeout, Duration::from_secs(120));
        assert_eq!(config.downloads.request_timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_yaml_with_nested_sections() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 9100
base_dir: /tmp/gap_sessions
report_engine:
  url: http://reports.internal:8080
  request_timeout: 30s
jobs:
  max_concurrent: 2
"#,
            )?;

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            let config = Config::load(&args)?;

            assert_eq!(config.port, 9100);
            assert_eq!(config.base_dir, PathBuf::from("/tmp/gap_sessions"));
            assert_eq!(config.report_engine.url.as_str(), "http://reports.internal:8080/");
            assert_eq!(config.report_engine.request_timeout, Duration::from_secs(30));
            assert_eq!(config.jobs.max_concurrent, 2);
            // Untouched sections keep their defaults
            assert_eq!(config.limits.max_input_files, 32);

            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 9100\nhost: 10.0.0.1\n")?;

            jail.set_env("GAPD_HOST", "127.0.0.1");
            jail.set_env("GAPD_REPORT_ENGINE__URL", "https://reports.staging.example.com");

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            let config = Config::load(&args)?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 9100);
            assert_eq!(config.report_engine.url.as_str(), "https://reports.staging.example.com/");

            Ok(())
        });
    }

    #[test]
    fn bare_port_env_wins() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 9100\n")?;
            jail.set_env("PORT", "8080");

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            let config = Config::load(&args)?;
            assert_eq!(config.port, 8080);

            Ok(())
        });
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.jobs.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn cors_origins_parse_wildcard_and_urls() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
cors:
  allowed_origins:
    - "*"
    - https://app.example.com
"#,
            )?;

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            let config = Config::load(&args)?;
            assert_eq!(config.cors.allowed_origins.len(), 2);
            assert!(matches!(config.cors.allowed_origins[0], CorsOrigin::Wildcard));
            assert!(matches!(config.cors.allowed_origins[1], CorsOrigin::Url(_)));

            Ok(())
        });
    }
}
