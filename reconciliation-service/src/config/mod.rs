//! Configuration module for reconciliation-service.

use crate::models::ReportFormat;
use crate::services::engine::DEFAULT_MISSING_USER_ID;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub upload: UploadConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Parent of the per-request scratch directories.
    pub scratch_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub default_format: ReportFormat,
    /// User Id written for ledger rows that have none.
    pub missing_user_id: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            scratch_dir: env::temp_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_format: ReportFormat::default(),
            missing_user_id: DEFAULT_MISSING_USER_ID.to_string(),
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "reconciliation-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            upload: UploadConfig {
                scratch_dir: env::var("SCRATCH_DIR")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(env::temp_dir),
                max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
                request_timeout: Duration::from_secs(parse_env(
                    "REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?),
            },
            report: ReportConfig {
                default_format: parse_env("REPORT_FORMAT", ReportFormat::default())?,
                missing_user_id: env::var("MISSING_USER_ID")
                    .unwrap_or_else(|_| DEFAULT_MISSING_USER_ID.to_string()),
            },
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
        }),
        _ => Ok(default),
    }
}
