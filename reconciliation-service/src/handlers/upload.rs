use crate::models::ReportFormat;
use crate::services::spreadsheet::file_extension;
use crate::services::{
    generate_report, record_upload_failure, ReportError, Source, SpreadsheetError,
};
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub format: Option<ReportFormat>,
}

/// Per-request scratch directory. Removed when dropped, whatever the outcome.
struct UploadWorkspace {
    dir: TempDir,
}

impl UploadWorkspace {
    fn create(parent: &Path) -> Result<Self, AppError> {
        let dir = tempfile::Builder::new()
            .prefix("reconcile-")
            .tempdir_in(parent)
            .map_err(|e| {
                tracing::error!(error = %e, parent = %parent.display(), "Failed to create scratch directory");
                AppError::from(e)
            })?;
        Ok(Self { dir })
    }

    /// Write an upload as `<part>.<ext>`; the client's extension picks the decoder.
    async fn store(&self, source: Source, file_name: &str, data: &[u8]) -> Result<PathBuf, AppError> {
        let name = match file_extension(Path::new(file_name))
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            Some(ext) => format!("{}.{}", source.as_str(), ext),
            None => source.as_str().to_string(),
        };
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove scratch directory");
        }
    }
}

struct StoredUpload {
    file_name: String,
    path: PathBuf,
}

/// `POST /upload`: reconcile the `input` ledger against the `bank` statement
/// and return the discrepancy report as a download.
pub async fn upload_statements(
    State(state): State<AppState>,
    params: Result<Query<UploadParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params.map_err(|e| {
        tracing::warn!(error = %e, "Invalid upload query");
        record_upload_failure("invalid_query");
        AppError::BadRequest(anyhow::anyhow!("Invalid report format: {}", e.body_text()))
    })?;

    let mut multipart = multipart.map_err(|e| {
        tracing::warn!(error = %e, "Upload is not a multipart form");
        record_upload_failure("missing_files");
        AppError::BadRequest(anyhow::anyhow!("Missing files"))
    })?;

    let format = params.format.unwrap_or(state.config.report.default_format);
    let workspace = UploadWorkspace::create(&state.config.upload.scratch_dir)?;

    let mut input: Option<StoredUpload> = None;
    let mut bank: Option<StoredUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let source = match field.name() {
            Some("input") => Source::Input,
            Some("bank") => Source::Bank,
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
                continue;
            }
        };

        let file_name = field.file_name().unwrap_or("unnamed").to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        // Browsers send an empty part when no file was chosen.
        if data.is_empty() {
            tracing::debug!(part = source.as_str(), "Skipping empty upload part");
            continue;
        }

        let path = workspace.store(source, &file_name, &data).await?;

        tracing::info!(
            part = source.as_str(),
            filename = %file_name,
            size = data.len(),
            "Upload received"
        );

        let upload = StoredUpload { file_name, path };
        match source {
            Source::Input => input = Some(upload),
            Source::Bank => bank = Some(upload),
        }
    }

    let (Some(input), Some(bank)) = (input, bank) else {
        record_upload_failure("missing_files");
        tracing::warn!("Upload rejected: input and bank files are both required");
        return Err(AppError::BadRequest(anyhow::anyhow!("Missing files")));
    };

    tracing::info!(
        input_file = %input.file_name,
        bank_file = %bank.file_name,
        format = %format,
        "Starting reconciliation"
    );

    let engine = state.engine.clone();
    let report = tokio::task::spawn_blocking(move || {
        generate_report(&engine, &input.path, &bank.path, format)
    })
    .await
    .map_err(|e| AppError::InternalError(anyhow::anyhow!("Reconciliation task failed: {}", e)))?
    .map_err(report_error)?;

    workspace.close();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.file_name()),
            ),
        ],
        report.bytes,
    )
        .into_response())
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        record_upload_failure("too_large");
        AppError::PayloadTooLarge(anyhow::anyhow!(err.body_text()))
    } else {
        record_upload_failure("malformed_multipart");
        AppError::BadRequest(anyhow::anyhow!(
            "Failed to read multipart field: {}",
            err.body_text()
        ))
    }
}

fn report_error(err: ReportError) -> AppError {
    match err {
        ReportError::Read {
            origin,
            error: SpreadsheetError::UnsupportedFormat(ext),
        } => {
            record_upload_failure("unsupported_format");
            AppError::UnsupportedMediaType(anyhow::anyhow!(
                "Unsupported {} file type: {}",
                origin,
                ext
            ))
        }
        err @ ReportError::Read { .. } => {
            record_upload_failure("unreadable_file");
            AppError::BadRequest(anyhow::anyhow!(err.to_string()))
        }
        err @ ReportError::Encode(_) => AppError::InternalError(anyhow::anyhow!(err.to_string())),
    }
}
