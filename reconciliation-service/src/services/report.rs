//! Blocking pipeline behind `/upload`: read both sheets, reconcile, encode.

use crate::models::{DiscrepancyStatus, ReportFormat, Row};
use crate::services::engine::{ReconciliationEngine, ReconciliationSummary};
use crate::services::metrics::{
    record_discrepancies, record_reconciliation_duration, record_reconciliation_run,
    record_rows_processed,
};
use crate::services::spreadsheet::{read_rows, write_report, SpreadsheetError};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

/// Which upload a file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Input,
    Bank,
}

impl Source {
    /// Multipart field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Bank => "bank",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to read {origin} file: {error}")]
    Read {
        origin: Source,
        #[source]
        error: SpreadsheetError,
    },

    #[error("Failed to encode report: {0}")]
    Encode(#[source] SpreadsheetError),
}

#[derive(Debug)]
pub struct GeneratedReport {
    pub bytes: Vec<u8>,
    pub format: ReportFormat,
    pub summary: ReconciliationSummary,
}

pub fn generate_report(
    engine: &ReconciliationEngine,
    input_path: &Path,
    bank_path: &Path,
    format: ReportFormat,
) -> Result<GeneratedReport, ReportError> {
    let started = Instant::now();
    let result = run_pipeline(engine, input_path, bank_path, format);
    record_reconciliation_duration(format.as_str(), started.elapsed().as_secs_f64());

    match &result {
        Ok(report) => {
            record_reconciliation_run("success");
            for status in DiscrepancyStatus::ALL {
                record_discrepancies(status.metric_label(), report.summary.count(status));
            }
            tracing::info!(
                format = %format,
                size = report.bytes.len(),
                input_rows = report.summary.input.rows,
                bank_rows = report.summary.bank.rows,
                matched = report.summary.matched,
                missing_in_bank = report.summary.missing_in_bank,
                excess_in_bank = report.summary.excess_in_bank,
                amount_mismatch = report.summary.amount_mismatch,
                duration_ms = started.elapsed().as_millis() as u64,
                "Reconciliation report generated"
            );
        }
        Err(e) => {
            record_reconciliation_run("failure");
            tracing::warn!(error = %e, format = %format, "Reconciliation report failed");
        }
    }

    result
}

fn run_pipeline(
    engine: &ReconciliationEngine,
    input_path: &Path,
    bank_path: &Path,
    format: ReportFormat,
) -> Result<GeneratedReport, ReportError> {
    let input_rows = read_source(Source::Input, input_path)?;
    let bank_rows = read_source(Source::Bank, bank_path)?;

    let reconciliation = engine.run(&input_rows, &bank_rows);

    let bytes = write_report(&reconciliation.records, format).map_err(ReportError::Encode)?;

    Ok(GeneratedReport {
        bytes,
        format,
        summary: reconciliation.summary,
    })
}

fn read_source(origin: Source, path: &Path) -> Result<Vec<Row>, ReportError> {
    let rows = read_rows(path).map_err(|error| ReportError::Read { origin, error })?;
    record_rows_processed(origin.as_str(), rows.len());
    tracing::debug!(source = origin.as_str(), rows = rows.len(), "Spreadsheet decoded");
    Ok(rows)
}
