//! Services module for reconciliation-service.

pub mod engine;
pub mod extractor;
pub mod metrics;
pub mod report;
pub mod spreadsheet;

pub use engine::{reconcile, Reconciliation, ReconciliationEngine, ReconciliationSummary};
pub use extractor::{explicit_reference_code, extract_amount, extract_reference_code};
pub use metrics::{
    get_metrics, init_metrics, record_http_request, record_reconciliation_run,
    record_upload_failure,
};
pub use report::{generate_report, GeneratedReport, ReportError, Source};
pub use spreadsheet::{read_rows, write_report, SpreadsheetError};
