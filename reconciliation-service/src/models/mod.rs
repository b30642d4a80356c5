//! Domain models for reconciliation-service.

use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Row Models
// ============================================================================

/// A raw spreadsheet cell as decoded by the tabular reader.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    /// Cell content as text. Numbers print without a trailing `.0` so that
    /// numeric reference codes and whole amounts read the way they were typed.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Self::Number(n) if n.is_finite() => Some(Cow::Owned(n.to_string())),
            Self::Number(_) | Self::Empty => None,
        }
    }

    /// True for empty cells, blank text and non-finite numbers.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => !n.is_finite(),
            Self::Empty => true,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

/// One transaction record: column name to raw value, in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for fixtures.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.push((column.into(), value.into()));
    }

    /// Columns in their source order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// First cell whose column name equals `column`, ignoring ASCII case.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.columns()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<CellValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// Discrepancy Models
// ============================================================================

/// Report column headers, in output order.
pub const REPORT_COLUMNS: [&str; 5] = ["User Id", "UTR", "Status", "Amount", "Mismatched Amount"];

/// Worksheet name of the generated report.
pub const REPORT_SHEET_NAME: &str = "Comparison";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiscrepancyStatus {
    #[serde(rename = "Missing in Bank")]
    MissingInBank,
    #[serde(rename = "Excess in Bank")]
    ExcessInBank,
    #[serde(rename = "Amount Mismatch")]
    AmountMismatch,
}

impl DiscrepancyStatus {
    pub const ALL: [DiscrepancyStatus; 3] = [
        Self::MissingInBank,
        Self::ExcessInBank,
        Self::AmountMismatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingInBank => "Missing in Bank",
            Self::ExcessInBank => "Excess in Bank",
            Self::AmountMismatch => "Amount Mismatch",
        }
    }

    /// Short label for metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::MissingInBank => "missing_in_bank",
            Self::ExcessInBank => "excess_in_bank",
            Self::AmountMismatch => "amount_mismatch",
        }
    }
}

impl fmt::Display for DiscrepancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the reconciliation report.
///
/// `reference_code` holds the bare UTR; the apostrophe text marker is only
/// added when the record is rendered (see [`DiscrepancyRecord::utr_cell`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscrepancyRecord {
    #[serde(rename = "User Id")]
    pub user_id: String,
    #[serde(rename = "UTR", serialize_with = "serialize_utr")]
    pub reference_code: String,
    #[serde(rename = "Status")]
    pub status: DiscrepancyStatus,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "Mismatched Amount")]
    pub mismatched_amount: String,
}

impl DiscrepancyRecord {
    pub fn missing_in_bank(user_id: String, reference_code: String, updated_amount: String) -> Self {
        Self {
            user_id,
            reference_code,
            status: DiscrepancyStatus::MissingInBank,
            amount: String::new(),
            mismatched_amount: updated_amount,
        }
    }

    pub fn amount_mismatch(
        user_id: String,
        reference_code: String,
        bank_amount: String,
        updated_amount: String,
    ) -> Self {
        Self {
            user_id,
            reference_code,
            status: DiscrepancyStatus::AmountMismatch,
            amount: bank_amount,
            mismatched_amount: updated_amount,
        }
    }

    pub fn excess_in_bank(reference_code: String, bank_amount: String) -> Self {
        Self {
            user_id: String::new(),
            reference_code,
            status: DiscrepancyStatus::ExcessInBank,
            amount: bank_amount,
            mismatched_amount: String::new(),
        }
    }

    /// UTR as shown in the report, forced to text with a leading apostrophe.
    pub fn utr_cell(&self) -> String {
        format!("'{}", self.reference_code)
    }

    /// Report cells in [`REPORT_COLUMNS`] order.
    pub fn cells(&self) -> [String; 5] {
        [
            self.user_id.clone(),
            self.utr_cell(),
            self.status.as_str().to_string(),
            self.amount.clone(),
            self.mismatched_amount.clone(),
        ]
    }
}

#[allow(clippy::ptr_arg)]
fn serialize_utr<S: Serializer>(code: &String, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("'{}", code))
}

// ============================================================================
// Report Format
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Xlsx,
    Csv,
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    /// Download name offered to the client.
    pub fn file_name(&self) -> String {
        format!("comparison_output.{}", self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid report format: {}", s)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
