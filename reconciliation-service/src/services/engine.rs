//! Ledger vs. bank statement diff keyed by UTR.
//!
//! The engine is a pure function of its two row sequences: it performs no
//! I/O, keeps no state between calls and never fails. Rows without a usable
//! reference code are left out of matching.

use crate::models::{DiscrepancyRecord, DiscrepancyStatus, Row};
use crate::services::extractor::{
    explicit_reference_code, extract_amount, extract_reference_code, normalize_amount,
    DEFAULT_AMOUNT,
};
use std::collections::HashMap;

/// Ledger column holding the operator's user id.
pub const USER_ID_COLUMN: &str = "User Id";

/// Ledger column holding the expected amount.
pub const UPDATED_AMOUNT_COLUMN: &str = "Updated Amount";

/// Placeholder for ledger rows without a user id.
pub const DEFAULT_MISSING_USER_ID: &str = "N/A";

/// Reference code to row, iterated in first-seen order.
///
/// A repeated code replaces the stored row but keeps its original position.
#[derive(Debug, Default)]
pub struct ReferenceIndex<'a> {
    order: Vec<String>,
    rows: HashMap<String, &'a Row>,
}

impl<'a> ReferenceIndex<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns true when an earlier row was replaced.
    pub fn insert(&mut self, code: String, row: &'a Row) -> bool {
        match self.rows.insert(code.clone(), row) {
            Some(_) => true,
            None => {
                self.order.push(code);
                false
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&'a Row> {
        self.rows.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rows.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &'a Row)> + '_ {
        self.order
            .iter()
            .filter_map(move |code| self.rows.get(code).map(|row| (code.as_str(), *row)))
    }
}

/// How one source's rows were indexed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub rows: usize,
    pub indexed: usize,
    pub without_code: usize,
    pub duplicates: usize,
}

/// Counters of a finished run, for logs and metrics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationSummary {
    pub input: IndexStats,
    pub bank: IndexStats,
    pub matched: usize,
    pub missing_in_bank: usize,
    pub excess_in_bank: usize,
    pub amount_mismatch: usize,
}

impl ReconciliationSummary {
    pub fn count(&self, status: DiscrepancyStatus) -> usize {
        match status {
            DiscrepancyStatus::MissingInBank => self.missing_in_bank,
            DiscrepancyStatus::ExcessInBank => self.excess_in_bank,
            DiscrepancyStatus::AmountMismatch => self.amount_mismatch,
        }
    }

    pub fn discrepancies(&self) -> usize {
        self.missing_in_bank + self.excess_in_bank + self.amount_mismatch
    }

    fn record(&mut self, status: DiscrepancyStatus) {
        match status {
            DiscrepancyStatus::MissingInBank => self.missing_in_bank += 1,
            DiscrepancyStatus::ExcessInBank => self.excess_in_bank += 1,
            DiscrepancyStatus::AmountMismatch => self.amount_mismatch += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub records: Vec<DiscrepancyRecord>,
    pub summary: ReconciliationSummary,
}

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    missing_user_id: String,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MISSING_USER_ID)
    }
}

impl ReconciliationEngine {
    pub fn new(missing_user_id: impl Into<String>) -> Self {
        Self {
            missing_user_id: missing_user_id.into(),
        }
    }

    /// Discrepancy records only: missing/mismatched in ledger order, then
    /// excess in bank order.
    pub fn reconcile(&self, input_rows: &[Row], bank_rows: &[Row]) -> Vec<DiscrepancyRecord> {
        self.run(input_rows, bank_rows).records
    }

    pub fn run(&self, input_rows: &[Row], bank_rows: &[Row]) -> Reconciliation {
        let mut summary = ReconciliationSummary::default();

        let (input_index, input_stats) = build_index(input_rows, |row| {
            explicit_reference_code(row).or_else(|| extract_reference_code(row))
        });
        let (bank_index, bank_stats) = build_index(bank_rows, extract_reference_code);
        summary.input = input_stats;
        summary.bank = bank_stats;

        let mut records = Vec::new();

        for (code, input_row) in input_index.iter() {
            let user_id = self.user_id(input_row);
            let updated_amount = input_row
                .get(UPDATED_AMOUNT_COLUMN)
                .map(normalize_amount)
                .unwrap_or_else(|| DEFAULT_AMOUNT.to_string());

            let record = match bank_index.get(code) {
                None => Some(DiscrepancyRecord::missing_in_bank(
                    user_id,
                    code.to_string(),
                    updated_amount,
                )),
                Some(bank_row) => {
                    let bank_amount = extract_amount(bank_row);
                    if bank_amount == updated_amount {
                        summary.matched += 1;
                        None
                    } else {
                        Some(DiscrepancyRecord::amount_mismatch(
                            user_id,
                            code.to_string(),
                            bank_amount,
                            updated_amount,
                        ))
                    }
                }
            };

            if let Some(record) = record {
                summary.record(record.status);
                records.push(record);
            }
        }

        for (code, bank_row) in bank_index.iter() {
            if input_index.contains(code) {
                continue;
            }
            let record = DiscrepancyRecord::excess_in_bank(code.to_string(), extract_amount(bank_row));
            summary.record(record.status);
            records.push(record);
        }

        tracing::debug!(
            input_rows = summary.input.rows,
            input_indexed = summary.input.indexed,
            input_without_code = summary.input.without_code,
            input_duplicates = summary.input.duplicates,
            bank_rows = summary.bank.rows,
            bank_indexed = summary.bank.indexed,
            bank_without_code = summary.bank.without_code,
            bank_duplicates = summary.bank.duplicates,
            matched = summary.matched,
            missing_in_bank = summary.missing_in_bank,
            excess_in_bank = summary.excess_in_bank,
            amount_mismatch = summary.amount_mismatch,
            "Reconciliation computed"
        );

        Reconciliation { records, summary }
    }

    fn user_id(&self, row: &Row) -> String {
        row.get(USER_ID_COLUMN)
            .filter(|value| !value.is_blank())
            .and_then(|value| value.as_text())
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| self.missing_user_id.clone())
    }
}

/// Reconcile with the default engine settings.
pub fn reconcile(input_rows: &[Row], bank_rows: &[Row]) -> Vec<DiscrepancyRecord> {
    ReconciliationEngine::default().reconcile(input_rows, bank_rows)
}

fn build_index<F>(rows: &[Row], reference_code: F) -> (ReferenceIndex<'_>, IndexStats)
where
    F: Fn(&Row) -> Option<String>,
{
    let mut index = ReferenceIndex::new();
    let mut stats = IndexStats {
        rows: rows.len(),
        ..IndexStats::default()
    };

    for row in rows {
        match reference_code(row) {
            Some(code) => {
                if index.insert(code, row) {
                    stats.duplicates += 1;
                }
            }
            None => stats.without_code += 1,
        }
    }

    stats.indexed = index.len();
    (index, stats)
}
