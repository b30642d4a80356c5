//! Tabular file I/O: uploaded sheets in, discrepancy report out.
//!
//! Reading follows the header-row-as-keys convention on the first sheet.
//! Blank cells are left out of each row, so column heuristics only ever see
//! populated columns.

use crate::models::{
    CellValue, DiscrepancyRecord, ReportFormat, Row, REPORT_COLUMNS, REPORT_SHEET_NAME,
};
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Workbook has no sheets")]
    NoSheets,

    #[error("Failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write XLSX: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extensions handed to calamine.
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Lowercased extension of `path`, if any.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Decode the first sheet of `path` into rows.
pub fn read_rows(path: &Path) -> Result<Vec<Row>, SpreadsheetError> {
    let ext = file_extension(path).unwrap_or_default();
    let grid = if ext == "csv" {
        read_csv_grid(path)?
    } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
        read_workbook_grid(path)?
    } else {
        return Err(SpreadsheetError::UnsupportedFormat(if ext.is_empty() {
            "(none)".to_string()
        } else {
            ext
        }));
    };

    Ok(rows_from_grid(grid))
}

fn read_workbook_grid(path: &Path) -> Result<Vec<Vec<CellValue>>, SpreadsheetError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoSheets)??;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Empty,
    }
}

fn read_csv_grid(path: &Path) -> Result<Vec<Vec<CellValue>>, SpreadsheetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut grid = Vec::new();
    for record in rdr.records() {
        let record = record?;
        grid.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(grid)
}

/// First non-blank line is the header; later lines become rows keyed by it.
fn rows_from_grid(grid: Vec<Vec<CellValue>>) -> Vec<Row> {
    let mut lines = grid.into_iter();
    let header = match lines.by_ref().find(|line| line.iter().any(|c| !c.is_blank())) {
        Some(line) => header_names(&line),
        None => return Vec::new(),
    };

    lines
        .filter_map(|line| {
            let row: Row = header
                .iter()
                .zip(line)
                .filter_map(|(name, value)| match name {
                    Some(name) if !value.is_blank() => Some((name.clone(), value)),
                    _ => None,
                })
                .collect();
            (!row.is_empty()).then_some(row)
        })
        .collect()
}

/// Column names by position. Blank headers are dropped; repeated names get a
/// `_1`, `_2`, ... suffix.
fn header_names(line: &[CellValue]) -> Vec<Option<String>> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    line.iter()
        .map(|cell| {
            let name = cell.as_text()?;
            let name = name.trim_start_matches('\u{feff}').trim();
            if name.is_empty() {
                return None;
            }
            let count = seen.entry(name.to_string()).or_insert(0);
            let unique = if *count == 0 {
                name.to_string()
            } else {
                format!("{}_{}", name, count)
            };
            *count += 1;
            Some(unique)
        })
        .collect()
}

/// Encode the report. The header row is always present.
pub fn write_report(
    records: &[DiscrepancyRecord],
    format: ReportFormat,
) -> Result<Vec<u8>, SpreadsheetError> {
    match format {
        ReportFormat::Xlsx => write_xlsx(records),
        ReportFormat::Csv => write_csv(records),
        ReportFormat::Json => Ok(serde_json::to_vec_pretty(records)?),
    }
}

fn write_xlsx(records: &[DiscrepancyRecord]) -> Result<Vec<u8>, SpreadsheetError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(REPORT_SHEET_NAME)?;

    for (col, title) in REPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, value) in record.cells().iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(row, col as u16, value)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_csv(records: &[DiscrepancyRecord]) -> Result<Vec<u8>, SpreadsheetError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(REPORT_COLUMNS)?;
    for record in records {
        wtr.write_record(record.cells())?;
    }
    wtr.into_inner().map_err(|e| SpreadsheetError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_csv_rows_keyed_by_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "bank.csv",
            b"\xef\xbb\xbfDate,Narration,Withdrawal Amount,Deposit Amount\n\
              01/04,NEFT ABCDEF123456,,\"1,000.00\"\n\
              ,,,\n\
              02/04,ATM,500,\n",
        );

        let rows = read_rows(&path).unwrap();

        assert_eq!(rows.len(), 2);
        let names: Vec<_> = rows[0].columns().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Date", "Narration", "Deposit Amount"]);
        assert_eq!(rows[0].get("Deposit Amount"), Some(&CellValue::from("1,000.00")));
        assert_eq!(rows[1].get("Withdrawal Amount"), Some(&CellValue::from("500")));
    }

    #[test]
    fn test_header_skips_leading_blank_lines_and_dedups_names() {
        let grid = vec![
            vec![CellValue::Empty, CellValue::Empty],
            vec![
                CellValue::from("Amount"),
                CellValue::from("Amount"),
                CellValue::Empty,
            ],
            vec![CellValue::from(1), CellValue::from(2), CellValue::from("x")],
        ];

        let rows = rows_from_grid(grid);

        assert_eq!(rows.len(), 1);
        let cells: Vec<_> = rows[0].columns().map(|(n, v)| (n.to_string(), v.clone())).collect();
        assert_eq!(
            cells,
            vec![
                ("Amount".to_string(), CellValue::Number(1.0)),
                ("Amount_1".to_string(), CellValue::Number(2.0)),
            ]
        );
    }

    #[test]
    fn test_empty_grid_has_no_rows() {
        assert!(rows_from_grid(Vec::new()).is_empty());
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "statement.pdf", b"%PDF");

        assert!(matches!(
            read_rows(&path),
            Err(SpreadsheetError::UnsupportedFormat(ext)) if ext == "pdf"
        ));
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        assert_eq!(file_extension(Path::new("Ledger.XLSX")).as_deref(), Some("xlsx"));
        assert_eq!(file_extension(Path::new("bank.csv")).as_deref(), Some("csv"));
        assert_eq!(file_extension(Path::new("noext")), None);
    }

    #[test]
    fn test_corrupt_workbook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "input.xlsx", b"not a zip archive");

        assert!(read_rows(&path).is_err());
    }

    #[test]
    fn test_xlsx_report_round_trips_through_reader() {
        let records = vec![
            DiscrepancyRecord::missing_in_bank(
                "U2".to_string(),
                "XYZ1234567890".to_string(),
                "50.00".to_string(),
            ),
            DiscrepancyRecord::excess_in_bank(
                "QWERTY1234567890".to_string(),
                "75000.00".to_string(),
            ),
        ];
        let bytes = write_report(&records, ReportFormat::Xlsx).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "report.xlsx", &bytes);
        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec![REPORT_SHEET_NAME.to_string()]);

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("UTR"), Some(&CellValue::from("'XYZ1234567890")));
        assert_eq!(rows[0].get("Amount"), None);
        assert_eq!(rows[1].get("Status"), Some(&CellValue::from("Excess in Bank")));
    }

    #[test]
    fn test_csv_report_has_header_even_when_empty() {
        let bytes = write_report(&[], ReportFormat::Csv).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "User Id,UTR,Status,Amount,Mismatched Amount\n"
        );
    }

    #[test]
    fn test_csv_report_rows() {
        let records = vec![DiscrepancyRecord::amount_mismatch(
            "U3".to_string(),
            "MISMATCH123456".to_string(),
            "1499.99".to_string(),
            "1500.00".to_string(),
        )];

        let text = String::from_utf8(write_report(&records, ReportFormat::Csv).unwrap()).unwrap();

        assert_eq!(
            text.lines().nth(1),
            Some("U3,'MISMATCH123456,Amount Mismatch,1499.99,1500.00")
        );
    }

    #[test]
    fn test_json_report_is_array_of_objects() {
        let bytes = write_report(&[], ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, serde_json::json!([]));
    }
}
