//! Column heuristics that pull an amount and a reference code (UTR) out of
//! loosely structured spreadsheet rows.
//!
//! Each concept is a fixed list of lowercase substrings. The first column, in
//! the row's own order, whose lowercased name contains any of them is used.

use crate::models::{CellValue, Row};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Reported amount when no usable value is found.
pub const DEFAULT_AMOUNT: &str = "0.00";

/// Dedicated column that carries a pre-assigned UTR on ledger rows.
pub const EXPLICIT_REFERENCE_COLUMN: &str = "Utr";

const AMOUNT_COLUMN_MARKERS: &[&str] = &["amount", "deposit"];

const REFERENCE_COLUMN_MARKERS: &[&str] = &["description", "tracking", "narration", "utr"];

/// Ten or more uppercase letters or digits in a row.
static REFERENCE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z0-9]{10,}").expect("Invalid reference code pattern"));

/// Leading number of a cell: sign, digits, fraction, exponent. Trailing text is ignored.
static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?)(\d*)(?:\.(\d*))?(?:[eE]([+-]?\d+))?")
        .expect("Invalid leading number pattern")
});

fn find_column<'r>(row: &'r Row, markers: &[&str]) -> Option<&'r CellValue> {
    row.columns()
        .find(|(name, _)| {
            let name = name.to_lowercase();
            markers.iter().any(|marker| name.contains(marker))
        })
        .map(|(_, value)| value)
}

/// Amount of a bank row, as a two-decimal string.
pub fn extract_amount(row: &Row) -> String {
    match find_column(row, AMOUNT_COLUMN_MARKERS) {
        Some(value) => normalize_amount(value),
        None => DEFAULT_AMOUNT.to_string(),
    }
}

/// Strip thousands separators and render with exactly two fractional digits.
///
/// Only the leading number counts, so "1,000.00 CR" is "1000.00". Blank input,
/// or text that does not start with a number, yields [`DEFAULT_AMOUNT`].
pub fn normalize_amount(value: &CellValue) -> String {
    if value.is_blank() {
        return DEFAULT_AMOUNT.to_string();
    }

    value
        .as_text()
        .and_then(|text| parse_decimal(&text.replace(',', "")))
        .map(format_amount)
        .unwrap_or_else(|| DEFAULT_AMOUNT.to_string())
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let caps = LEADING_NUMBER.captures(text.trim())?;
    let sign = caps.get(1).map_or("", |m| m.as_str());
    let int = caps.get(2).map_or("", |m| m.as_str());
    let frac = caps.get(3).map_or("", |m| m.as_str());
    if int.is_empty() && frac.is_empty() {
        return None;
    }

    let int = if int.is_empty() { "0" } else { int };
    let mantissa = if frac.is_empty() {
        format!("{}{}", sign, int)
    } else {
        format!("{}{}.{}", sign, int, frac)
    };

    match caps.get(4) {
        Some(exp) => {
            let exp = exp.as_str().trim_start_matches('+');
            Decimal::from_scientific(&format!("{}e{}", mantissa, exp)).ok()
        }
        None => Decimal::from_str(&mantissa).ok(),
    }
}

fn format_amount(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded.rescale(2);
    rounded.to_string()
}

/// UTR found by column heuristic, if any.
pub fn extract_reference_code(row: &Row) -> Option<String> {
    let value = find_column(row, REFERENCE_COLUMN_MARKERS)?;
    if value.is_blank() {
        return None;
    }
    let text = value.as_text()?;
    find_reference_code(&text).map(str::to_string)
}

/// First run of at least ten uppercase letters or digits.
pub fn find_reference_code(text: &str) -> Option<&str> {
    REFERENCE_CODE.find(text).map(|m| m.as_str())
}

/// Pre-assigned UTR from the dedicated column, taken verbatim (trimmed).
pub fn explicit_reference_code(row: &Row) -> Option<String> {
    let value = row.get(EXPLICIT_REFERENCE_COLUMN)?;
    if value.is_blank() {
        return None;
    }
    value.as_text().map(|text| text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_strips_thousands_separators() {
        let row = Row::new().with("Amount", "1,234.5");
        assert_eq!(extract_amount(&row), "1234.50");
    }

    #[test]
    fn test_amount_from_numeric_cell() {
        let row = Row::new().with("Amount INR", 100);
        assert_eq!(extract_amount(&row), "100.00");

        let row = Row::new().with("Amount INR", 99.999);
        assert_eq!(extract_amount(&row), "100.00");
    }

    #[test]
    fn test_amount_matches_deposit_columns() {
        let row = Row::new().with("Date", "01/04").with("Deposits", "75,000");
        assert_eq!(extract_amount(&row), "75000.00");
    }

    #[test]
    fn test_amount_uses_first_matching_column() {
        let row = Row::new()
            .with("Withdrawal Amount", "10")
            .with("Deposit Amount", "20");
        assert_eq!(extract_amount(&row), "10.00");
    }

    #[test]
    fn test_amount_column_name_is_case_insensitive() {
        let row = Row::new().with("TXN AMOUNT", "5");
        assert_eq!(extract_amount(&row), "5.00");
    }

    #[test]
    fn test_amount_defaults_when_missing_or_blank() {
        assert_eq!(extract_amount(&Row::new().with("Balance", "10")), "0.00");
        assert_eq!(extract_amount(&Row::new().with("Amount", "")), "0.00");
        assert_eq!(extract_amount(&Row::new().with("Amount", CellValue::Empty)), "0.00");
    }

    #[test]
    fn test_amount_defaults_when_unparseable() {
        assert_eq!(extract_amount(&Row::new().with("Amount", "n/a")), "0.00");
        assert_eq!(extract_amount(&Row::new().with("Amount", f64::NAN)), "0.00");
    }

    #[test]
    fn test_amount_uses_leading_number() {
        assert_eq!(normalize_amount(&CellValue::from("1,000.00 CR")), "1000.00");
        assert_eq!(normalize_amount(&CellValue::from("500 INR")), "500.00");
        assert_eq!(normalize_amount(&CellValue::from("-.5 DR")), "-0.50");
        assert_eq!(normalize_amount(&CellValue::from("12.")), "12.00");
        assert_eq!(normalize_amount(&CellValue::from("1.5e2xyz")), "150.00");
        assert_eq!(normalize_amount(&CellValue::from("7e")), "7.00");
    }

    #[test]
    fn test_amount_without_leading_number_defaults() {
        assert_eq!(normalize_amount(&CellValue::from("CR 100")), "0.00");
        assert_eq!(normalize_amount(&CellValue::from(".")), "0.00");
        assert_eq!(normalize_amount(&CellValue::from("-")), "0.00");
    }

    #[test]
    fn test_amount_keeps_sign_and_rounds_half_away_from_zero() {
        assert_eq!(normalize_amount(&CellValue::from("-1,000")), "-1000.00");
        assert_eq!(normalize_amount(&CellValue::from("2.345")), "2.35");
        assert_eq!(normalize_amount(&CellValue::from("-0.001")), "0.00");
        assert_eq!(normalize_amount(&CellValue::from(" 42 ")), "42.00");
        assert_eq!(normalize_amount(&CellValue::from("1e3")), "1000.00");
    }

    #[test]
    fn test_reference_code_from_narration() {
        let row = Row::new().with("Narration", "Payment ref ABCDEF12345 done");
        assert_eq!(extract_reference_code(&row).as_deref(), Some("ABCDEF12345"));
    }

    #[test]
    fn test_reference_code_takes_first_long_run() {
        assert_eq!(
            find_reference_code("UPI/SHORT1/ABCDE12345/ZZZZZZZZZZZZ"),
            Some("ABCDE12345")
        );
        assert_eq!(find_reference_code("lowercase abcdef12345"), None);
        assert_eq!(find_reference_code("ABC123456"), None);
    }

    #[test]
    fn test_reference_code_column_markers() {
        for column in ["Description", "Tracking ID", "NARRATION", "Bank UTR"] {
            let row = Row::new().with(column, "NEFT-HDFC0001234567");
            assert_eq!(
                extract_reference_code(&row).as_deref(),
                Some("HDFC0001234567"),
                "column {column}"
            );
        }
    }

    #[test]
    fn test_reference_code_only_checks_first_matching_column() {
        let row = Row::new()
            .with("Description", "cash deposit")
            .with("Narration", "ABCDEF1234567890");
        assert_eq!(extract_reference_code(&row), None);
    }

    #[test]
    fn test_reference_code_absent_without_column_or_value() {
        assert_eq!(extract_reference_code(&Row::new().with("Remarks", "ABCDEF1234567890")), None);
        assert_eq!(extract_reference_code(&Row::new().with("Narration", "")), None);
    }

    #[test]
    fn test_reference_code_from_numeric_cell() {
        let row = Row::new().with("UTR", 412345678901_i64);
        assert_eq!(extract_reference_code(&row).as_deref(), Some("412345678901"));
    }

    #[test]
    fn test_explicit_reference_code() {
        let row = Row::new().with("utr", " XYZ1234567890 ");
        assert_eq!(explicit_reference_code(&row).as_deref(), Some("XYZ1234567890"));

        assert_eq!(explicit_reference_code(&Row::new().with("Utr", "  ")), None);
        assert_eq!(explicit_reference_code(&Row::new().with("Bank UTR", "X")), None);
    }
}
