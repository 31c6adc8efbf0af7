//! CSV import for transaction ledgers
//!
//! Expects a header row with `Date`, `Category` and `Amount` columns and an
//! optional `Description` column, in any order. Header names are matched
//! case-insensitively. Amounts are signed: negative for expenses.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Transaction;

struct Columns {
    date: usize,
    description: Option<usize>,
    category: usize,
    amount: usize,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                Error::InvalidInput(format!("CSV is missing the '{}' column", name))
            })
        };

        Ok(Self {
            date: require("date")?,
            description: find("description"),
            category: require("category")?,
            amount: require("amount")?,
        })
    }
}

/// Parse transactions from CSV data
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?)?;
    let mut transactions = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        // header is line 1
        let line = index + 2;

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let field = |column: usize, name: &str| {
            record
                .get(column)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::InvalidInput(format!("Row {}: missing {}", line, name)))
        };

        let date = parse_date(field(columns.date, "date")?)
            .map_err(|e| Error::InvalidInput(format!("Row {}: {}", line, e)))?;
        let amount = parse_amount(field(columns.amount, "amount")?)
            .map_err(|e| Error::InvalidInput(format!("Row {}: {}", line, e)))?;
        let category = record.get(columns.category).unwrap_or_default().to_string();
        let description = columns
            .description
            .and_then(|c| record.get(c))
            .unwrap_or_default()
            .to_string();

        transactions.push(Transaction::new(date, description, category, amount));
    }

    debug!("Parsed {} transactions", transactions.len());
    Ok(transactions)
}

/// Read and parse a CSV file
pub fn load_csv(path: &Path) -> Result<Vec<Transaction>> {
    let file = File::open(path)?;
    parse_csv(file)
}

/// Parse a date in any of the supported layouts
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%d/%m/%Y", // 15/01/2024 (European)
        "%d.%m.%Y", // 15.01.2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::InvalidInput(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols, commas and
/// parenthesized negatives
pub fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', '€', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    let amount = cleaned
        .parse::<f64>()
        .map_err(|_| Error::InvalidInput(format!("Unable to parse amount: {}", s)))?;
    if !amount.is_finite() {
        return Err(Error::InvalidInput(format!("Amount is not finite: {}", s)));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("2024-01-15").unwrap(), expected);
        assert_eq!(parse_date("01/15/2024").unwrap(), expected);
        assert_eq!(parse_date("15/01/2024").unwrap(), expected);
        assert_eq!(parse_date("15.01.2024").unwrap(), expected);
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount("-€45.00").unwrap(), -45.0);
        assert_eq!(parse_amount("(12.50)").unwrap(), -12.5);
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("NaN").is_err());
    }

    #[test]
    fn test_parse_csv() {
        let data = "\
Date,Description,Category,Amount
2025-01-01,Payroll,Salary,3000.00
2025-01-05,Corner shop,groceries,-45.20
2025-01-09,,Dining,\"-1,020.00\"
";
        let transactions = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions[0].amount, 3000.0);
        assert_eq!(transactions[1].category, "groceries");
        assert_eq!(transactions[1].description, "Corner shop");
        assert_eq!(transactions[2].amount, -1020.0);
        assert_eq!(transactions[2].description, "");
    }

    #[test]
    fn test_parse_csv_header_order_and_case() {
        let data = "AMOUNT, category ,date\n-10,Fees,2025-02-01\n";
        let transactions = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].category, "Fees");
        assert_eq!(
            transactions[0].date,
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_csv_skips_blank_rows() {
        let data = "Date,Category,Amount\n2025-01-01,Rent,-900\n,,\n2025-02-01,Rent,-900\n";
        assert_eq!(parse_csv(data.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_csv_reports_bad_row() {
        let data = "Date,Category,Amount\n2025-01-01,Rent,-900\nnot-a-date,Rent,-900\n";
        match parse_csv(data.as_bytes()) {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("Row 3")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_csv_missing_column() {
        let data = "Date,Description,Amount\n2025-01-01,Rent,-900\n";
        assert!(matches!(
            parse_csv(data.as_bytes()),
            Err(Error::InvalidInput(_))
        ));
    }
}
