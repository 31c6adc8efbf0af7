//! Test utilities for tally-core
//!
//! Small builders for transactions and monthly series, shared by unit tests
//! here and by the CLI crate's tests through the `test-utils` feature.

use chrono::{Duration, NaiveDate};

use crate::models::{MonthlyValue, Transaction, YearMonth};

/// Build a month, panicking on an invalid month number
pub fn ym(year: i32, month: u32) -> YearMonth {
    YearMonth::new(year, month).unwrap()
}

/// Build a transaction from a `YYYY-MM-DD` date
pub fn tx(date: &str, category: &str, amount: f64) -> Transaction {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    Transaction::new(date, format!("{} purchase", category), category, amount)
}

/// One "Misc" transaction per amount on consecutive days from 2025-01-01
pub fn amounts_to_transactions(amounts: &[f64]) -> Vec<Transaction> {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    amounts
        .iter()
        .enumerate()
        .map(|(i, &amount)| {
            Transaction::new(
                start + Duration::days(i as i64),
                format!("item {}", i),
                "Misc",
                amount,
            )
        })
        .collect()
}

/// Consecutive monthly values starting at `start`
pub fn monthly_series(start: YearMonth, values: &[f64]) -> Vec<MonthlyValue> {
    let mut month = start;
    values
        .iter()
        .map(|&value| {
            let point = MonthlyValue::new(month, value);
            month = month.succ();
            point
        })
        .collect()
}

/// Deterministic expense-like series: trend, yearly cycle and bounded noise
pub fn seasonal_values(n: usize) -> Vec<f64> {
    (0..n)
        .map(|t| {
            let t_f = t as f64;
            let cycle = (2.0 * std::f64::consts::PI * t_f / 12.0).sin();
            let noise = ((t * 37) % 11) as f64 - 5.0;
            1000.0 + 5.0 * t_f + 150.0 * cycle + 8.0 * noise
        })
        .collect()
}

/// A small household ledger covering `months` consecutive months from January 2024
pub fn household_transactions(months: usize) -> Vec<Transaction> {
    let mut transactions = Vec::new();
    let mut month = ym(2024, 1);
    for i in 0..months {
        let day = |d: u32| {
            NaiveDate::from_ymd_opt(month.year(), month.month(), d).unwrap()
        };
        let bump = ((i * 7) % 5) as f64 * 20.0;
        transactions.push(Transaction::new(day(1), "Payroll", "Salary", 3000.0));
        transactions.push(Transaction::new(day(2), "Landlord", "Rent", -1200.0));
        transactions.push(Transaction::new(day(9), "Market", "Groceries", -250.0 - bump));
        transactions.push(Transaction::new(
            day(18),
            "Cinema",
            "Entertainment",
            -60.0 - bump / 2.0,
        ));
        transactions.push(Transaction::new(day(25), "Power", "Utilities", -90.0));
        month = month.succ();
    }
    transactions
}
