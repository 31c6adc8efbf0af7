//! Monthly aggregation of raw transactions
//!
//! Builds the ordered monthly series every other analytics stage consumes.
//! Months without transactions are never synthesized.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{MonthlyAggregate, MonthlyValue, Transaction, YearMonth};

/// Label used for transactions whose category is empty after normalization
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Normalize a category label: trim, collapse whitespace, title-case words
pub fn normalize_category(raw: &str) -> String {
    let words: Vec<String> = raw
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        words.join(" ")
    }
}

/// Reject amounts that would poison downstream sums
pub(crate) fn ensure_finite_amounts(transactions: &[Transaction]) -> Result<()> {
    if let Some(tx) = transactions.iter().find(|t| !t.amount.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "Non-numeric amount on {} ({}): {}",
            tx.date, tx.description, tx.amount
        )));
    }
    Ok(())
}

/// Canonical order used before summing so totals don't depend on input order
fn canonical_order(a: &(String, &Transaction), b: &(String, &Transaction)) -> Ordering {
    a.1.date
        .cmp(&b.1.date)
        .then_with(|| a.0.cmp(&b.0))
        .then_with(|| a.1.amount.total_cmp(&b.1.amount))
        .then_with(|| a.1.description.cmp(&b.1.description))
}

/// Group transactions into monthly aggregates, sorted ascending by month
pub fn aggregate(transactions: &[Transaction]) -> Result<Vec<MonthlyAggregate>> {
    ensure_finite_amounts(transactions)?;

    let mut by_month: BTreeMap<YearMonth, Vec<(String, &Transaction)>> = BTreeMap::new();
    for tx in transactions {
        by_month
            .entry(tx.month())
            .or_default()
            .push((normalize_category(&tx.category), tx));
    }

    let aggregates: Vec<MonthlyAggregate> = by_month
        .into_iter()
        .map(|(month, mut rows)| {
            rows.sort_by(canonical_order);

            let mut income_total = 0.0;
            let mut expense_total = 0.0;
            let mut category_expense_totals: BTreeMap<String, f64> = BTreeMap::new();

            for (category, tx) in &rows {
                if tx.amount > 0.0 {
                    income_total += tx.amount;
                } else if tx.amount < 0.0 {
                    let magnitude = tx.amount.abs();
                    expense_total += magnitude;
                    *category_expense_totals.entry(category.clone()).or_insert(0.0) += magnitude;
                }
            }

            MonthlyAggregate {
                month,
                income_total,
                expense_total,
                category_expense_totals,
                transaction_count: rows.len(),
            }
        })
        .collect();

    debug!(
        transactions = transactions.len(),
        months = aggregates.len(),
        "Aggregated transactions"
    );

    Ok(aggregates)
}

/// Monthly expense totals, in month order
pub fn expense_series(aggregates: &[MonthlyAggregate]) -> Vec<MonthlyValue> {
    aggregates
        .iter()
        .map(|a| MonthlyValue::new(a.month, a.expense_total))
        .collect()
}

/// Monthly income totals, in month order
pub fn income_series(aggregates: &[MonthlyAggregate]) -> Vec<MonthlyValue> {
    aggregates
        .iter()
        .map(|a| MonthlyValue::new(a.month, a.income_total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{tx, ym};

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("  groceries   store "), "Groceries Store");
        assert_eq!(normalize_category("SALARY"), "Salary");
        assert_eq!(normalize_category("eNtErTaInMeNt"), "Entertainment");
        assert_eq!(normalize_category("   "), UNCATEGORIZED);
    }

    #[test]
    fn test_aggregate_groups_by_month() {
        let transactions = vec![
            tx("2025-01-01", "Salary", 1000.0),
            tx("2025-01-15", "Groceries", -200.0),
            tx("2025-02-01", "Salary", 2000.0),
            tx("2025-02-15", "Entertainment", -300.0),
        ];

        let monthly = aggregate(&transactions).unwrap();
        assert_eq!(monthly.len(), 2);

        assert_eq!(monthly[0].month, ym(2025, 1));
        assert_eq!(monthly[0].income_total, 1000.0);
        assert_eq!(monthly[0].expense_total, 200.0);
        assert_eq!(monthly[0].category_expense_totals.get("Groceries"), Some(&200.0));
        assert!(!monthly[0].category_expense_totals.contains_key("Salary"));

        assert_eq!(monthly[1].month, ym(2025, 2));
        assert_eq!(monthly[1].income_total, 2000.0);
        assert_eq!(monthly[1].expense_total, 300.0);
    }

    #[test]
    fn test_aggregate_ignores_zero_amounts() {
        let transactions = vec![
            tx("2025-03-01", "Transfer", 0.0),
            tx("2025-03-02", "Groceries", -40.0),
        ];

        let monthly = aggregate(&transactions).unwrap();
        assert_eq!(monthly[0].income_total, 0.0);
        assert_eq!(monthly[0].expense_total, 40.0);
        assert!(!monthly[0].category_expense_totals.contains_key("Transfer"));
        assert_eq!(monthly[0].transaction_count, 2);
    }

    #[test]
    fn test_aggregate_merges_category_spellings() {
        let transactions = vec![
            tx("2025-03-01", "groceries", -10.0),
            tx("2025-03-02", " GROCERIES ", -15.0),
        ];

        let monthly = aggregate(&transactions).unwrap();
        assert_eq!(monthly[0].category_expense_totals.len(), 1);
        assert_eq!(monthly[0].category_expense_totals["Groceries"], 25.0);
    }

    #[test]
    fn test_aggregate_does_not_fill_gaps() {
        let transactions = vec![
            tx("2025-01-10", "Rent", -900.0),
            tx("2025-04-10", "Rent", -900.0),
        ];

        let monthly = aggregate(&transactions).unwrap();
        let months: Vec<_> = monthly.iter().map(|m| m.month).collect();
        assert_eq!(months, vec![ym(2025, 1), ym(2025, 4)]);
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let transactions = vec![
            tx("2025-01-03", "Dining", -12.1),
            tx("2025-01-04", "Dining", -0.7),
            tx("2025-01-05", "Dining", -33.33),
            tx("2024-12-31", "Salary", 2500.0),
            tx("2025-01-05", "Groceries", -101.01),
            tx("2025-02-01", "Dining", -0.1),
            tx("2025-02-01", "Dining", -0.2),
            tx("2025-02-01", "Dining", -0.3),
        ];

        let expected = aggregate(&transactions).unwrap();

        let mut reversed = transactions.clone();
        reversed.reverse();
        assert_eq!(aggregate(&reversed).unwrap(), expected);

        let mut rotated = transactions.clone();
        rotated.rotate_left(3);
        assert_eq!(aggregate(&rotated).unwrap(), expected);

        let months: Vec<_> = expected.iter().map(|m| m.month).collect();
        assert_eq!(months, vec![ym(2024, 12), ym(2025, 1), ym(2025, 2)]);
    }

    #[test]
    fn test_aggregate_rejects_non_finite_amount() {
        let transactions = vec![
            tx("2025-01-01", "Groceries", -100.0),
            tx("2025-02-01", "Groceries", f64::NAN),
        ];

        let result = aggregate(&transactions);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_expense_series() {
        let transactions = vec![
            tx("2025-01-01", "Salary", 1000.0),
            tx("2025-01-15", "Groceries", -200.0),
            tx("2025-02-15", "Groceries", -150.0),
        ];
        let monthly = aggregate(&transactions).unwrap();
        let series = expense_series(&monthly);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].value, 200.0);
        assert_eq!(series[1].value, 150.0);
        assert_eq!(income_series(&monthly)[0].value, 1000.0);
    }
}
