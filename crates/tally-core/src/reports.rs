//! Spending reports built on monthly aggregates
//!
//! These are presentation-oriented summaries: where the money went in a
//! period, and how a month compared to a per-category budget.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::normalize_category;
use crate::error::Result;
use crate::models::{MonthlyAggregate, Period, YearMonth};

/// A spending category in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category: String,
    pub amount: f64,
    /// Share of the period's expenses, 0-100
    pub percentage: f64,
}

/// Expense totals per category over `period`, largest first
pub fn category_breakdown(
    aggregates: &[MonthlyAggregate],
    period: &Period,
) -> Result<Vec<CategorySpending>> {
    period.validate()?;

    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for aggregate in aggregates.iter().filter(|a| period.contains(a.month)) {
        for (category, amount) in &aggregate.category_expense_totals {
            *totals.entry(category.as_str()).or_insert(0.0) += amount;
        }
    }

    let total: f64 = totals.values().sum();
    let mut breakdown: Vec<CategorySpending> = totals
        .into_iter()
        .map(|(category, amount)| CategorySpending {
            category: category.to_string(),
            amount,
            percentage: if total > 0.0 { amount / total * 100.0 } else { 0.0 },
        })
        .collect();

    breakdown.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.category.cmp(&b.category))
    });
    Ok(breakdown)
}

/// Expected vs actual spending for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub category: String,
    pub expected: f64,
    pub actual: f64,
}

impl BudgetLine {
    /// Positive when spending exceeded the budget
    pub fn variance(&self) -> f64 {
        self.actual - self.expected
    }

    pub fn is_over_budget(&self) -> bool {
        self.actual > self.expected
    }
}

/// A month's spending measured against a budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetComparison {
    pub month: YearMonth,
    /// One line per category that was budgeted or spent on, by name
    pub lines: Vec<BudgetLine>,
    pub total_expected: f64,
    pub total_actual: f64,
}

impl BudgetComparison {
    /// The `n` categories with the highest actual spending
    pub fn top_categories(&self, n: usize) -> Vec<&BudgetLine> {
        let mut lines: Vec<&BudgetLine> = self.lines.iter().filter(|l| l.actual > 0.0).collect();
        lines.sort_by(|a, b| {
            b.actual
                .total_cmp(&a.actual)
                .then_with(|| a.category.cmp(&b.category))
        });
        lines.truncate(n);
        lines
    }

    pub fn total_variance(&self) -> f64 {
        self.total_actual - self.total_expected
    }
}

/// Compare one month's category spending with `expected` amounts
///
/// Budget keys are normalized the same way transaction categories are.
/// Categories with spending but no budget get an expected amount of 0.
///
/// Actuals come from the month's expense totals, so only negative amounts
/// count. A positive row in a spending category, such as a refund, is income
/// and neither adds to nor offsets that category's actual.
pub fn compare_budget(
    aggregate: &MonthlyAggregate,
    expected: &BTreeMap<String, f64>,
) -> BudgetComparison {
    let mut budget: BTreeMap<String, f64> = BTreeMap::new();
    for (category, amount) in expected {
        *budget.entry(normalize_category(category)).or_insert(0.0) += amount;
    }

    let mut lines: BTreeMap<String, BudgetLine> = BTreeMap::new();
    for (category, amount) in &budget {
        lines.insert(
            category.clone(),
            BudgetLine {
                category: category.clone(),
                expected: *amount,
                actual: 0.0,
            },
        );
    }
    for (category, amount) in &aggregate.category_expense_totals {
        lines
            .entry(category.clone())
            .or_insert_with(|| BudgetLine {
                category: category.clone(),
                expected: 0.0,
                actual: 0.0,
            })
            .actual = *amount;
    }

    let lines: Vec<BudgetLine> = lines.into_values().collect();
    let total_expected = lines.iter().map(|l| l.expected).sum();
    let total_actual = lines.iter().map(|l| l.actual).sum();

    BudgetComparison {
        month: aggregate.month,
        lines,
        total_expected,
        total_actual,
    }
}

/// Abbreviated month names in chronological order ("Jan, Feb, Mar")
pub fn format_months(months: &[YearMonth]) -> String {
    let mut sorted = months.to_vec();
    sorted.sort();
    sorted
        .iter()
        .map(|m| m.short_name())
        .collect::<Vec<_>>()
        .join(", ")
}
