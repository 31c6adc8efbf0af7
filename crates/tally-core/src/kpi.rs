//! Key performance indicators over a period of monthly aggregates

use crate::error::Result;
use crate::models::{KpiSet, MonthlyAggregate, Period, SavingsRate};

/// Compute Income / Expenses / Savings / Savings-Rate for the selected months
///
/// Totals are summed over every aggregate whose month falls inside `period`.
/// A period containing no income yields [`SavingsRate::Undefined`].
pub fn compute_kpis(aggregates: &[MonthlyAggregate], period: &Period) -> Result<KpiSet> {
    period.validate()?;

    let mut income = 0.0;
    let mut expenses = 0.0;
    let mut months = 0;

    for aggregate in aggregates.iter().filter(|a| period.contains(a.month)) {
        income += aggregate.income_total;
        expenses += aggregate.expense_total;
        months += 1;
    }

    let savings = income - expenses;
    let savings_rate = if income > 0.0 {
        SavingsRate::Percent(savings / income * 100.0)
    } else {
        SavingsRate::Undefined
    };

    Ok(KpiSet {
        period: *period,
        months,
        income,
        expenses,
        savings,
        savings_rate,
    })
}
