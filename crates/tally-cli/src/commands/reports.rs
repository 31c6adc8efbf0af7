//! Report command implementations (months, KPIs, categories, budget)

use anyhow::{Context, Result};
use tally_core::{
    aggregate, category_breakdown, compare_budget, compute_kpis, normalize_category,
    AnalyticsConfig, Dataset, Period, YearMonth,
};

use super::core::parse_expectations;
use super::truncate;

pub fn cmd_months(dataset: &Dataset, json: bool) -> Result<()> {
    let monthly = aggregate(dataset.transactions()).context("Failed to aggregate transactions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&monthly)?);
        return Ok(());
    }

    println!();
    println!("📅 Monthly Totals");
    println!("   ─────────────────────────────────────────────────────────────");

    if monthly.is_empty() {
        println!("   No transactions found.");
        return Ok(());
    }

    println!(
        "   {:8} │ {:>11} │ {:>11} │ {:>11} │ {:>5}",
        "Month", "Income", "Expenses", "Net", "Count"
    );
    println!("   ─────────┼─────────────┼─────────────┼─────────────┼───────");

    for month in &monthly {
        println!(
            "   {:8} │ {:>11.2} │ {:>11.2} │ {:>11.2} │ {:>5}",
            month.month.to_string(),
            month.income_total,
            month.expense_total,
            month.net(),
            month.transaction_count
        );
    }

    Ok(())
}

pub fn cmd_kpis(dataset: &Dataset, period: &Period, json: bool) -> Result<()> {
    let monthly = aggregate(dataset.transactions()).context("Failed to aggregate transactions")?;
    let kpis = compute_kpis(&monthly, period)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&kpis)?);
        return Ok(());
    }

    println!();
    println!("📈 Key Figures");
    println!("   Period: {} ({} months with data)", period, kpis.months);
    println!("   ─────────────────────────────────────────────────────────────");

    if kpis.months == 0 {
        println!("   No transactions in this period.");
        return Ok(());
    }

    let average = kpis.monthly_average();
    println!("   {:15} │ {:>12} │ {:>12}", "", "Total", "Per month");
    println!("   ────────────────┼──────────────┼──────────────");
    println!(
        "   {:15} │ {:>12.2} │ {:>12.2}",
        "Income", kpis.income, average.income
    );
    println!(
        "   {:15} │ {:>12.2} │ {:>12.2}",
        "Expenses", kpis.expenses, average.expenses
    );
    println!(
        "   {:15} │ {:>12.2} │ {:>12.2}",
        "Savings", kpis.savings, average.savings
    );
    println!();
    println!("   Savings rate: {}", kpis.savings_rate);

    if !kpis.savings_rate.is_defined() {
        println!("   💡 No income recorded in this period");
    }

    Ok(())
}

pub fn cmd_categories(dataset: &Dataset, period: &Period, json: bool) -> Result<()> {
    let monthly = aggregate(dataset.transactions()).context("Failed to aggregate transactions")?;
    let breakdown = category_breakdown(&monthly, period)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    println!();
    println!("📊 Spending by Category");
    println!("   Period: {}", period);
    println!("   ─────────────────────────────────────────────────────────────");

    if breakdown.is_empty() {
        println!("   No spending found in this period.");
        return Ok(());
    }

    let total: f64 = breakdown.iter().map(|c| c.amount).sum();
    println!("   Total: ${:.2}", total);
    println!();
    println!("   {:25} │ {:>10} │ {:>6}", "Category", "Amount", "%");
    println!("   ──────────────────────────┼────────────┼────────");

    for category in &breakdown {
        println!(
            "   {:25} │ {:>10.2} │ {:>5.1}%",
            truncate(&category.category, 25),
            category.amount,
            category.percentage
        );
    }

    Ok(())
}

pub fn cmd_budget(
    dataset: &Dataset,
    config: &AnalyticsConfig,
    month: YearMonth,
    expectations: &[String],
    json: bool,
) -> Result<()> {
    let monthly = aggregate(dataset.transactions()).context("Failed to aggregate transactions")?;
    let totals = monthly
        .iter()
        .find(|m| m.month == month)
        .with_context(|| format!("No transactions found for {}", month))?;

    let mut expected = parse_expectations(expectations)?;
    let explicit: Vec<String> = expected.keys().map(|c| normalize_category(c)).collect();
    for category in totals.category_expense_totals.keys() {
        if !explicit.contains(category) {
            expected.insert(category.clone(), config.report.default_budget);
        }
    }

    let comparison = compare_budget(totals, &expected);

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }

    println!();
    println!("💰 Budget vs Actual: {}", month);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:22} │ {:>10} │ {:>10} │ {:>10}",
        "Category", "Expected", "Actual", "Variance"
    );
    println!("   ───────────────────────┼────────────┼────────────┼────────────");

    for line in &comparison.lines {
        let marker = if line.is_over_budget() { "⚠️ " } else { "  " };
        println!(
            "   {:22} │ {:>10.2} │ {:>10.2} │ {:>+10.2} {}",
            truncate(&line.category, 22),
            line.expected,
            line.actual,
            line.variance(),
            marker
        );
    }

    println!("   ───────────────────────┼────────────┼────────────┼────────────");
    println!(
        "   {:22} │ {:>10.2} │ {:>10.2} │ {:>+10.2}",
        "Total",
        comparison.total_expected,
        comparison.total_actual,
        comparison.total_variance()
    );

    let top = comparison.top_categories(config.report.top_categories);
    if !top.is_empty() {
        println!();
        println!("   Top spending:");
        for (i, line) in top.iter().enumerate() {
            println!("   {}. {} (${:.2})", i + 1, line.category, line.actual);
        }
    }

    if comparison.total_variance() > 0.0 {
        println!();
        println!(
            "   ⚠️  Over budget by ${:.2}",
            comparison.total_variance()
        );
    }

    Ok(())
}
