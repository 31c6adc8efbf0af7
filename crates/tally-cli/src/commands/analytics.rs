//! Analytics command implementations (anomalies, forecast, clusters, report)

use anyhow::{Context, Result};
use tally_core::{
    aggregate, cluster, detect, expense_series, forecast, format_months, AnalyticsConfig,
    AnomalyMethod, AnomalyScope, Clustering, Dataset, Forecast, Pipeline, StageOutcome,
};

use super::truncate;

pub fn cmd_anomalies(
    dataset: &Dataset,
    config: &AnalyticsConfig,
    category: Option<&str>,
    threshold: Option<f64>,
    method: Option<&str>,
    all: bool,
    json: bool,
) -> Result<()> {
    let mut detector = config.detector.clone();
    if let Some(threshold) = threshold {
        detector.threshold = threshold;
    }
    if let Some(method) = method {
        detector.method = method
            .parse::<AnomalyMethod>()
            .map_err(anyhow::Error::msg)?;
    }

    let scope = match category {
        Some(category) => AnomalyScope::Category(category.to_string()),
        None => AnomalyScope::All,
    };

    let records = detect(dataset.transactions(), &scope, &detector)?;
    let shown: Vec<_> = records.iter().filter(|r| all || r.flagged).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    let flagged = records.iter().filter(|r| r.flagged).count();
    if flagged == 0 && !all {
        println!(
            "✅ No anomalies among {} transactions. Your spending looks typical!",
            records.len()
        );
        return Ok(());
    }

    println!();
    println!("🚨 Unusual Transactions");
    if let Some(record) = records.first() {
        println!(
            "   Method: {} │ {} scored │ {} flagged",
            record.method,
            records.len(),
            flagged
        );
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:10} │ {:15} │ {:>10} │ {:>7} │ Description",
        "Date", "Category", "Amount", "Score"
    );
    println!("   ───────────┼─────────────────┼────────────┼─────────┼────────────");

    for record in &shown {
        let tx = record.transaction;
        let marker = if record.flagged { " 🚨" } else { "" };
        println!(
            "   {:10} │ {:15} │ {:>10.2} │ {:>7.2} │ {}{}",
            tx.date,
            truncate(&tx.category, 15),
            tx.amount,
            record.score,
            truncate(&tx.description, 30),
            marker
        );
    }

    Ok(())
}

pub fn cmd_forecast(
    dataset: &Dataset,
    config: &AnalyticsConfig,
    horizon: Option<usize>,
    confidence: Option<f64>,
    json: bool,
) -> Result<()> {
    let mut forecast_config = config.forecast.clone();
    if let Some(confidence) = confidence {
        forecast_config.confidence = confidence;
    }
    let horizon = horizon.unwrap_or(config.report.forecast_horizon);

    let monthly = aggregate(dataset.transactions()).context("Failed to aggregate transactions")?;
    let result = forecast(&expense_series(&monthly), horizon, &forecast_config)
        .context("Unable to forecast expenses")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_forecast(&result, forecast_config.confidence);
    Ok(())
}

fn print_forecast(result: &Forecast, confidence: f64) {
    println!();
    println!("🔮 Expense Forecast");
    println!(
        "   Model: {} by {} │ {:.0}% interval",
        result.order,
        result.estimator,
        confidence * 100.0
    );
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:8} │ {:>11} │ {:>11} │ {:>11}",
        "Month", "Forecast", "Lower", "Upper"
    );
    println!("   ─────────┼─────────────┼─────────────┼─────────────");

    for point in &result.points {
        println!(
            "   {:8} │ {:>11.2} │ {:>11.2} │ {:>11.2}",
            point.month.to_string(),
            point.predicted_expense,
            point.lower_ci,
            point.upper_ci
        );
    }
}

pub fn cmd_clusters(
    dataset: &Dataset,
    config: &AnalyticsConfig,
    k: Option<usize>,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut cluster_config = config.cluster.clone();
    if let Some(k) = k {
        cluster_config.k = k;
    }
    if let Some(seed) = seed {
        cluster_config.seed = seed;
    }

    let monthly = aggregate(dataset.transactions()).context("Failed to aggregate transactions")?;
    let result = cluster(&expense_series(&monthly), &cluster_config)
        .context("Unable to cluster monthly spending")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_clusters(&result);
    Ok(())
}

fn print_clusters(result: &Clustering) {
    println!();
    println!("🗂️  Spending Clusters");
    println!(
        "   Low ≤ {:.2} < Medium ≤ {:.2} < High",
        result.q1, result.q2
    );
    println!("   ─────────────────────────────────────────────────────────────");

    for summary in result.summaries() {
        println!(
            "   Cluster {} │ avg ${:.2} │ {}",
            summary.cluster_id,
            summary.mean_spending,
            summary.level.description()
        );
        println!("      {}", format_months(&summary.months));
    }

    println!();
    println!(
        "   {:8} │ {:>11} │ {:>7} │ Level",
        "Month", "Spending", "Cluster"
    );
    println!("   ─────────┼─────────────┼─────────┼────────");
    for label in &result.labels {
        println!(
            "   {:8} │ {:>11.2} │ {:>7} │ {}",
            label.month.to_string(),
            label.total_spending,
            label.cluster_id,
            label.level
        );
    }
}

pub fn cmd_report(dataset: &Dataset, config: &AnalyticsConfig, json: bool) -> Result<()> {
    let report = Pipeline::new(config.clone())
        .run(dataset)
        .context("Failed to run analytics")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("📋 Tally Report");
    println!(
        "   {} transactions over {} months",
        report.transaction_count,
        report.monthly.len()
    );
    println!("   ─────────────────────────────────────────────────────────────");

    match &report.kpis {
        StageOutcome::Ready(kpis) => {
            println!("   Income:       ${:>12.2}", kpis.income);
            println!("   Expenses:     ${:>12.2}", kpis.expenses);
            println!("   Savings:      ${:>12.2}", kpis.savings);
            println!("   Savings rate: {}", kpis.savings_rate);
        }
        StageOutcome::Unavailable { reason, .. } => print_unavailable("KPIs", reason),
    }

    println!();
    match &report.anomalies {
        StageOutcome::Ready(_) => {
            let flagged = report.flagged_anomalies();
            if flagged.is_empty() {
                println!("   ✅ No unusual transactions");
            } else {
                println!("   🚨 {} unusual transactions:", flagged.len());
                for anomaly in flagged {
                    println!(
                        "      {} {:15} {:>10.2} (score {:.2})",
                        anomaly.date,
                        truncate(&anomaly.category, 15),
                        anomaly.amount,
                        anomaly.score
                    );
                }
            }
        }
        StageOutcome::Unavailable { reason, .. } => print_unavailable("Anomalies", reason),
    }

    match &report.forecast {
        StageOutcome::Ready(result) => print_forecast(result, config.forecast.confidence),
        StageOutcome::Unavailable { reason, .. } => {
            println!();
            print_unavailable("Forecast", reason);
        }
    }

    match &report.clusters {
        StageOutcome::Ready(result) => print_clusters(result),
        StageOutcome::Unavailable { reason, .. } => {
            println!();
            print_unavailable("Clusters", reason);
        }
    }

    Ok(())
}

fn print_unavailable(stage: &str, reason: &str) {
    println!("   ⚠️  {} unavailable: {}", stage, reason);
}
