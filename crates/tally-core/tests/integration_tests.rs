//! Integration tests for tally-core
//!
//! These tests exercise the full CSV → aggregate → analytics workflow through
//! the public API only.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::NaiveDate;
use tally_core::{
    aggregate, category_breakdown, cluster, compare_budget, compute_kpis, detect, expense_series,
    forecast, parse_csv, AnalyticsConfig, AnomalyScope, ClusterConfig, Dataset, DetectorConfig,
    Error, ForecastConfig, KMeansInit, MonthlyValue, Period, Pipeline, SavingsRate, SpendingLevel,
    StageOutcome, Transaction, YearMonth,
};

fn ym(year: i32, month: u32) -> YearMonth {
    YearMonth::new(year, month).unwrap()
}

fn transactions_with_amounts(amounts: &[f64]) -> Vec<Transaction> {
    amounts
        .iter()
        .enumerate()
        .map(|(i, &amount)| {
            Transaction::new(
                NaiveDate::from_ymd_opt(2025, 3, 1 + i as u32).unwrap(),
                format!("purchase {}", i),
                "Shopping",
                amount,
            )
        })
        .collect()
}

fn series(start: YearMonth, values: &[f64]) -> Vec<MonthlyValue> {
    let mut month = start;
    values
        .iter()
        .map(|&v| {
            let point = MonthlyValue::new(month, v);
            month = month.succ();
            point
        })
        .collect()
}

/// Two years of a household ledger with a yearly pattern in utilities and a
/// one-off large purchase
fn ledger_csv() -> String {
    let mut csv = String::from("Date,Description,Category,Amount\n");
    for i in 0..24u32 {
        let year = 2023 + (i / 12) as i32;
        let month = i % 12 + 1;
        let heating = if month <= 3 || month >= 11 { 180.0 } else { 60.0 };
        let groceries = 300.0 + ((i * 13) % 7) as f64 * 15.0;

        writeln!(csv, "{}-{:02}-01,Employer,Salary,4000.00", year, month).unwrap();
        writeln!(csv, "{}-{:02}-03,Landlord,Rent,-1500.00", year, month).unwrap();
        writeln!(csv, "{}-{:02}-10,Market,groceries,-{:.2}", year, month, groceries).unwrap();
        writeln!(csv, "{}-{:02}-15,City Power,Utilities,-{:.2}", year, month, heating).unwrap();
        writeln!(csv, "{}-{:02}-21,Cinema,Entertainment,-45.00", year, month).unwrap();
    }
    csv.push_str("2024-06-18,Laptop store,Electronics,\"-9,500.00\"\n");
    csv
}

// =============================================================================
// Full workflow
// =============================================================================

#[test]
fn test_csv_to_report_workflow() {
    let transactions = parse_csv(ledger_csv().as_bytes()).unwrap();
    assert_eq!(transactions.len(), 121);

    let dataset = Dataset::new(transactions);
    let report = Pipeline::new(AnalyticsConfig::default()).run(&dataset).unwrap();

    assert_eq!(report.monthly.len(), 24);
    assert_eq!(report.monthly[0].month, ym(2023, 1));
    assert_eq!(report.monthly[23].month, ym(2024, 12));

    let kpis = report.kpis.ready().unwrap();
    assert_eq!(kpis.income, 96000.0);
    assert_eq!(kpis.savings, kpis.income - kpis.expenses);

    let flagged = report.flagged_anomalies();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].category, "Electronics");
    assert_eq!(flagged[0].amount, -9500.0);

    let forecast = report.forecast.ready().unwrap();
    assert_eq!(forecast.points.len(), 6);
    assert_eq!(forecast.points[0].month, ym(2025, 1));

    let clusters = report.clusters.ready().unwrap();
    assert_eq!(clusters.labels.len(), 24);
    let june = clusters
        .labels
        .iter()
        .find(|l| l.month == ym(2024, 6))
        .unwrap();
    assert_eq!(june.level, SpendingLevel::High);
    assert_eq!(june.cluster_id, clusters.centroids.len() - 1);
}

#[test]
fn test_report_serializes_stage_status() {
    let dataset = Dataset::new(parse_csv(ledger_csv().as_bytes()).unwrap());
    let report = Pipeline::default().run(&dataset).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["kpis"]["status"], "ready");
    assert_eq!(json["forecast"]["status"], "ready");
    assert_eq!(json["monthly"][0]["month"], "2023-01");
}

#[test]
fn test_category_breakdown_from_csv() {
    let transactions = parse_csv(ledger_csv().as_bytes()).unwrap();
    let monthly = aggregate(&transactions).unwrap();

    let june = category_breakdown(&monthly, &Period::month(ym(2024, 6))).unwrap();
    assert_eq!(june[0].category, "Electronics");
    assert!(june.iter().any(|c| c.category == "Groceries"));
    assert!(june.iter().all(|c| c.category != "Salary"));
}

#[test]
fn test_budget_comparison_from_csv() {
    let transactions = parse_csv(ledger_csv().as_bytes()).unwrap();
    let monthly = aggregate(&transactions).unwrap();
    let january = &monthly[0];

    let mut expected = BTreeMap::new();
    expected.insert("Rent".to_string(), 1500.0);
    expected.insert("Utilities".to_string(), 100.0);

    let comparison = compare_budget(january, &expected);
    let utilities = comparison
        .lines
        .iter()
        .find(|l| l.category == "Utilities")
        .unwrap();
    assert_eq!(utilities.variance(), 80.0);

    let top = comparison.top_categories(3);
    assert_eq!(top[0].category, "Rent");
    assert_eq!(top.len(), 3);
}

// =============================================================================
// Aggregation and KPI properties
// =============================================================================

#[test]
fn test_aggregation_is_permutation_invariant() {
    let transactions = parse_csv(ledger_csv().as_bytes()).unwrap();
    let expected = aggregate(&transactions).unwrap();

    let mut shuffled = transactions.clone();
    shuffled.reverse();
    shuffled.rotate_left(37);
    assert_eq!(aggregate(&shuffled).unwrap(), expected);
    assert_eq!(aggregate(&transactions).unwrap(), expected);
}

#[test]
fn test_kpi_identity_for_every_month() {
    let transactions = parse_csv(ledger_csv().as_bytes()).unwrap();
    let monthly = aggregate(&transactions).unwrap();

    for totals in &monthly {
        let kpis = compute_kpis(&monthly, &Period::month(totals.month)).unwrap();
        assert_eq!(kpis.savings, kpis.income - kpis.expenses);
        assert!(kpis.savings_rate.is_defined());
    }
}

#[test]
fn test_zero_income_savings_rate() {
    let monthly = aggregate(&transactions_with_amounts(&[-20.0, -30.0])).unwrap();
    let kpis = compute_kpis(&monthly, &Period::All).unwrap();
    assert_eq!(kpis.savings_rate, SavingsRate::Undefined);
    assert!(matches!(kpis.savings_rate.percent(), Err(Error::UndefinedRate)));
}

// =============================================================================
// Anomaly detection
// =============================================================================

#[test]
fn test_zscore_flags_single_outlier() {
    let transactions = transactions_with_amounts(&[100.0, 102.0, 98.0, 101.0, 99.0, 500.0]);
    let records = detect(&transactions, &AnomalyScope::All, &DetectorConfig::default()).unwrap();

    let flagged: Vec<f64> = records
        .iter()
        .filter(|r| r.flagged)
        .map(|r| r.transaction.amount)
        .collect();
    assert_eq!(flagged, vec![500.0]);
}

#[test]
fn test_identical_amounts_score_zero() {
    let transactions = transactions_with_amounts(&[50.0, 50.0, 50.0]);
    let records = detect(&transactions, &AnomalyScope::All, &DetectorConfig::default()).unwrap();

    assert_eq!(records.len(), 3);
    for record in records {
        assert_eq!(record.score, 0.0);
        assert!(!record.flagged);
    }
}

// =============================================================================
// Forecasting
// =============================================================================

#[test]
fn test_forecast_needs_six_months() {
    let five = series(ym(2025, 1), &[900.0, 950.0, 1010.0, 980.0, 940.0]);
    assert!(matches!(
        forecast(&five, 6, &ForecastConfig::default()),
        Err(Error::InsufficientData { .. })
    ));

    let six = series(ym(2025, 1), &[900.0, 950.0, 1010.0, 980.0, 940.0, 1005.0]);
    let result = forecast(&six, 6, &ForecastConfig::default()).unwrap();
    let months: Vec<YearMonth> = result.points.iter().map(|p| p.month).collect();
    assert_eq!(
        months,
        vec![ym(2025, 7), ym(2025, 8), ym(2025, 9), ym(2025, 10), ym(2025, 11), ym(2025, 12)]
    );
}

#[test]
fn test_forecast_bounds_on_seasonal_series() {
    let values: Vec<f64> = (0..48)
        .map(|t| {
            let season = [1.3, 1.2, 1.1, 0.9, 0.8, 0.8, 0.9, 0.9, 1.0, 1.0, 1.1, 1.4][t % 12];
            let wobble = ((t * 29) % 9) as f64 - 4.0;
            2000.0 * season + 4.0 * t as f64 + 12.0 * wobble
        })
        .collect();
    let result = forecast(&series(ym(2021, 1), &values), 12, &ForecastConfig::default()).unwrap();

    assert!(result.order.is_seasonal());
    let mut previous_width = 0.0;
    for point in &result.points {
        assert!(point.lower_ci <= point.predicted_expense);
        assert!(point.predicted_expense <= point.upper_ci);
        assert!(point.interval_width() >= previous_width - 1e-9);
        previous_width = point.interval_width();
    }
}

#[test]
fn test_forecast_from_aggregated_expenses() {
    let transactions = parse_csv(ledger_csv().as_bytes()).unwrap();
    let monthly = aggregate(&transactions).unwrap();

    let result = forecast(&expense_series(&monthly), 3, &ForecastConfig::default()).unwrap();
    assert_eq!(result.points.len(), 3);
    assert!(result.points.iter().all(|p| p.predicted_expense.is_finite()));
}

// =============================================================================
// Clustering
// =============================================================================

#[test]
fn test_clustering_is_deterministic_for_seed() {
    let transactions = parse_csv(ledger_csv().as_bytes()).unwrap();
    let expenses = expense_series(&aggregate(&transactions).unwrap());

    for init in [KMeansInit::Quantile, KMeansInit::PlusPlus] {
        let config = ClusterConfig {
            init,
            seed: 7,
            ..Default::default()
        };
        let first = cluster(&expenses, &config).unwrap();
        let second = cluster(&expenses, &config).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_value_at_first_quartile_is_low() {
    let months = series(ym(2025, 1), &[500.0, 400.0, 300.0, 200.0, 100.0]);
    let result = cluster(&months, &ClusterConfig::default()).unwrap();

    assert_eq!(result.q1, 200.0);
    let at_q1 = result
        .labels
        .iter()
        .find(|l| l.total_spending == 200.0)
        .unwrap();
    assert_eq!(at_q1.level, SpendingLevel::Low);
}

#[test]
fn test_stage_failures_do_not_abort_report() {
    let dataset = Dataset::new(transactions_with_amounts(&[-10.0, -12.0, 500.0]));
    let report = Pipeline::default().run(&dataset).unwrap();

    assert_eq!(report.monthly.len(), 1);
    assert!(report.kpis.is_ready());
    assert!(matches!(report.forecast, StageOutcome::Unavailable { .. }));
    assert!(matches!(report.clusters, StageOutcome::Unavailable { .. }));
}
