//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use tally_core::test_utils::{household_transactions, ym};
use tally_core::{AnalyticsConfig, Dataset, Period, Transaction};
use tempfile::{tempdir, TempDir};

use crate::commands::{self, truncate};

/// Write transactions to `ledger.csv` inside `dir`
fn write_csv(dir: &Path, transactions: &[Transaction]) -> PathBuf {
    let mut content = String::from("Date,Description,Category,Amount\n");
    for tx in transactions {
        content.push_str(&format!(
            "{},{},{},{:.2}\n",
            tx.date, tx.description, tx.category, tx.amount
        ));
    }
    let path = dir.join("ledger.csv");
    fs::write(&path, content).unwrap();
    path
}

fn setup_dataset(months: usize) -> (TempDir, Dataset) {
    let dir = tempdir().unwrap();
    let path = write_csv(dir.path(), &household_transactions(months));
    let dataset = commands::load_dataset(&path).unwrap();
    (dir, dataset)
}

// ========== Loading Tests ==========

#[test]
fn test_load_dataset() {
    let (_dir, dataset) = setup_dataset(3);
    assert_eq!(dataset.len(), 15);
}

#[test]
fn test_load_dataset_missing_file() {
    let dir = tempdir().unwrap();
    let result = commands::load_dataset(&dir.path().join("missing.csv"));
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[test]
fn test_load_dataset_bad_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, "Date,Category,Amount\n2025-01-01,Rent,lots\n").unwrap();

    let result = commands::load_dataset(&path);
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("Row 2"));
}

#[test]
fn test_load_config_explicit_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("analytics.toml");
    fs::write(&path, "[clustering]\nk = 2\n").unwrap();

    let config = commands::load_config(Some(&path)).unwrap();
    assert_eq!(config.cluster.k, 2);
    assert_eq!(config.forecast, AnalyticsConfig::default().forecast);
}

#[test]
fn test_load_config_missing_path() {
    let dir = tempdir().unwrap();
    let result = commands::load_config(Some(&dir.path().join("nope.toml")));
    assert!(result.is_err());
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_resolve_period() {
    assert_eq!(commands::resolve_period(None, None, None).unwrap(), Period::All);
    assert_eq!(
        commands::resolve_period(Some("2024-03"), None, None).unwrap(),
        Period::month(ym(2024, 3))
    );
    assert_eq!(
        commands::resolve_period(None, Some("2024-01"), Some("2024-06")).unwrap(),
        Period::range(ym(2024, 1), ym(2024, 6))
    );
}

#[test]
fn test_resolve_period_invalid() {
    assert!(commands::resolve_period(None, Some("2024-06"), Some("2024-01")).is_err());
    assert!(commands::resolve_period(None, Some("2024-06"), None).is_err());
    assert!(commands::resolve_period(Some("March"), None, None).is_err());
}

#[test]
fn test_parse_month() {
    assert_eq!(commands::parse_month("2025-11").unwrap(), ym(2025, 11));
    assert!(commands::parse_month("2025-13").is_err());
}

#[test]
fn test_parse_expectations() {
    let args = vec!["Groceries=400".to_string(), " Rent = 1200.50 ".to_string()];
    let expected = commands::parse_expectations(&args).unwrap();
    assert_eq!(expected.get("Groceries"), Some(&400.0));
    assert_eq!(expected.get("Rent"), Some(&1200.5));
}

#[test]
fn test_parse_expectations_invalid() {
    assert!(commands::parse_expectations(&["Groceries".to_string()]).is_err());
    assert!(commands::parse_expectations(&["=100".to_string()]).is_err());
    assert!(commands::parse_expectations(&["Rent=abc".to_string()]).is_err());
    assert!(commands::parse_expectations(&["Rent=-5".to_string()]).is_err());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("Groceries", 25), "Groceries");
    assert_eq!(truncate("Entertainment", 8), "Enter...");
    assert_eq!(truncate("Café Crème", 7), "Café...");
}

// ========== Report Command Tests ==========

#[test]
fn test_cmd_months() {
    let (_dir, dataset) = setup_dataset(3);
    assert!(commands::cmd_months(&dataset, false).is_ok());
    assert!(commands::cmd_months(&dataset, true).is_ok());
}

#[test]
fn test_cmd_months_empty() {
    assert!(commands::cmd_months(&Dataset::default(), false).is_ok());
}

#[test]
fn test_cmd_kpis() {
    let (_dir, dataset) = setup_dataset(6);
    assert!(commands::cmd_kpis(&dataset, &Period::All, false).is_ok());
    assert!(commands::cmd_kpis(&dataset, &Period::month(ym(2024, 2)), true).is_ok());
    // a period with no data still reports zeros
    assert!(commands::cmd_kpis(&dataset, &Period::month(ym(2030, 1)), false).is_ok());
}

#[test]
fn test_cmd_categories() {
    let (_dir, dataset) = setup_dataset(3);
    let period = Period::range(ym(2024, 1), ym(2024, 2));
    assert!(commands::cmd_categories(&dataset, &period, false).is_ok());
    assert!(commands::cmd_categories(&dataset, &period, true).is_ok());
}

#[test]
fn test_cmd_budget() {
    let (_dir, dataset) = setup_dataset(3);
    let config = AnalyticsConfig::default();
    let expectations = vec!["groceries=200".to_string(), "Rent=1200".to_string()];

    let result = commands::cmd_budget(&dataset, &config, ym(2024, 2), &expectations, false);
    assert!(result.is_ok());
    let result = commands::cmd_budget(&dataset, &config, ym(2024, 2), &[], true);
    assert!(result.is_ok());
}

#[test]
fn test_cmd_budget_month_without_data() {
    let (_dir, dataset) = setup_dataset(3);
    let result = commands::cmd_budget(&dataset, &AnalyticsConfig::default(), ym(2026, 1), &[], false);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("No transactions"));
}

// ========== Analytics Command Tests ==========

#[test]
fn test_cmd_anomalies() {
    let (_dir, dataset) = setup_dataset(6);
    let config = AnalyticsConfig::default();

    assert!(commands::cmd_anomalies(&dataset, &config, None, None, None, false, false).is_ok());
    assert!(commands::cmd_anomalies(&dataset, &config, None, Some(1.5), Some("auto"), true, false).is_ok());
    assert!(commands::cmd_anomalies(&dataset, &config, Some("Groceries"), None, None, true, true).is_ok());
}

#[test]
fn test_cmd_anomalies_invalid_method() {
    let (_dir, dataset) = setup_dataset(3);
    let result = commands::cmd_anomalies(
        &dataset,
        &AnalyticsConfig::default(),
        None,
        None,
        Some("lof"),
        false,
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_cmd_forecast() {
    let (_dir, dataset) = setup_dataset(12);
    let config = AnalyticsConfig::default();

    assert!(commands::cmd_forecast(&dataset, &config, None, None, false).is_ok());
    assert!(commands::cmd_forecast(&dataset, &config, Some(3), Some(0.8), true).is_ok());
}

#[test]
fn test_cmd_forecast_short_history() {
    let (_dir, dataset) = setup_dataset(4);
    let result = commands::cmd_forecast(&dataset, &AnalyticsConfig::default(), None, None, false);
    assert!(result.is_err());
}

#[test]
fn test_cmd_clusters() {
    let (_dir, dataset) = setup_dataset(12);
    let config = AnalyticsConfig::default();

    assert!(commands::cmd_clusters(&dataset, &config, None, None, false).is_ok());
    assert!(commands::cmd_clusters(&dataset, &config, Some(2), Some(7), true).is_ok());
}

#[test]
fn test_cmd_clusters_too_many_clusters() {
    let (_dir, dataset) = setup_dataset(3);
    let result = commands::cmd_clusters(&dataset, &AnalyticsConfig::default(), Some(5), None, false);
    assert!(result.is_err());
}

#[test]
fn test_cmd_report() {
    let (_dir, dataset) = setup_dataset(12);
    let config = AnalyticsConfig::default();
    assert!(commands::cmd_report(&dataset, &config, false).is_ok());
    assert!(commands::cmd_report(&dataset, &config, true).is_ok());
}

#[test]
fn test_cmd_report_with_unavailable_stages() {
    // too short to forecast, still reports everything else
    let (_dir, dataset) = setup_dataset(2);
    assert!(commands::cmd_report(&dataset, &AnalyticsConfig::default(), false).is_ok());
}
