//! Shared command utilities
//!
//! This module contains:
//! - `load_dataset` - Read the transaction CSV
//! - `load_config` - Resolve analytics settings
//! - `resolve_period` - Turn `--month` / `--from --to` into a [`Period`]
//! - `parse_expectations` - Parse `Category=amount` budget arguments

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tally_core::{AnalyticsConfig, Dataset, Period, YearMonth};
use tracing::debug;

/// Load the transaction CSV into a dataset
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        bail!(
            "Transaction file not found: {} (use --file to choose another)",
            path.display()
        );
    }

    let dataset = Dataset::from_csv(path)
        .with_context(|| format!("Failed to load transactions from {}", path.display()))?;
    debug!(
        path = %path.display(),
        transactions = dataset.len(),
        "Loaded dataset"
    );
    Ok(dataset)
}

/// Load analytics config from `--config`, the user override, or the defaults
pub fn load_config(path: Option<&Path>) -> Result<AnalyticsConfig> {
    AnalyticsConfig::load(path).context("Failed to load analytics config")
}

/// Parse a `YYYY-MM` month argument
pub fn parse_month(s: &str) -> Result<YearMonth> {
    s.parse::<YearMonth>()
        .with_context(|| format!("Invalid month '{}' (use YYYY-MM)", s))
}

/// Resolve period flags; no flags means every month
pub fn resolve_period(month: Option<&str>, from: Option<&str>, to: Option<&str>) -> Result<Period> {
    let period = match (month, from, to) {
        (Some(month), None, None) => Period::month(parse_month(month)?),
        (None, Some(from), Some(to)) => Period::range(parse_month(from)?, parse_month(to)?),
        (None, None, None) => Period::All,
        _ => bail!("Use either --month or both --from and --to"),
    };
    period.validate()?;
    Ok(period)
}

/// Parse `Category=amount` pairs into expected spending per category
pub fn parse_expectations(args: &[String]) -> Result<BTreeMap<String, f64>> {
    let mut expected = BTreeMap::new();
    for arg in args {
        let (category, amount) = arg
            .split_once('=')
            .with_context(|| format!("Invalid budget '{}' (use Category=amount)", arg))?;
        let category = category.trim();
        if category.is_empty() {
            bail!("Invalid budget '{}': category is empty", arg);
        }
        let amount: f64 = amount
            .trim()
            .parse()
            .with_context(|| format!("Invalid budget amount in '{}'", arg))?;
        if !amount.is_finite() || amount < 0.0 {
            bail!("Budget for {} must be a non-negative number", category);
        }
        expected.insert(category.to_string(), amount);
    }
    Ok(expected)
}
