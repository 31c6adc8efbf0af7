//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Monthly analytics for a transaction ledger
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Monthly KPIs, anomalies, forecasts and spending clusters from a CSV ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Transaction CSV (Date,Description,Category,Amount)
    #[arg(short, long, default_value = "transactions.csv", global = true)]
    pub file: PathBuf,

    /// Analytics config file
    ///
    /// Defaults to ~/.config/tally/analytics.toml when it exists, otherwise
    /// the built-in settings.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show monthly income, expenses and net
    Months,

    /// Show income, expenses, savings and savings rate
    Kpis {
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Show spending by category
    Categories {
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Score transactions and list outliers
    Anomalies {
        /// Only score transactions in this category
        #[arg(long)]
        category: Option<String>,

        /// Z-score threshold (overrides config)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Scoring method: zscore, isolation_forest, auto (overrides config)
        #[arg(short, long)]
        method: Option<String>,

        /// List every scored transaction, not just flagged ones
        #[arg(long)]
        all: bool,
    },

    /// Forecast monthly expenses
    Forecast {
        /// Months to forecast (overrides config)
        #[arg(long)]
        horizon: Option<usize>,

        /// Confidence level for the interval, e.g. 0.95 (overrides config)
        #[arg(long)]
        confidence: Option<f64>,
    },

    /// Group months into spending clusters
    Clusters {
        /// Number of clusters (overrides config)
        #[arg(short, long)]
        k: Option<usize>,

        /// Random seed for k-means++ (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Compare a month's spending against a budget
    Budget {
        /// Month to compare (YYYY-MM)
        #[arg(short, long)]
        month: String,

        /// Expected spending per category, e.g. --expect Groceries=400
        ///
        /// Categories without an expectation use the configured default budget.
        #[arg(short, long = "expect", value_name = "CATEGORY=AMOUNT")]
        expectations: Vec<String>,
    },

    /// Run every analysis and print a combined report
    Report,
}

/// Period selection shared by KPI and category commands
#[derive(clap::Args, Debug, Default)]
pub struct PeriodArgs {
    /// Single month (YYYY-MM)
    #[arg(short, long, conflicts_with_all = ["from", "to"])]
    pub month: Option<String>,

    /// First month of a range (YYYY-MM)
    #[arg(long, requires = "to")]
    pub from: Option<String>,

    /// Last month of a range (YYYY-MM)
    #[arg(long, requires = "from")]
    pub to: Option<String>,
}
