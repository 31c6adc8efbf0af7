//! Tally CLI - Monthly analytics for a transaction ledger
//!
//! Usage:
//!   tally --file ledger.csv months      Monthly income and expenses
//!   tally --file ledger.csv kpis        Savings and savings rate
//!   tally --file ledger.csv anomalies   Unusual transactions
//!   tally --file ledger.csv forecast    Expense forecast
//!   tally --file ledger.csv report      Everything at once

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;
    let dataset = commands::load_dataset(&cli.file)?;

    match cli.command {
        Commands::Months => commands::cmd_months(&dataset, cli.json),
        Commands::Kpis { period } => {
            let period = commands::resolve_period(
                period.month.as_deref(),
                period.from.as_deref(),
                period.to.as_deref(),
            )?;
            commands::cmd_kpis(&dataset, &period, cli.json)
        }
        Commands::Categories { period } => {
            let period = commands::resolve_period(
                period.month.as_deref(),
                period.from.as_deref(),
                period.to.as_deref(),
            )?;
            commands::cmd_categories(&dataset, &period, cli.json)
        }
        Commands::Anomalies {
            category,
            threshold,
            method,
            all,
        } => commands::cmd_anomalies(
            &dataset,
            &config,
            category.as_deref(),
            threshold,
            method.as_deref(),
            all,
            cli.json,
        ),
        Commands::Forecast {
            horizon,
            confidence,
        } => commands::cmd_forecast(&dataset, &config, horizon, confidence, cli.json),
        Commands::Clusters { k, seed } => {
            commands::cmd_clusters(&dataset, &config, k, seed, cli.json)
        }
        Commands::Budget {
            month,
            expectations,
        } => {
            let month = commands::parse_month(&month)?;
            commands::cmd_budget(&dataset, &config, month, &expectations, cli.json)
        }
        Commands::Report => commands::cmd_report(&dataset, &config, cli.json),
    }
}
