//! End-to-end analytics run over one dataset
//!
//! The pipeline aggregates once, then runs KPIs, anomaly detection,
//! forecasting and clustering in sequence. A stage that can't produce a
//! result (too little data, a fit that doesn't converge) is recorded as
//! [`StageOutcome::Unavailable`] and the remaining stages still run.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, expense_series};
use crate::anomaly::{detect, AnomalyScope};
use crate::cluster::{cluster, Clustering};
use crate::config::AnalyticsConfig;
use crate::error::{Error, Result};
use crate::forecast::{forecast, Forecast};
use crate::import::load_csv;
use crate::kpi::compute_kpis;
use crate::models::{AnomalyMethod, KpiSet, MonthlyAggregate, Period, Transaction};

/// An immutable batch of transactions to analyze
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    transactions: Vec<Transaction>,
}

impl Dataset {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn from_csv(path: &Path) -> Result<Self> {
        Ok(Self::new(load_csv(path)?))
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Result of one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "result")]
pub enum StageOutcome<T> {
    Ready(T),
    Unavailable {
        reason: String,
        /// Error kind, e.g. `insufficient_data`
        kind: &'static str,
    },
}

impl<T> StageOutcome<T> {
    fn from_result(stage: &'static str, result: Result<T>) -> Self {
        match result {
            Ok(value) => {
                debug!(stage, "Analytics stage complete");
                StageOutcome::Ready(value)
            }
            Err(e) => {
                warn!(stage, error = %e, "Analytics stage unavailable");
                StageOutcome::Unavailable {
                    reason: e.to_string(),
                    kind: e.kind(),
                }
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            StageOutcome::Ready(value) => Some(value),
            StageOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, StageOutcome::Ready(_))
    }
}

/// Owned copy of an anomaly record, keyed by the transaction's dataset index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalySummary {
    pub index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub amount: f64,
    pub score: f64,
    pub method: AnomalyMethod,
    pub flagged: bool,
}

/// Everything the pipeline computed for a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub transaction_count: usize,
    pub monthly: Vec<MonthlyAggregate>,
    pub kpis: StageOutcome<KpiSet>,
    pub anomalies: StageOutcome<Vec<AnomalySummary>>,
    pub forecast: StageOutcome<Forecast>,
    pub clusters: StageOutcome<Clustering>,
}

impl AnalyticsReport {
    /// Flagged anomalies only, or none if detection was unavailable
    pub fn flagged_anomalies(&self) -> Vec<&AnomalySummary> {
        self.anomalies
            .ready()
            .map(|records| records.iter().filter(|r| r.flagged).collect())
            .unwrap_or_default()
    }
}

/// Runs every analytics stage with one configuration
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: AnalyticsConfig,
}

impl Pipeline {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Analyze `dataset`; only an aggregation failure is returned as an error
    pub fn run(&self, dataset: &Dataset) -> Result<AnalyticsReport> {
        let transactions = dataset.transactions();
        let monthly = aggregate(transactions)?;
        let expenses = expense_series(&monthly);

        info!(
            transactions = transactions.len(),
            months = monthly.len(),
            "Running analytics pipeline"
        );

        let kpis = StageOutcome::from_result("kpis", compute_kpis(&monthly, &Period::All));

        let anomalies = StageOutcome::from_result(
            "anomalies",
            detect(transactions, &AnomalyScope::All, &self.config.detector).map(|records| {
                // scope is every transaction, so record order is dataset order
                records
                    .into_iter()
                    .enumerate()
                    .map(|(index, record)| AnomalySummary {
                        index,
                        date: record.transaction.date,
                        description: record.transaction.description.clone(),
                        category: record.transaction.category.clone(),
                        amount: record.transaction.amount,
                        score: record.score,
                        method: record.method,
                        flagged: record.flagged,
                    })
                    .collect()
            }),
        );

        let forecast = StageOutcome::from_result(
            "forecast",
            forecast(
                &expenses,
                self.config.report.forecast_horizon,
                &self.config.forecast,
            ),
        );

        let clusters = StageOutcome::from_result("clusters", cluster(&expenses, &self.config.cluster));

        Ok(AnalyticsReport {
            transaction_count: transactions.len(),
            monthly,
            kpis,
            anomalies,
            forecast,
            clusters,
        })
    }
}

/// Convenience wrapper: run the default pipeline over `transactions`
pub fn analyze(transactions: Vec<Transaction>) -> Result<AnalyticsReport> {
    let dataset = Dataset::new(transactions);
    if dataset.is_empty() {
        return Err(Error::InsufficientData {
            what: "transactions",
            needed: 1,
            found: 0,
        });
    }
    Pipeline::default().run(&dataset)
}
