//! Tally Core Library
//!
//! Monthly analytics for a personal transaction ledger:
//! - Aggregation of raw transactions into ordered monthly series
//! - KPIs (income, expenses, savings, savings rate) over a period
//! - Per-transaction anomaly scoring (z-score, isolation forest)
//! - Seasonal ARIMA expense forecasting with confidence bounds
//! - K-means clustering of months into Low / Medium / High spending
//! - Category and budget reports, CSV import and layered configuration
//!
//! Every analytics function is a pure function of its inputs. [`Pipeline`]
//! runs them all over one [`Dataset`].

pub mod aggregate;
pub mod anomaly;
pub mod cluster;
pub mod config;
pub mod error;
pub mod forecast;
pub mod import;
pub mod kpi;
pub mod models;
pub mod pipeline;
pub mod reports;
pub mod stats;

/// Transaction and series builders for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{aggregate, expense_series, income_series, normalize_category};
pub use anomaly::{
    detect, AnomalyScope, AnomalyScorer, DetectorConfig, IsolationConfig, IsolationFeature,
    IsolationForestScorer, ZScoreBaseline, ZScoreScorer,
};
pub use cluster::{cluster, describe_level, ClusterConfig, ClusterSummary, Clustering, KMeansInit};
pub use config::{AnalyticsConfig, ReportConfig};
pub use error::{Error, Result};
pub use forecast::{forecast, Estimator, Forecast, ForecastConfig, SarimaOrder, ShortSeriesModel};
pub use import::{load_csv, parse_csv};
pub use kpi::compute_kpis;
pub use models::{
    AnomalyMethod, AnomalyRecord, ClusterLabel, ForecastPoint, KpiSet, MonthlyAggregate,
    MonthlyValue, Period, SavingsRate, SpendingLevel, Transaction, YearMonth,
};
pub use pipeline::{AnalyticsReport, AnomalySummary, Dataset, Pipeline, StageOutcome};
pub use reports::{
    category_breakdown, compare_budget, format_months, BudgetComparison, BudgetLine,
    CategorySpending,
};
