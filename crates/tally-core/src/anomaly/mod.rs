//! Anomaly Detector - per-transaction outlier scoring
//!
//! Every transaction in scope gets an [`AnomalyRecord`], flagged or not, so
//! callers can apply their own display threshold. Scoring strategies are
//! pluggable behind [`AnomalyScorer`]:
//!
//! - **Z-score** ([`ZScoreScorer`]) - deviation from a mean/σ baseline
//! - **Isolation forest** ([`IsolationForestScorer`]) - path-length scoring
//!   for larger scopes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_core::anomaly::{detect, AnomalyScope, DetectorConfig};
//!
//! let records = detect(&transactions, &AnomalyScope::All, &DetectorConfig::default())?;
//! let flagged: Vec<_> = records.iter().filter(|r| r.flagged).collect();
//! ```

pub mod isolation;
pub mod zscore;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{ensure_finite_amounts, normalize_category};
use crate::error::Result;
use crate::models::{AnomalyMethod, AnomalyRecord, Transaction};

pub use isolation::{IsolationConfig, IsolationFeature, IsolationForestScorer};
pub use zscore::{ZScoreBaseline, ZScoreScorer};

/// Which transactions are compared against each other
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyScope {
    /// Every transaction in the dataset
    #[default]
    All,
    /// Only transactions of one category, so rent isn't compared to groceries
    Category(String),
}

impl AnomalyScope {
    fn includes(&self, tx: &Transaction) -> bool {
        match self {
            AnomalyScope::All => true,
            AnomalyScope::Category(category) => {
                normalize_category(&tx.category) == normalize_category(category)
            }
        }
    }
}

/// Anomaly detection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Requested scoring method
    pub method: AnomalyMethod,
    /// |z| above which a z-scored transaction is flagged
    pub threshold: f64,
    /// Baseline used by the z-score method
    pub baseline: ZScoreBaseline,
    /// Scope size the isolation forest requires (strictly more than this)
    pub isolation_min_size: usize,
    pub isolation: IsolationConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            method: AnomalyMethod::ZScore,
            threshold: 3.0,
            baseline: ZScoreBaseline::LeaveOneOut,
            isolation_min_size: 200,
            isolation: IsolationConfig::default(),
        }
    }
}

/// Score and decision for one transaction, in scorer input order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    pub score: f64,
    pub flagged: bool,
}

/// A pluggable anomaly scoring strategy
pub trait AnomalyScorer {
    /// Method reported on the records this scorer produces
    fn method(&self) -> AnomalyMethod;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Score every amount; output has the same length and order as the input
    fn score(&self, transactions: &[&Transaction]) -> Result<Vec<Scored>>;
}

/// Pick the scorer for a scope of `scope_size` transactions
pub fn select_scorer(config: &DetectorConfig, scope_size: usize) -> Box<dyn AnomalyScorer> {
    let large_enough = scope_size > config.isolation_min_size;
    let use_isolation = match config.method {
        AnomalyMethod::ZScore => false,
        AnomalyMethod::IsolationForest | AnomalyMethod::Auto => large_enough,
    };

    if config.method == AnomalyMethod::IsolationForest && !large_enough {
        debug!(
            scope_size,
            min_size = config.isolation_min_size,
            "Scope too small for isolation forest, using z-score"
        );
    }

    if use_isolation {
        Box::new(IsolationForestScorer::new(config.isolation.clone()))
    } else {
        Box::new(ZScoreScorer::new(config.threshold, config.baseline))
    }
}

/// Score every transaction in `scope` and flag outliers
///
/// Records are returned in input order. An empty scope yields no records.
pub fn detect<'a>(
    transactions: &'a [Transaction],
    scope: &AnomalyScope,
    config: &DetectorConfig,
) -> Result<Vec<AnomalyRecord<'a>>> {
    ensure_finite_amounts(transactions)?;

    let in_scope: Vec<&Transaction> = transactions.iter().filter(|t| scope.includes(t)).collect();
    if in_scope.is_empty() {
        return Ok(Vec::new());
    }

    let scorer = select_scorer(config, in_scope.len());
    let scored = scorer.score(&in_scope)?;

    let records: Vec<AnomalyRecord<'a>> = in_scope
        .into_iter()
        .zip(scored)
        .map(|(transaction, s)| AnomalyRecord {
            transaction,
            score: s.score,
            method: scorer.method(),
            flagged: s.flagged,
        })
        .collect();

    debug!(
        scorer = scorer.name(),
        evaluated = records.len(),
        flagged = records.iter().filter(|r| r.flagged).count(),
        "Anomaly detection complete"
    );

    Ok(records)
}
