//! Z-score scoring
//!
//! The default baseline leaves the scored transaction out of its own mean and
//! standard deviation. Including it caps any population z-score at `√(n-1)`,
//! so on small scopes a single large outlier could never cross a threshold
//! like 3.0.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::{AnomalyScorer, Scored};
use crate::error::Result;
use crate::models::{AnomalyMethod, Transaction};

/// Relative size below which a leave-one-out σ counts as zero
const DEGENERATE_STD_RATIO: f64 = 1e-6;

/// Which transactions form the mean/σ baseline for a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZScoreBaseline {
    /// Mean and σ of every other in-scope transaction
    #[default]
    LeaveOneOut,
    /// Mean and population σ of the whole scope, scored value included
    Population,
}

impl ZScoreBaseline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeaveOneOut => "leave_one_out",
            Self::Population => "population",
        }
    }
}

impl FromStr for ZScoreBaseline {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "leave_one_out" | "leave-one-out" | "loo" => Ok(Self::LeaveOneOut),
            "population" => Ok(Self::Population),
            _ => Err(format!(
                "Unknown z-score baseline: {} (valid: leave_one_out, population)",
                s
            )),
        }
    }
}

/// Flags transactions whose |z| exceeds a threshold
#[derive(Debug, Clone, Copy)]
pub struct ZScoreScorer {
    threshold: f64,
    baseline: ZScoreBaseline,
}

impl ZScoreScorer {
    pub fn new(threshold: f64, baseline: ZScoreBaseline) -> Self {
        Self {
            threshold,
            baseline,
        }
    }

    /// Raw z-scores for `amounts`; all zero when σ of the scope is zero
    pub fn z_scores(&self, amounts: &[f64]) -> Vec<f64> {
        let n = amounts.len();
        if n < 2 {
            return vec![0.0; n];
        }

        let nf = n as f64;
        let mu = amounts.iter().mean();
        let variance = amounts.iter().population_variance();
        let m2 = variance * nf;
        let sigma_all = variance.sqrt();
        if sigma_all == 0.0 {
            return vec![0.0; n];
        }

        match self.baseline {
            ZScoreBaseline::Population => amounts.iter().map(|x| (x - mu) / sigma_all).collect(),
            ZScoreBaseline::LeaveOneOut => amounts
                .iter()
                .map(|x| {
                    let d = x - mu;
                    // deviation from the mean of the other n-1 values
                    let deviation = d * nf / (nf - 1.0);
                    let m2_others = (m2 - d * d * nf / (nf - 1.0)).max(0.0);
                    let sigma_others = (m2_others / (nf - 1.0)).sqrt();

                    if deviation == 0.0 {
                        0.0
                    } else if sigma_others <= sigma_all * DEGENERATE_STD_RATIO {
                        deviation / sigma_all
                    } else {
                        deviation / sigma_others
                    }
                })
                .collect(),
        }
    }
}

impl AnomalyScorer for ZScoreScorer {
    fn method(&self) -> AnomalyMethod {
        AnomalyMethod::ZScore
    }

    fn name(&self) -> &'static str {
        "Z-Score"
    }

    fn score(&self, transactions: &[&Transaction]) -> Result<Vec<Scored>> {
        let amounts: Vec<f64> = transactions.iter().map(|t| t.amount).collect();
        Ok(self
            .z_scores(&amounts)
            .into_iter()
            .map(|score| Scored {
                score,
                flagged: score.abs() > self.threshold,
            })
            .collect())
    }
}
