//! Isolation forest scoring
//!
//! Random axis-aligned splits isolate outliers in fewer steps than typical
//! points. The normalized anomaly score `s = 2^(-E[h] / c(ψ))` is near 1 for
//! points isolated early and around 0.5 or below for ordinary ones. Trees are
//! built from a seeded RNG so repeated runs score identically.

use std::str::FromStr;

use chrono::Datelike;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{AnomalyScorer, Scored};
use crate::error::{Error, Result};
use crate::models::{AnomalyMethod, Transaction};
use crate::stats::{median, quantile};

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// A per-transaction feature the forest splits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationFeature {
    /// Signed amount
    Amount,
    /// Amount magnitude
    AbsAmount,
    /// Day of month the transaction was posted
    DayOfMonth,
}

impl IsolationFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::AbsAmount => "abs_amount",
            Self::DayOfMonth => "day_of_month",
        }
    }

    fn extract(&self, tx: &Transaction) -> f64 {
        match self {
            Self::Amount => tx.amount,
            Self::AbsAmount => tx.amount.abs(),
            Self::DayOfMonth => tx.date.day() as f64,
        }
    }
}

impl FromStr for IsolationFeature {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amount" => Ok(Self::Amount),
            "abs_amount" | "abs-amount" => Ok(Self::AbsAmount),
            "day_of_month" | "day-of-month" | "day" => Ok(Self::DayOfMonth),
            _ => Err(format!(
                "Unknown isolation feature: {} (valid: amount, abs_amount, day_of_month)",
                s
            )),
        }
    }
}

/// Isolation forest parameters
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationConfig {
    pub n_trees: usize,
    /// Points drawn (without replacement) to grow each tree
    pub sample_size: usize,
    pub seed: u64,
    /// Expected share of outliers; sets the flagging boundary
    pub contamination: f64,
    pub features: Vec<IsolationFeature>,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            sample_size: 256,
            seed: 42,
            contamination: 0.05,
            features: vec![IsolationFeature::Amount],
        }
    }
}

impl IsolationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 || self.sample_size < 2 {
            return Err(Error::InvalidInput(format!(
                "Isolation forest needs at least one tree and a sample of 2 (got {} trees, sample {})",
                self.n_trees, self.sample_size
            )));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(Error::InvalidInput(format!(
                "Contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.features.is_empty() {
            return Err(Error::InvalidInput(
                "Isolation forest needs at least one feature".into(),
            ));
        }
        Ok(())
    }
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Average path length of an unsuccessful BST search among `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            let harmonic = (n - 1.0).ln() + EULER_GAMMA;
            2.0 * harmonic - 2.0 * (n - 1.0) / n
        }
    }
}

fn grow(
    rows: &[Vec<f64>],
    members: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || members.len() <= 1 {
        return Node::Leaf {
            size: members.len(),
        };
    }

    let n_features = rows[members[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|f| {
            let (lo, hi) = members.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(rows[i][f]), hi.max(rows[i][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();

    if splittable.is_empty() {
        return Node::Leaf {
            size: members.len(),
        };
    }

    let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(lo..hi);

    // lo always goes left and hi always goes right, so neither side is empty
    let (left, right): (Vec<usize>, Vec<usize>) =
        members.into_iter().partition(|&i| rows[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(rows, left, depth + 1, height_limit, rng)),
        right: Box::new(grow(rows, right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, row: &[f64]) -> f64 {
    let mut node = node;
    let mut depth = 0.0;
    loop {
        match node {
            Node::Leaf { size } => return depth + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                node = if row[*feature] <= *threshold {
                    left.as_ref()
                } else {
                    right.as_ref()
                };
                depth += 1.0;
            }
        }
    }
}

/// Seeded isolation forest over configurable transaction features
#[derive(Debug, Clone)]
pub struct IsolationForestScorer {
    config: IsolationConfig,
}

impl IsolationForestScorer {
    pub fn new(config: IsolationConfig) -> Self {
        Self { config }
    }

    /// Normalized anomaly scores `s` in (0, 1], one per transaction
    pub fn anomaly_scores(&self, transactions: &[&Transaction]) -> Result<Vec<f64>> {
        self.config.validate()?;

        let n = transactions.len();
        if n < 2 {
            return Ok(vec![0.0; n]);
        }

        let rows: Vec<Vec<f64>> = transactions
            .iter()
            .map(|t| self.config.features.iter().map(|f| f.extract(t)).collect())
            .collect();

        let psi = self.config.sample_size.min(n);
        let height_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let trees: Vec<Node> = (0..self.config.n_trees)
            .map(|_| {
                let members = index::sample(&mut rng, n, psi).into_vec();
                grow(&rows, members, 0, height_limit, &mut rng)
            })
            .collect();

        let normalizer = average_path_length(psi);
        let n_trees = trees.len() as f64;

        Ok(rows
            .iter()
            .map(|row| {
                let mean_path =
                    trees.iter().map(|tree| path_length(tree, row)).sum::<f64>() / n_trees;
                2.0_f64.powf(-mean_path / normalizer)
            })
            .collect())
    }
}

impl AnomalyScorer for IsolationForestScorer {
    fn method(&self) -> AnomalyMethod {
        AnomalyMethod::IsolationForest
    }

    fn name(&self) -> &'static str {
        "Isolation Forest"
    }

    /// Scores are signed by the amount's side of the scope median
    fn score(&self, transactions: &[&Transaction]) -> Result<Vec<Scored>> {
        let scores = self.anomaly_scores(transactions)?;
        let boundary = quantile(&scores, 1.0 - self.config.contamination);

        let amounts: Vec<f64> = transactions.iter().map(|t| t.amount).collect();
        let center = median(&amounts);

        Ok(scores
            .iter()
            .zip(&amounts)
            .map(|(&s, &amount)| Scored {
                score: if amount < center { -s } else { s },
                flagged: s > boundary,
            })
            .collect())
    }
}
