//! Spending Clusterer
//!
//! Groups months by total spending with 1-D k-means and labels each month
//! Low / Medium / High against quantiles of the raw monthly totals. Cluster
//! ids are renumbered after fitting so id 0 is always the cheapest cluster.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ClusterLabel, MonthlyValue, SpendingLevel, YearMonth};
use crate::stats::{quantile, quantile_sorted};

/// How initial centroids are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KMeansInit {
    /// Centroid j at quantile (j + 0.5) / k of the distinct sorted values
    #[default]
    Quantile,
    /// Seeded k-means++ sampling
    PlusPlus,
}

impl KMeansInit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantile => "quantile",
            Self::PlusPlus => "plus_plus",
        }
    }
}

impl FromStr for KMeansInit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quantile" => Ok(Self::Quantile),
            "plus_plus" | "plusplus" | "kmeans++" | "k-means++" => Ok(Self::PlusPlus),
            _ => Err(format!(
                "Unknown k-means init: {} (valid: quantile, plus_plus)",
                s
            )),
        }
    }
}

impl fmt::Display for KMeansInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Clusterer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub k: usize,
    /// Only used by [`KMeansInit::PlusPlus`]
    pub seed: u64,
    pub init: KMeansInit,
    pub max_iterations: usize,
    /// Quantile of monthly spending at or below which a month is Low
    pub low_quantile: f64,
    /// Quantile at or below which a month is Medium
    pub medium_quantile: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 3,
            seed: 42,
            init: KMeansInit::Quantile,
            max_iterations: 300,
            low_quantile: 0.25,
            medium_quantile: 0.50,
        }
    }
}

/// Result of clustering a monthly spending series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clustering {
    /// One label per input month, in input order
    pub labels: Vec<ClusterLabel>,
    /// Ascending; index = cluster id
    pub centroids: Vec<f64>,
    pub q1: f64,
    pub q2: f64,
    pub iterations: usize,
}

/// Aggregate view of one cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub centroid: f64,
    pub mean_spending: f64,
    /// Member months, chronological
    pub months: Vec<YearMonth>,
    pub level: SpendingLevel,
}

/// Quantiles of the cluster means that split summary levels
const SUMMARY_LOW_QUANTILE: f64 = 0.33;
const SUMMARY_MEDIUM_QUANTILE: f64 = 0.66;

impl Clustering {
    /// Per-cluster mean spending, members and level; empty clusters are omitted
    ///
    /// Levels here rank clusters against each other: a cluster whose mean is
    /// below the 0.33 quantile of all cluster means is Low, below the 0.66
    /// quantile Medium, otherwise High. Per-month labels use
    /// [`describe_level`] against the raw monthly totals instead.
    pub fn summaries(&self) -> Vec<ClusterSummary> {
        let groups: Vec<(usize, Vec<&ClusterLabel>)> = (0..self.centroids.len())
            .filter_map(|id| {
                let members: Vec<&ClusterLabel> =
                    self.labels.iter().filter(|l| l.cluster_id == id).collect();
                (!members.is_empty()).then_some((id, members))
            })
            .collect();

        let means: Vec<f64> = groups
            .iter()
            .map(|(_, members)| members.iter().map(|l| l.total_spending).mean())
            .collect();
        let low = quantile(&means, SUMMARY_LOW_QUANTILE);
        let medium = quantile(&means, SUMMARY_MEDIUM_QUANTILE);

        groups
            .into_iter()
            .zip(means)
            .map(|((id, members), mean_spending)| {
                let mut months: Vec<YearMonth> = members.iter().map(|l| l.month).collect();
                months.sort();

                let level = if mean_spending < low {
                    SpendingLevel::Low
                } else if mean_spending < medium {
                    SpendingLevel::Medium
                } else {
                    SpendingLevel::High
                };

                ClusterSummary {
                    cluster_id: id,
                    centroid: self.centroids[id],
                    mean_spending,
                    months,
                    level,
                }
            })
            .collect()
    }
}

/// `≤ q1` is Low, `≤ q2` is Medium, anything above is High
pub fn describe_level(value: f64, q1: f64, q2: f64) -> SpendingLevel {
    if value <= q1 {
        SpendingLevel::Low
    } else if value <= q2 {
        SpendingLevel::Medium
    } else {
        SpendingLevel::High
    }
}

/// Index of the closest centroid; ties go to the lowest index
fn nearest_centroid(centroids: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let distance = (value - c).abs();
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

fn quantile_init(values: &[f64], k: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    // tied totals would otherwise seed several identical centroids
    sorted.dedup();
    (0..k)
        .map(|j| quantile_sorted(&sorted, (j as f64 + 0.5) / k as f64))
        .collect()
}

fn plus_plus_init(values: &[f64], k: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = vec![values[rng.gen_range(0..values.len())]];

    while centroids.len() < k {
        let weights: Vec<f64> = values
            .iter()
            .map(|v| {
                centroids
                    .iter()
                    .map(|c| (v - c).powi(2))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = values.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                cumulative += w;
                if cumulative > target {
                    chosen = i;
                    break;
                }
            }
            values[chosen]
        } else {
            values[centroids.len() % values.len()]
        };
        centroids.push(next);
    }
    centroids
}

/// Move each centroid to the mean of its members
///
/// A cluster left without members takes the value farthest from the
/// centroid that value was assigned to, each value at most once.
fn update_centroids(values: &[f64], assignments: &[usize], centroids: &[f64]) -> Vec<f64> {
    let mut updated = centroids.to_vec();
    let mut empty = Vec::new();
    for (id, centroid) in updated.iter_mut().enumerate() {
        let members: Vec<f64> = assignments
            .iter()
            .zip(values)
            .filter(|(a, _)| **a == id)
            .map(|(_, v)| *v)
            .collect();
        if members.is_empty() {
            empty.push(id);
        } else {
            *centroid = members.iter().mean();
        }
    }

    let mut taken: BTreeSet<usize> = BTreeSet::new();
    for id in empty {
        let farthest = values
            .iter()
            .zip(assignments)
            .enumerate()
            .filter(|(i, _)| !taken.contains(i))
            .map(|(i, (v, &a))| (i, (v - centroids[a]).abs()))
            .fold(None, |best: Option<(usize, f64)>, (i, distance)| match best {
                Some((_, d)) if d >= distance => best,
                _ => Some((i, distance)),
            });
        if let Some((i, distance)) = farthest {
            if distance > 0.0 {
                updated[id] = values[i];
                taken.insert(i);
            }
        }
    }
    updated
}

/// Cluster monthly spending totals into `config.k` groups
pub fn cluster(series: &[MonthlyValue], config: &ClusterConfig) -> Result<Clustering> {
    if config.k == 0 {
        return Err(Error::InvalidInput("Cluster count must be at least 1".into()));
    }
    if config.max_iterations == 0 {
        return Err(Error::InvalidInput("max_iterations must be at least 1".into()));
    }

    let distinct: BTreeSet<YearMonth> = series.iter().map(|p| p.month).collect();
    if distinct.len() != series.len() {
        return Err(Error::InvalidInput(
            "Each month may appear only once in a clustering series".into(),
        ));
    }
    if distinct.len() < config.k {
        return Err(Error::InsufficientData {
            what: "distinct months",
            needed: config.k,
            found: distinct.len(),
        });
    }
    if let Some(point) = series.iter().find(|p| !p.value.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "Non-finite spending {} for {}",
            point.value, point.month
        )));
    }

    let values: Vec<f64> = series.iter().map(|p| p.value).collect();
    let k = config.k;
    let mut centroids = match config.init {
        KMeansInit::Quantile => quantile_init(&values, k),
        KMeansInit::PlusPlus => plus_plus_init(&values, k, config.seed),
    };

    let mut assignments = vec![usize::MAX; values.len()];
    let mut iterations = 0;
    while iterations < config.max_iterations {
        iterations += 1;

        let mut changed = false;
        for (slot, value) in assignments.iter_mut().zip(&values) {
            let nearest = nearest_centroid(&centroids, *value);
            if *slot != nearest {
                *slot = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        centroids = update_centroids(&values, &assignments, &centroids);
    }

    // renumber so id 0 is the lowest-spending cluster
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|a, b| centroids[*a].total_cmp(&centroids[*b]).then(a.cmp(b)));
    let mut rank = vec![0; k];
    for (new_id, old_id) in order.iter().enumerate() {
        rank[*old_id] = new_id;
    }
    let sorted_centroids: Vec<f64> = order.iter().map(|&i| centroids[i]).collect();

    let q1 = quantile(&values, config.low_quantile);
    let q2 = quantile(&values, config.medium_quantile);

    let labels: Vec<ClusterLabel> = series
        .iter()
        .zip(&assignments)
        .map(|(point, &assigned)| ClusterLabel {
            month: point.month,
            cluster_id: rank[assigned],
            level: describe_level(point.value, q1, q2),
            total_spending: point.value,
        })
        .collect();

    debug!(
        months = series.len(),
        k,
        init = %config.init,
        iterations,
        "Clustered monthly spending"
    );

    Ok(Clustering {
        labels,
        centroids: sorted_centroids,
        q1,
        q2,
        iterations,
    })
}
