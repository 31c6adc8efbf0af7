//! Quantile helpers shared by the analytics stages
//!
//! Means, deviations and distributions come from `statrs`; its order
//! statistics interpolate differently, so linear quantiles live here.

/// Linear-interpolated quantile of already sorted values
///
/// Matches the default ("linear") quantile of common dataframe libraries:
/// position `q * (n - 1)` interpolated between its neighbours.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Linear-interpolated quantile of unsorted values
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, q)
}

/// Median of unsorted values
pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}
