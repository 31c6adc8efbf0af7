//! Analytics configuration
//!
//! Configuration is loaded from (in order):
//! 1. An explicit path passed by the caller (`--config`)
//! 2. `~/.config/tally/analytics.toml` (user override), if it exists
//! 3. The default embedded in the binary (`config/analytics.toml`)
//!
//! Every key is optional; anything missing keeps its built-in default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::anomaly::{DetectorConfig, IsolationFeature, ZScoreBaseline};
use crate::cluster::{ClusterConfig, KMeansInit};
use crate::error::{Error, Result};
use crate::forecast::{ForecastConfig, ShortSeriesModel};
use crate::models::AnomalyMethod;

/// Default config embedded at compile time
const DEFAULT_CONFIG: &str = include_str!("../../../config/analytics.toml");

/// Presentation settings that don't affect the analytics themselves
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Months projected by the forecast stage
    pub forecast_horizon: usize,
    /// Categories listed in budget insights
    pub top_categories: usize,
    /// Expected amount for categories without an explicit budget
    pub default_budget: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            forecast_horizon: 6,
            top_categories: 3,
            default_budget: 500.0,
        }
    }
}

/// All analytics settings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalyticsConfig {
    pub detector: DetectorConfig,
    pub forecast: ForecastConfig,
    pub cluster: ClusterConfig,
    pub report: ReportConfig,
}

impl AnalyticsConfig {
    /// Load configuration, preferring `path` over the user override
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => read_config(path)?,
            None => match default_config_path() {
                Some(user_path) if user_path.exists() => read_config(&user_path)?,
                _ => DEFAULT_CONFIG.to_string(),
            },
        };
        parse_config(&content)
    }

    /// The configuration embedded in the binary
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }
}

/// User override location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tally").join("analytics.toml"))
}

fn read_config(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "Loading analytics config");
    fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config {}: {}", path.display(), e))
    })
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    anomaly: Option<RawAnomaly>,
    forecast: Option<RawForecast>,
    clustering: Option<RawClustering>,
    report: Option<RawReport>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAnomaly {
    method: Option<String>,
    threshold: Option<f64>,
    baseline: Option<String>,
    isolation_min_size: Option<usize>,
    isolation: Option<RawIsolation>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIsolation {
    trees: Option<usize>,
    sample_size: Option<usize>,
    seed: Option<u64>,
    contamination: Option<f64>,
    features: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawForecast {
    horizon: Option<usize>,
    confidence: Option<f64>,
    min_observations: Option<usize>,
    seasonal_period: Option<usize>,
    css_min_observations: Option<usize>,
    short_series: Option<String>,
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClustering {
    k: Option<usize>,
    seed: Option<u64>,
    init: Option<String>,
    max_iterations: Option<usize>,
    low_quantile: Option<f64>,
    medium_quantile: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReport {
    top_categories: Option<usize>,
    default_budget: Option<f64>,
}

/// Parse config from TOML content, overlaying it on the defaults
pub fn parse_config(content: &str) -> Result<AnalyticsConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = AnalyticsConfig::default();

    if let Some(anomaly) = raw.anomaly {
        let detector = &mut config.detector;
        if let Some(method) = anomaly.method {
            detector.method = method.parse::<AnomalyMethod>().map_err(Error::Config)?;
        }
        if let Some(threshold) = anomaly.threshold {
            detector.threshold = threshold;
        }
        if let Some(baseline) = anomaly.baseline {
            detector.baseline = baseline.parse::<ZScoreBaseline>().map_err(Error::Config)?;
        }
        if let Some(size) = anomaly.isolation_min_size {
            detector.isolation_min_size = size;
        }
        if let Some(isolation) = anomaly.isolation {
            let forest = &mut detector.isolation;
            if let Some(trees) = isolation.trees {
                forest.n_trees = trees;
            }
            if let Some(sample_size) = isolation.sample_size {
                forest.sample_size = sample_size;
            }
            if let Some(seed) = isolation.seed {
                forest.seed = seed;
            }
            if let Some(contamination) = isolation.contamination {
                forest.contamination = contamination;
            }
            if let Some(features) = isolation.features {
                forest.features = features
                    .iter()
                    .map(|f| f.parse::<IsolationFeature>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(Error::Config)?;
            }
        }
    }

    if let Some(forecast) = raw.forecast {
        if let Some(horizon) = forecast.horizon {
            config.report.forecast_horizon = horizon;
        }
        let fc = &mut config.forecast;
        if let Some(confidence) = forecast.confidence {
            fc.confidence = confidence;
        }
        if let Some(min) = forecast.min_observations {
            fc.min_observations = min;
        }
        if let Some(period) = forecast.seasonal_period {
            fc.seasonal_period = period;
        }
        if let Some(min) = forecast.css_min_observations {
            fc.css_min_observations = min;
        }
        if let Some(model) = forecast.short_series {
            fc.short_series = model.parse::<ShortSeriesModel>().map_err(Error::Config)?;
        }
        if let Some(iterations) = forecast.max_iterations {
            fc.max_iterations = iterations;
        }
        if let Some(tolerance) = forecast.tolerance {
            fc.tolerance = tolerance;
        }
    }

    if let Some(clustering) = raw.clustering {
        let cc = &mut config.cluster;
        if let Some(k) = clustering.k {
            cc.k = k;
        }
        if let Some(seed) = clustering.seed {
            cc.seed = seed;
        }
        if let Some(init) = clustering.init {
            cc.init = init.parse::<KMeansInit>().map_err(Error::Config)?;
        }
        if let Some(iterations) = clustering.max_iterations {
            cc.max_iterations = iterations;
        }
        if let Some(q) = clustering.low_quantile {
            cc.low_quantile = q;
        }
        if let Some(q) = clustering.medium_quantile {
            cc.medium_quantile = q;
        }
    }

    if let Some(report) = raw.report {
        if let Some(top) = report.top_categories {
            config.report.top_categories = top;
        }
        if let Some(budget) = report.default_budget {
            config.report.default_budget = budget;
        }
    }

    Ok(config)
}
