//! Seasonal Forecaster
//!
//! Fits SARIMA(1,1,1)(1,1,1,12) to a monthly expense series and projects
//! future months with confidence bounds.
//!
//! Series of at least `css_min_observations` months are fit by conditional
//! sum of squares over the differenced values. Shorter series keep the same
//! seasonal order but are fit by exact likelihood through a Kalman filter on
//! the undifferenced values (see [`state_space`]); the coefficients are only
//! estimated once enough months remain past the differencing, and stay at
//! zero before that. Setting `short_series` to
//! [`ShortSeriesModel::NonSeasonal`] instead drops the seasonal terms for
//! short series. The order and estimator actually used are reported on the
//! returned [`Forecast`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_core::forecast::{forecast, ForecastConfig};
//!
//! let result = forecast(&expense_series(&monthly), 6, &ForecastConfig::default())?;
//! for point in &result.points {
//!     println!("{}: {:.2} [{:.2}, {:.2}]", point.month, point.predicted_expense,
//!              point.lower_ci, point.upper_ci);
//! }
//! ```

pub mod optimizer;
pub mod sarima;
pub mod state_space;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ForecastPoint, MonthlyValue};

pub use optimizer::{nelder_mead, NelderMeadOptions, OptimizationResult};
pub use sarima::{SarimaCoefficients, SarimaModel, SarimaOrder};
pub use state_space::{Scaling, StateSpaceModel};

/// How series shorter than `css_min_observations` are fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortSeriesModel {
    /// Seasonal order, exact likelihood through a Kalman filter
    #[default]
    StateSpace,
    /// ARIMA(1,1,1) by conditional sum of squares
    NonSeasonal,
}

impl ShortSeriesModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateSpace => "state_space",
            Self::NonSeasonal => "non_seasonal",
        }
    }
}

impl FromStr for ShortSeriesModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "state_space" | "kalman" => Ok(Self::StateSpace),
            "non_seasonal" | "arima" => Ok(Self::NonSeasonal),
            _ => Err(format!(
                "Unknown short series model: {} (valid: state_space, non_seasonal)",
                s
            )),
        }
    }
}

impl fmt::Display for ShortSeriesModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the coefficients of a [`Forecast`] were estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    ConditionalSumOfSquares,
    StateSpace,
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConditionalSumOfSquares => write!(f, "conditional sum of squares"),
            Self::StateSpace => write!(f, "exact likelihood"),
        }
    }
}

/// Forecaster configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Fewer observations than this is `InsufficientData`
    pub min_observations: usize,
    pub seasonal_period: usize,
    /// Observations needed before fitting by conditional sum of squares
    pub css_min_observations: usize,
    pub short_series: ShortSeriesModel,
    /// Two-sided interval coverage, in (0, 1)
    pub confidence: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_observations: 6,
            seasonal_period: 12,
            css_min_observations: 18,
            short_series: ShortSeriesModel::StateSpace,
            confidence: 0.95,
            max_iterations: 2000,
            tolerance: 1e-8,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(Error::InvalidInput(format!(
                "Confidence must be between 0 and 1, got {}",
                self.confidence
            )));
        }
        if self.min_observations < 3 {
            return Err(Error::InvalidInput(format!(
                "min_observations must be at least 3, got {}",
                self.min_observations
            )));
        }
        if self.seasonal_period < 2 {
            return Err(Error::InvalidInput(format!(
                "seasonal_period must be at least 2, got {}",
                self.seasonal_period
            )));
        }
        // both differencings plus room for the four coefficients
        let css_floor = self.seasonal_period + 6;
        if self.css_min_observations < css_floor {
            return Err(Error::InvalidInput(format!(
                "css_min_observations must be at least seasonal_period + 6 ({}), got {}",
                css_floor, self.css_min_observations
            )));
        }
        Ok(())
    }

    /// Order and estimator used for a series of `observations` points
    pub fn model_for(&self, observations: usize) -> (SarimaOrder, Estimator) {
        let seasonal = SarimaOrder::seasonal(self.seasonal_period);
        if observations >= self.css_min_observations {
            return (seasonal, Estimator::ConditionalSumOfSquares);
        }
        match self.short_series {
            ShortSeriesModel::StateSpace => (seasonal, Estimator::StateSpace),
            ShortSeriesModel::NonSeasonal => {
                (SarimaOrder::non_seasonal(), Estimator::ConditionalSumOfSquares)
            }
        }
    }

    fn optimizer_options(&self) -> NelderMeadOptions {
        NelderMeadOptions {
            step: 0.5,
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }
}

/// A fitted model and its projection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub order: SarimaOrder,
    pub estimator: Estimator,
    pub coefficients: SarimaCoefficients,
    /// Innovation variance estimate
    pub sigma2: f64,
    /// Simplex iterations used by the fit, 0 when nothing was estimated
    pub iterations: usize,
    pub points: Vec<ForecastPoint>,
}

/// Coefficients plus the mean and variance of each forecast month
struct Fitted {
    coefficients: SarimaCoefficients,
    sigma2: f64,
    iterations: usize,
    path: Vec<(f64, f64)>,
}

fn validate_series(series: &[MonthlyValue], config: &ForecastConfig) -> Result<()> {
    if series.len() < config.min_observations {
        return Err(Error::InsufficientData {
            what: "monthly observations",
            needed: config.min_observations,
            found: series.len(),
        });
    }

    if let Some(point) = series.iter().find(|p| !p.value.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "Non-finite value {} for {}",
            point.value, point.month
        )));
    }

    for pair in series.windows(2) {
        if pair[0].month.succ() != pair[1].month {
            return Err(Error::InvalidInput(format!(
                "Series is not consecutive: {} is followed by {}",
                pair[0].month, pair[1].month
            )));
        }
    }
    Ok(())
}

/// Two-sided standard normal critical value for `confidence`
fn critical_value(confidence: f64) -> Result<f64> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| {
        Error::InvalidInput(format!("Failed to create normal distribution: {}", e))
    })?;
    Ok(normal.inverse_cdf((1.0 + confidence) / 2.0))
}

fn fit_css(
    order: SarimaOrder,
    values: &[f64],
    horizon: usize,
    config: &ForecastConfig,
) -> Result<Fitted> {
    let differenced = SarimaModel::new(order, SarimaCoefficients::default()).differenced(values);

    let start = vec![0.0; order.parameter_count()];
    let fit = nelder_mead(
        |params| {
            SarimaModel::new(order, SarimaCoefficients::from_unconstrained(&order, params))
                .css(&differenced)
        },
        &start,
        &config.optimizer_options(),
    )?;

    let model = SarimaModel::new(
        order,
        SarimaCoefficients::from_unconstrained(&order, &fit.solution),
    );
    let residuals = model.residuals(&differenced);
    let sigma2 = if residuals.is_empty() {
        0.0
    } else {
        residuals.iter().map(|e| e * e).sum::<f64>() / residuals.len() as f64
    };
    if !sigma2.is_finite() {
        return Err(Error::NonConvergence {
            iterations: fit.iterations,
            reason: "innovation variance is not finite".into(),
        });
    }

    let predictions = model.forecast(values, &residuals, horizon);
    let psi = model.psi_weights(horizon);
    let mut cumulative = 0.0;
    let path = predictions
        .into_iter()
        .zip(psi)
        .map(|(predicted, weight)| {
            cumulative += weight * weight;
            (predicted, sigma2 * cumulative)
        })
        .collect();

    Ok(Fitted {
        coefficients: model.coefficients,
        sigma2,
        iterations: fit.iterations,
        path,
    })
}

fn fit_state_space(
    order: SarimaOrder,
    values: &[f64],
    horizon: usize,
    config: &ForecastConfig,
) -> Result<Fitted> {
    let scaling = Scaling::fit(values);
    let scaled = scaling.apply(values);
    let observed = values.len().saturating_sub(order.differencing_lag());

    let (coefficients, iterations) = if observed > order.parameter_count() {
        let start = vec![0.0; order.parameter_count()];
        let fit = nelder_mead(
            |params| {
                let coefficients = SarimaCoefficients::from_unconstrained(&order, params);
                StateSpaceModel::new(&SarimaModel::new(order, coefficients))
                    .filter(&scaled)
                    .objective()
            },
            &start,
            &config.optimizer_options(),
        )?;
        (
            SarimaCoefficients::from_unconstrained(&order, &fit.solution),
            fit.iterations,
        )
    } else {
        debug!(
            observed,
            parameters = order.parameter_count(),
            "Too few months past differencing to estimate coefficients, keeping them at zero"
        );
        (SarimaCoefficients::default(), 0)
    };

    let model = StateSpaceModel::new(&SarimaModel::new(order, coefficients));
    let filtered = model.filter(&scaled);
    // nothing scored yet: one month-over-month change per step
    let sigma2 = filtered
        .sigma2()
        .unwrap_or_else(|| scaled.windows(2).map(|w| (w[1] - w[0]).powi(2)).mean());
    if !sigma2.is_finite() {
        return Err(Error::NonConvergence {
            iterations,
            reason: "innovation variance is not finite".into(),
        });
    }

    let path = model
        .forecast(&filtered, sigma2, horizon)
        .into_iter()
        .map(|(mean, variance)| (scaling.restore(mean), scaling.restore_variance(variance)))
        .collect();

    Ok(Fitted {
        coefficients,
        sigma2: scaling.restore_variance(sigma2),
        iterations,
        path,
    })
}

/// Fit the seasonal model to `series` and forecast `horizon` months ahead
///
/// `series` must hold consecutive months in ascending order; gaps are
/// rejected rather than filled.
pub fn forecast(series: &[MonthlyValue], horizon: usize, config: &ForecastConfig) -> Result<Forecast> {
    config.validate()?;
    if horizon == 0 {
        return Err(Error::InvalidInput("Forecast horizon must be at least 1".into()));
    }
    validate_series(series, config)?;

    let values: Vec<f64> = series.iter().map(|p| p.value).collect();
    let (order, estimator) = config.model_for(values.len());
    if values.len() < config.css_min_observations {
        debug!(
            observations = values.len(),
            needed = config.css_min_observations,
            short_series = %config.short_series,
            "Series too short for conditional sum of squares, fitting {} by {}",
            order,
            estimator
        );
    }

    let z = critical_value(config.confidence)?;
    let fitted = match estimator {
        Estimator::ConditionalSumOfSquares => fit_css(order, &values, horizon, config)?,
        Estimator::StateSpace => fit_state_space(order, &values, horizon, config)?,
    };

    let mut month = series[series.len() - 1].month;
    let mut points = Vec::with_capacity(horizon);
    for (predicted, variance) in fitted.path {
        month = month.succ();
        let half_width = z * variance.sqrt();
        points.push(ForecastPoint {
            month,
            predicted_expense: predicted,
            lower_ci: predicted - half_width,
            upper_ci: predicted + half_width,
        });
    }

    if points
        .iter()
        .any(|p| !p.predicted_expense.is_finite() || !p.interval_width().is_finite())
    {
        return Err(Error::NonConvergence {
            iterations: fitted.iterations,
            reason: "forecast produced non-finite values".into(),
        });
    }

    debug!(
        order = %order,
        estimator = %estimator,
        iterations = fitted.iterations,
        sigma2 = fitted.sigma2,
        horizon,
        "Fitted forecast model"
    );

    Ok(Forecast {
        order,
        estimator,
        coefficients: fitted.coefficients,
        sigma2: fitted.sigma2,
        iterations: fitted.iterations,
        points,
    })
}
