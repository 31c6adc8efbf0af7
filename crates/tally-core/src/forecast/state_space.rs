//! Exact-likelihood SARIMA through a Kalman filter
//!
//! Once both differencings are applied, a series of one to two years leaves
//! little or nothing for conditional sum of squares to fit. Here the model is
//! written in state-space form over the undifferenced values instead: the
//! lagged values the differencing needs are part of the state, started with a
//! large variance, so every observation contributes. The first `d + sD` steps
//! only pin down that start-up state and are left out of the likelihood.
//!
//! State layout: `[y(t-1) .. y(t-m) | ARMA block]` where `m = d + sD` and the
//! ARMA block is the usual companion form of `φ*(B) u = θ*(B) ε` with
//! `u = (1-B)^d (1-B^s)^D y`.

use statrs::statistics::Statistics;

use super::sarima::SarimaModel;

/// Variance of the unknown pre-sample values, relative to the innovation variance
const DIFFUSE_VARIANCE: f64 = 1e6;
const LYAPUNOV_ITERATIONS: usize = 60;
/// Prediction variances at or below this carry no information
const MIN_VARIANCE: f64 = 1e-12;

/// Affine map that brings a series to unit scale before filtering
///
/// Centered on the first value and scaled by the root mean squared
/// month-over-month change, so the start-up variance is large relative to
/// anything the data can show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub center: f64,
    pub scale: f64,
}

impl Scaling {
    pub fn fit(values: &[f64]) -> Self {
        let center = values.first().copied().unwrap_or(0.0);
        let mean_square = values.windows(2).map(|w| (w[1] - w[0]).powi(2)).mean();
        let rms = mean_square.sqrt();
        let scale = if rms.is_finite() && rms > 0.0 { rms } else { 1.0 };
        Self { center, scale }
    }

    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| (v - self.center) / self.scale).collect()
    }

    pub fn restore(&self, value: f64) -> f64 {
        self.center + self.scale * value
    }

    pub fn restore_variance(&self, variance: f64) -> f64 {
        variance * self.scale * self.scale
    }
}

/// State after running the filter over a series
#[derive(Debug, Clone)]
pub struct Filtered {
    /// One-step-ahead state mean for the month after the series
    state: Vec<f64>,
    covariance: Vec<Vec<f64>>,
    /// Σ v²/f over the steps past start-up
    scaled_squares: f64,
    /// Σ ln f over the same steps
    log_variances: f64,
    /// Steps past start-up
    pub steps: usize,
}

impl Filtered {
    /// Innovation variance that maximizes the likelihood, if any step counted
    pub fn sigma2(&self) -> Option<f64> {
        (self.steps > 0).then(|| self.scaled_squares / self.steps as f64)
    }

    /// Negative log-likelihood with σ² profiled out, up to a constant
    pub fn objective(&self) -> f64 {
        match self.sigma2() {
            Some(sigma2) => {
                self.steps as f64 * sigma2.max(f64::MIN_POSITIVE).ln() + self.log_variances
            }
            None => 0.0,
        }
    }
}

/// A SARIMA model in state-space form
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpaceModel {
    /// `c_k` in `y(t) = Σ c_k y(t-k) + u(t)`
    integration: Vec<f64>,
    /// AR coefficients of the ARMA block, padded to its size
    ar: Vec<f64>,
    /// MA coefficients of the ARMA block with the leading 1, padded likewise
    ma: Vec<f64>,
}

impl StateSpaceModel {
    pub fn new(model: &SarimaModel) -> Self {
        let integration = model
            .differencing_polynomial()
            .iter()
            .skip(1)
            .map(|c| -c)
            .collect();

        let ar_poly = model.ar_polynomial();
        let ma_poly = model.ma_polynomial();
        let block = (ar_poly.len() - 1).max(ma_poly.len());
        let ar = (1..=block)
            .map(|i| -ar_poly.get(i).copied().unwrap_or(0.0))
            .collect();
        let ma = (0..block)
            .map(|i| ma_poly.get(i).copied().unwrap_or(0.0))
            .collect();

        Self {
            integration,
            ar,
            ma,
        }
    }

    /// Number of leading steps spent resolving the start-up state
    pub fn startup(&self) -> usize {
        self.integration.len()
    }

    fn dimension(&self) -> usize {
        self.integration.len() + self.ar.len()
    }

    /// `Z x`: the observation implied by a state
    fn observe(&self, x: &[f64]) -> f64 {
        let m = self.integration.len();
        let lagged: f64 = self.integration.iter().zip(x).map(|(c, v)| c * v).sum();
        lagged + x[m]
    }

    /// `T x`
    fn transition(&self, x: &[f64]) -> Vec<f64> {
        let m = self.integration.len();
        let block = self.ar.len();
        let mut out = vec![0.0; m + block];
        if m > 0 {
            out[0] = self.observe(x);
            out[1..m].copy_from_slice(&x[..m - 1]);
        }
        let u = x[m];
        for i in 0..block {
            let carried = if i + 1 < block { x[m + i + 1] } else { 0.0 };
            out[m + i] = self.ar[i] * u + carried;
        }
        out
    }

    /// `T P T' + R R'`
    fn predict_covariance(&self, p: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n = self.dimension();
        let m = self.integration.len();

        let mut tp = vec![vec![0.0; n]; n];
        for j in 0..n {
            let column: Vec<f64> = p.iter().map(|row| row[j]).collect();
            for (i, value) in self.transition(&column).into_iter().enumerate() {
                tp[i][j] = value;
            }
        }
        let mut out: Vec<Vec<f64>> = tp.iter().map(|row| self.transition(row)).collect();

        for (i, a) in self.ma.iter().enumerate() {
            for (j, b) in self.ma.iter().enumerate() {
                out[m + i][m + j] += a * b;
            }
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let value = 0.5 * (out[i][j] + out[j][i]);
                out[i][j] = value;
                out[j][i] = value;
            }
        }
        out
    }

    /// Covariance of the ARMA block under stationarity, by the doubling
    /// iteration `Σ += A Σ A'`, `A = A²`
    fn stationary_covariance(&self) -> Vec<Vec<f64>> {
        let block = self.ar.len();
        let mut a = vec![vec![0.0; block]; block];
        for i in 0..block {
            a[i][0] = self.ar[i];
            if i + 1 < block {
                a[i][i + 1] = 1.0;
            }
        }
        let mut sigma: Vec<Vec<f64>> = self
            .ma
            .iter()
            .map(|x| self.ma.iter().map(|y| x * y).collect())
            .collect();

        for _ in 0..LYAPUNOV_ITERATIONS {
            let step = multiply(&multiply(&a, &sigma), &transpose(&a));
            let mut change: f64 = 0.0;
            let mut size: f64 = 0.0;
            for (row, step_row) in sigma.iter_mut().zip(&step) {
                for (value, delta) in row.iter_mut().zip(step_row) {
                    *value += delta;
                    change = change.max(delta.abs());
                    size = size.max(value.abs());
                }
            }
            if !change.is_finite() || change <= 1e-14 * (size + 1.0) {
                break;
            }
            a = multiply(&a, &a);
        }
        sigma
    }

    fn initial_covariance(&self) -> Vec<Vec<f64>> {
        let n = self.dimension();
        let m = self.integration.len();
        let mut p = vec![vec![0.0; n]; n];
        for (j, row) in p.iter_mut().enumerate().take(m) {
            row[j] = DIFFUSE_VARIANCE;
        }
        for (i, row) in self.stationary_covariance().into_iter().enumerate() {
            for (j, value) in row.into_iter().enumerate() {
                p[m + i][m + j] = value;
            }
        }
        p
    }

    /// Run the filter over `values` with unit innovation variance
    pub fn filter(&self, values: &[f64]) -> Filtered {
        let n = self.dimension();
        let startup = self.startup();
        let mut state = vec![0.0; n];
        let mut covariance = self.initial_covariance();
        let mut scaled_squares = 0.0;
        let mut log_variances = 0.0;
        let mut steps = 0;

        for (t, &y) in values.iter().enumerate() {
            let pz: Vec<f64> = covariance.iter().map(|row| self.observe(row)).collect();
            let f = self.observe(&pz);
            let v = y - self.observe(&state);

            if f > MIN_VARIANCE {
                for (s, k) in state.iter_mut().zip(&pz) {
                    *s += k * v / f;
                }
                for (row, ki) in covariance.iter_mut().zip(&pz) {
                    for (value, kj) in row.iter_mut().zip(&pz) {
                        *value -= ki * kj / f;
                    }
                }
                if t >= startup {
                    scaled_squares += v * v / f;
                    log_variances += f.ln();
                    steps += 1;
                }
            }

            state = self.transition(&state);
            covariance = self.predict_covariance(&covariance);
        }

        Filtered {
            state,
            covariance,
            scaled_squares,
            log_variances,
            steps,
        }
    }

    /// Mean and variance of the next `horizon` observations
    ///
    /// Variances are for innovation variance `sigma2`.
    pub fn forecast(&self, filtered: &Filtered, sigma2: f64, horizon: usize) -> Vec<(f64, f64)> {
        let mut state = filtered.state.clone();
        let mut covariance = filtered.covariance.clone();
        let mut out = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let pz: Vec<f64> = covariance.iter().map(|row| self.observe(row)).collect();
            let variance = sigma2 * self.observe(&pz).max(0.0);
            out.push((self.observe(&state), variance));
            state = self.transition(&state);
            covariance = self.predict_covariance(&covariance);
        }
        out
    }
}

fn multiply(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let cols = b.first().map_or(0, Vec::len);
    a.iter()
        .map(|row| {
            (0..cols)
                .map(|j| row.iter().zip(b).map(|(x, b_row)| x * b_row[j]).sum())
                .collect()
        })
        .collect()
}

fn transpose(a: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let cols = a.first().map_or(0, Vec::len);
    (0..cols)
        .map(|j| a.iter().map(|row| row[j]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::sarima::{SarimaCoefficients, SarimaOrder};

    fn state_space(order: SarimaOrder, coefficients: SarimaCoefficients) -> StateSpaceModel {
        StateSpaceModel::new(&SarimaModel::new(order, coefficients))
    }

    #[test]
    fn test_layout_of_seasonal_model() {
        let model = state_space(SarimaOrder::seasonal(12), SarimaCoefficients::default());
        assert_eq!(model.startup(), 13);
        // (1-B)(1-B^12) = 1 - B - B^12 + B^13
        assert_eq!(model.integration[0], 1.0);
        assert_eq!(model.integration[11], 1.0);
        assert_eq!(model.integration[12], -1.0);
        assert_eq!(model.ar.len(), 14);
        assert_eq!(model.ma[0], 1.0);
    }

    #[test]
    fn test_stationary_covariance_of_ar1() {
        let order = SarimaOrder {
            p: 1,
            d: 0,
            q: 0,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 12,
        };
        let coefficients = SarimaCoefficients {
            ar: 0.5,
            ..Default::default()
        };
        let model = state_space(order, coefficients);
        let sigma = model.stationary_covariance();
        assert!((sigma[0][0] - 1.0 / (1.0 - 0.25)).abs() < 1e-9);
    }

    #[test]
    fn test_random_walk_forecast_holds_last_value() {
        let model = state_space(SarimaOrder::non_seasonal(), SarimaCoefficients::default());
        let filtered = model.filter(&[0.0, 1.0, 0.5, 2.0]);
        assert_eq!(filtered.steps, 3);

        let sigma2 = filtered.sigma2().unwrap();
        let path = model.forecast(&filtered, sigma2, 3);
        for (mean, _) in &path {
            assert!((mean - 2.0).abs() < 1e-6);
        }
        // random walk: variance grows by σ² per month
        assert!((path[0].1 - sigma2).abs() < 1e-6 * sigma2.max(1.0));
        assert!((path[2].1 - 3.0 * sigma2).abs() < 1e-6 * sigma2.max(1.0));
    }

    #[test]
    fn test_startup_steps_are_not_scored() {
        let model = state_space(SarimaOrder::seasonal(12), SarimaCoefficients::default());
        let values: Vec<f64> = (0..10).map(|t| t as f64).collect();
        let filtered = model.filter(&values);
        assert_eq!(filtered.steps, 0);
        assert_eq!(filtered.sigma2(), None);
        assert_eq!(filtered.objective(), 0.0);
    }

    #[test]
    fn test_scaling_round_trip() {
        let scaling = Scaling::fit(&[100.0, 110.0, 90.0]);
        assert_eq!(scaling.center, 100.0);
        assert!((scaling.scale - 250.0_f64.sqrt()).abs() < 1e-12);
        let scaled = scaling.apply(&[120.0]);
        assert!((scaling.restore(scaled[0]) - 120.0).abs() < 1e-9);

        let flat = Scaling::fit(&[5.0, 5.0, 5.0]);
        assert_eq!(flat.scale, 1.0);
    }
}
