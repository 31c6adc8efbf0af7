//! Seasonal ARIMA model arithmetic
//!
//! A model `(1-φB)(1-ΦB^s)(1-B)^d(1-B^s)^D y = (1+θB)(1+ΘB^s) ε` is handled as
//! plain lag polynomials: index `k` of a coefficient vector multiplies `B^k`
//! and index 0 is always 1. Fitting, forecasting and ψ-weights are all
//! products and recursions over those vectors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Model order. Only 0 or 1 AR/MA terms per part are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl SarimaOrder {
    /// SARIMA(1,1,1)(1,1,1,period)
    pub fn seasonal(period: usize) -> Self {
        Self {
            p: 1,
            d: 1,
            q: 1,
            seasonal_p: 1,
            seasonal_d: 1,
            seasonal_q: 1,
            period,
        }
    }

    /// ARIMA(1,1,1) with no seasonal part
    pub fn non_seasonal() -> Self {
        Self {
            p: 1,
            d: 1,
            q: 1,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 0,
        }
    }

    pub fn is_seasonal(&self) -> bool {
        self.period > 0 && (self.seasonal_p + self.seasonal_d + self.seasonal_q) > 0
    }

    /// Observations consumed by differencing
    pub fn differencing_lag(&self) -> usize {
        self.d + self.seasonal_d * self.period
    }

    /// Number of free coefficients
    pub fn parameter_count(&self) -> usize {
        self.p.min(1) + self.q.min(1) + self.seasonal_p.min(1) + self.seasonal_q.min(1)
    }
}

impl fmt::Display for SarimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_seasonal() {
            write!(
                f,
                "SARIMA({},{},{})({},{},{},{})",
                self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
            )
        } else {
            write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
        }
    }
}

/// Fitted coefficients; terms absent from the order are 0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SarimaCoefficients {
    pub ar: f64,
    pub ma: f64,
    pub seasonal_ar: f64,
    pub seasonal_ma: f64,
}

impl SarimaCoefficients {
    /// Map unconstrained optimizer parameters into (-1, 1) through `tanh`
    ///
    /// Parameters are read in the order ar, ma, seasonal_ar, seasonal_ma,
    /// skipping the terms the order doesn't have.
    pub fn from_unconstrained(order: &SarimaOrder, params: &[f64]) -> Self {
        let mut values = params.iter().map(|u| u.tanh());
        let mut take = |present: bool| if present { values.next().unwrap_or(0.0) } else { 0.0 };

        let ar = take(order.p > 0);
        let ma = take(order.q > 0);
        let seasonal_ar = take(order.is_seasonal() && order.seasonal_p > 0);
        let seasonal_ma = take(order.is_seasonal() && order.seasonal_q > 0);

        Self {
            ar,
            ma,
            seasonal_ar,
            seasonal_ma,
        }
    }
}

/// Product of two lag polynomials
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + coefficient * B^lag`
fn factor(coefficient: f64, lag: usize) -> Vec<f64> {
    let mut poly = vec![0.0; lag + 1];
    poly[0] = 1.0;
    poly[lag] += coefficient;
    poly
}

/// Lag-`lag` differences `y[t] - y[t-lag]`; shorter by `lag`
pub fn difference(values: &[f64], lag: usize) -> Vec<f64> {
    if lag == 0 {
        return values.to_vec();
    }
    values
        .iter()
        .skip(lag)
        .zip(values)
        .map(|(current, previous)| current - previous)
        .collect()
}

/// A SARIMA model with known coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SarimaModel {
    pub order: SarimaOrder,
    pub coefficients: SarimaCoefficients,
}

impl SarimaModel {
    pub fn new(order: SarimaOrder, coefficients: SarimaCoefficients) -> Self {
        Self {
            order,
            coefficients,
        }
    }

    /// Apply the model's regular and seasonal differencing
    pub fn differenced(&self, values: &[f64]) -> Vec<f64> {
        let mut out = values.to_vec();
        for _ in 0..self.order.d {
            out = difference(&out, 1);
        }
        if self.order.is_seasonal() {
            for _ in 0..self.order.seasonal_d {
                out = difference(&out, self.order.period);
            }
        }
        out
    }

    /// `(1-φB)(1-ΦB^s)`
    pub(crate) fn ar_polynomial(&self) -> Vec<f64> {
        let mut poly = vec![1.0];
        if self.order.p > 0 {
            poly = multiply(&poly, &factor(-self.coefficients.ar, 1));
        }
        if self.order.is_seasonal() && self.order.seasonal_p > 0 {
            poly = multiply(&poly, &factor(-self.coefficients.seasonal_ar, self.order.period));
        }
        poly
    }

    /// `(1+θB)(1+ΘB^s)`
    pub(crate) fn ma_polynomial(&self) -> Vec<f64> {
        let mut poly = vec![1.0];
        if self.order.q > 0 {
            poly = multiply(&poly, &factor(self.coefficients.ma, 1));
        }
        if self.order.is_seasonal() && self.order.seasonal_q > 0 {
            poly = multiply(&poly, &factor(self.coefficients.seasonal_ma, self.order.period));
        }
        poly
    }

    /// `(1-B)^d(1-B^s)^D`
    pub(crate) fn differencing_polynomial(&self) -> Vec<f64> {
        let mut poly = vec![1.0];
        for _ in 0..self.order.d {
            poly = multiply(&poly, &factor(-1.0, 1));
        }
        if self.order.is_seasonal() {
            for _ in 0..self.order.seasonal_d {
                poly = multiply(&poly, &factor(-1.0, self.order.period));
            }
        }
        poly
    }

    /// AR polynomial with the differencing operators folded in
    fn integrated_ar_polynomial(&self) -> Vec<f64> {
        multiply(&self.ar_polynomial(), &self.differencing_polynomial())
    }

    /// One-step innovations over an already differenced series
    ///
    /// Pre-sample values and innovations are taken as zero.
    pub fn residuals(&self, differenced: &[f64]) -> Vec<f64> {
        let ar = self.ar_polynomial();
        let ma = self.ma_polynomial();
        let mut residuals: Vec<f64> = Vec::with_capacity(differenced.len());

        for t in 0..differenced.len() {
            let mut e = 0.0;
            for (k, a) in ar.iter().enumerate().take(t + 1) {
                e += a * differenced[t - k];
            }
            for (k, m) in ma.iter().enumerate().skip(1).take(t) {
                e -= m * residuals[t - k];
            }
            residuals.push(e);
        }
        residuals
    }

    /// Mean squared innovation, the conditional-sum-of-squares objective
    pub fn css(&self, differenced: &[f64]) -> f64 {
        if differenced.is_empty() {
            return 0.0;
        }
        let residuals = self.residuals(differenced);
        residuals.iter().map(|e| e * e).sum::<f64>() / residuals.len() as f64
    }

    /// First `count` weights of the model's infinite moving-average form
    pub fn psi_weights(&self, count: usize) -> Vec<f64> {
        let ar = self.integrated_ar_polynomial();
        let ma = self.ma_polynomial();
        let mut psi: Vec<f64> = Vec::with_capacity(count);

        for j in 0..count {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut value = ma.get(j).copied().unwrap_or(0.0);
            for (k, a) in ar.iter().enumerate().skip(1).take(j) {
                value -= a * psi[j - k];
            }
            psi.push(value);
        }
        psi
    }

    /// Point forecasts for the `horizon` observations following `history`
    ///
    /// `residuals` are the innovations of the differenced history, as returned
    /// by [`SarimaModel::residuals`]. Future innovations are zero.
    pub fn forecast(&self, history: &[f64], residuals: &[f64], horizon: usize) -> Vec<f64> {
        let ar = self.integrated_ar_polynomial();
        let ma = self.ma_polynomial();
        let n = history.len();
        let lag = self.order.differencing_lag();

        // innovations aligned to history indices
        let mut innovations = vec![0.0; n + horizon];
        for (i, e) in residuals.iter().enumerate() {
            if let Some(slot) = innovations.get_mut(i + lag) {
                *slot = *e;
            }
        }

        let mut values = history.to_vec();
        for t in n..n + horizon {
            let mut next = 0.0;
            for (k, a) in ar.iter().enumerate().skip(1) {
                if k <= t {
                    next -= a * values[t - k];
                }
            }
            for (k, m) in ma.iter().enumerate().skip(1) {
                if k <= t {
                    next += m * innovations[t - k];
                }
            }
            values.push(next);
        }
        values.split_off(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(order: SarimaOrder, ar: f64, ma: f64, seasonal_ar: f64, seasonal_ma: f64) -> SarimaModel {
        SarimaModel::new(
            order,
            SarimaCoefficients {
                ar,
                ma,
                seasonal_ar,
                seasonal_ma,
            },
        )
    }

    #[test]
    fn test_order_display() {
        assert_eq!(SarimaOrder::seasonal(12).to_string(), "SARIMA(1,1,1)(1,1,1,12)");
        assert_eq!(SarimaOrder::non_seasonal().to_string(), "ARIMA(1,1,1)");
        assert_eq!(SarimaOrder::seasonal(12).differencing_lag(), 13);
        assert_eq!(SarimaOrder::non_seasonal().parameter_count(), 2);
    }

    #[test]
    fn test_multiply_polynomials() {
        // (1 - B)(1 + B) = 1 - B^2
        assert_eq!(multiply(&[1.0, -1.0], &[1.0, 1.0]), vec![1.0, 0.0, -1.0]);
    }

    #[test]
    fn test_difference() {
        assert_eq!(difference(&[1.0, 4.0, 9.0, 16.0], 1), vec![3.0, 5.0, 7.0]);
        assert_eq!(difference(&[1.0, 4.0, 9.0, 16.0], 2), vec![8.0, 12.0]);
        assert!(difference(&[1.0], 12).is_empty());
    }

    #[test]
    fn test_from_unconstrained_skips_missing_terms() {
        let coefficients =
            SarimaCoefficients::from_unconstrained(&SarimaOrder::non_seasonal(), &[0.0, 100.0]);
        assert_eq!(coefficients.ar, 0.0);
        assert!((coefficients.ma - 1.0).abs() < 1e-12);
        assert_eq!(coefficients.seasonal_ar, 0.0);
        assert_eq!(coefficients.seasonal_ma, 0.0);
    }

    #[test]
    fn test_residuals_of_white_noise_model() {
        let m = model(SarimaOrder::non_seasonal(), 0.0, 0.0, 0.0, 0.0);
        assert_eq!(m.residuals(&[1.0, -2.0, 3.0]), vec![1.0, -2.0, 3.0]);
        assert!((m.css(&[1.0, -2.0, 3.0]) - 14.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_residuals_invert_ma_term() {
        // w = e + 0.5 e[-1] with e = [1, 1, 1]
        let m = model(SarimaOrder::non_seasonal(), 0.0, 0.5, 0.0, 0.0);
        let residuals = m.residuals(&[1.0, 1.5, 1.5]);
        for e in residuals {
            assert!((e - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_random_walk_psi_weights() {
        // (1 - B) y = e has ψ_j = 1 for every j
        let m = model(SarimaOrder::non_seasonal(), 0.0, 0.0, 0.0, 0.0);
        assert_eq!(m.psi_weights(4), vec![1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_random_walk_forecast_repeats_last_value() {
        let m = model(SarimaOrder::non_seasonal(), 0.0, 0.0, 0.0, 0.0);
        let history = [3.0, 5.0, 4.0];
        let residuals = m.residuals(&m.differenced(&history));
        assert_eq!(m.forecast(&history, &residuals, 3), vec![4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_seasonal_naive_forecast_repeats_pattern() {
        // (1 - B)(1 - B^4) y = e with zero innovations continues trend plus season
        let order = SarimaOrder {
            p: 0,
            d: 1,
            q: 0,
            seasonal_p: 0,
            seasonal_d: 1,
            seasonal_q: 0,
            period: 4,
        };
        let m = model(order, 0.0, 0.0, 0.0, 0.0);
        let history: Vec<f64> = (0..12).map(|t| [10.0, 20.0, 15.0, 5.0][t % 4] + t as f64).collect();
        let residuals = m.residuals(&m.differenced(&history));
        assert!(residuals.iter().all(|e| e.abs() < 1e-12));

        let forecast = m.forecast(&history, &residuals, 4);
        let expected: Vec<f64> = (12..16).map(|t| [10.0, 20.0, 15.0, 5.0][t % 4] + t as f64).collect();
        for (got, want) in forecast.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-9);
        }
    }
}
