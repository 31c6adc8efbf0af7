//! Derivative-free Nelder-Mead simplex minimizer
//!
//! Fully deterministic: the initial simplex is built from fixed axis steps and
//! every tie is broken by vertex order.

use crate::error::{Error, Result};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Result of a successful minimization
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub solution: Vec<f64>,
    pub function_value: f64,
    pub iterations: usize,
}

/// Stopping rules for [`nelder_mead`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    /// Size of the initial step along each axis
    pub step: f64,
    /// Relative spread of simplex values at which the search stops
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            step: 0.5,
            tolerance: 1e-8,
            max_iterations: 2000,
        }
    }
}

fn evaluate<F: Fn(&[f64]) -> f64>(f: &F, x: &[f64]) -> f64 {
    let value = f(x);
    if value.is_nan() {
        f64::INFINITY
    } else {
        value
    }
}

fn towards(from: &[f64], to: &[f64], coefficient: f64) -> Vec<f64> {
    from.iter()
        .zip(to)
        .map(|(a, b)| a + coefficient * (b - a))
        .collect()
}

/// Minimize `f` starting from `x0`
///
/// Stops once `f_worst - f_best <= tolerance * (|f_best| + 1)`. Returns
/// [`Error::NonConvergence`] if that doesn't happen within
/// `max_iterations`, or if the best value found is not finite.
pub fn nelder_mead<F>(f: F, x0: &[f64], options: &NelderMeadOptions) -> Result<OptimizationResult>
where
    F: Fn(&[f64]) -> f64,
{
    let dim = x0.len();

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((x0.to_vec(), evaluate(&f, x0)));
    for axis in 0..dim {
        let mut vertex = x0.to_vec();
        vertex[axis] += options.step;
        let value = evaluate(&f, &vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    loop {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[dim].1;
        if !best.is_finite() {
            return Err(Error::NonConvergence {
                iterations,
                reason: "objective is not finite".into(),
            });
        }
        if worst - best <= options.tolerance * (best.abs() + 1.0) {
            break;
        }
        if iterations >= options.max_iterations {
            return Err(Error::NonConvergence {
                iterations,
                reason: format!(
                    "simplex spread {:.3e} above tolerance after {} iterations",
                    worst - best,
                    iterations
                ),
            });
        }
        iterations += 1;

        let mut centroid = vec![0.0; dim];
        for (vertex, _) in &simplex[..dim] {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v / dim as f64;
            }
        }

        let worst_vertex = simplex[dim].0.clone();
        let reflected = towards(&centroid, &worst_vertex, -REFLECTION);
        let f_reflected = evaluate(&f, &reflected);

        if f_reflected < best {
            let expanded = towards(&centroid, &worst_vertex, -EXPANSION);
            let f_expanded = evaluate(&f, &expanded);
            simplex[dim] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }

        if f_reflected < simplex[dim - 1].1 {
            simplex[dim] = (reflected, f_reflected);
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < worst {
            let outside = towards(&centroid, &reflected, CONTRACTION);
            let value = evaluate(&f, &outside);
            (outside, value)
        } else {
            let inside = towards(&centroid, &worst_vertex, CONTRACTION);
            let value = evaluate(&f, &inside);
            (inside, value)
        };

        if f_contracted < worst.min(f_reflected) {
            simplex[dim] = (contracted, f_contracted);
            continue;
        }

        let anchor = simplex[0].0.clone();
        for (vertex, value) in simplex.iter_mut().skip(1) {
            *vertex = towards(&anchor, vertex, SHRINK);
            *value = evaluate(&f, vertex);
        }
    }

    let (solution, function_value) = simplex.swap_remove(0);
    Ok(OptimizationResult {
        solution,
        function_value,
        iterations,
    })
}
