use statrs::distribution::{ContinuousCDF, StudentsT};
use std::f64::consts::PI;

/// Collects values and reports their mean.
pub struct Accumulator {
    vals: Vec<f64>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self { vals: Vec::new() }
    }

    pub fn add(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn count(&self) -> usize {
        self.vals.len()
    }

    /// Mean of the added values, `None` if nothing was added.
    ///
    /// Values are summed in sorted order, so the result is bit-identical
    /// for any insertion order.
    pub fn mean(&self) -> Option<f64> {
        if self.vals.is_empty() {
            return None;
        }
        let mut sorted = self.vals.clone();
        sorted.sort_by(f64::total_cmp);
        Some(compute_mean(&sorted))
    }
}

pub fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Ordinary least squares fit of `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    /// Sum of squared residuals.
    pub ssr: f64,
    /// Sum of squared deviations of `x` from its mean.
    pub ss_xx: f64,
    pub n_obs: usize,
}

/// Number of estimated parameters (intercept and slope).
const N_PARAMS: f64 = 2.0;

impl LinearFit {
    /// Fit the line, `None` with fewer than two points or a degenerate `x`.
    pub fn fit(x: &[f64], y: &[f64]) -> Option<Self> {
        let n_obs = x.len().min(y.len());
        if n_obs < 2 {
            return None;
        }
        let (x, y) = (&x[..n_obs], &y[..n_obs]);

        let x_mean = compute_mean(x);
        let y_mean = compute_mean(y);

        let mut ss_xy = 0.0;
        let mut ss_xx = 0.0;
        for (&xi, &yi) in x.iter().zip(y) {
            ss_xy += (xi - x_mean) * (yi - y_mean);
            ss_xx += (xi - x_mean).powi(2);
        }
        if ss_xx.abs() < 1e-12 {
            return None;
        }

        let slope = ss_xy / ss_xx;
        let intercept = y_mean - slope * x_mean;
        let ssr = x
            .iter()
            .zip(y)
            .map(|(&xi, &yi)| (yi - (intercept + slope * xi)).powi(2))
            .sum();

        Some(Self {
            intercept,
            slope,
            ssr,
            ss_xx,
            n_obs,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Gaussian log-likelihood at the maximum likelihood variance `ssr / n`.
    ///
    /// A perfect fit gives positive infinity.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.n_obs as f64;
        -0.5 * n * ((2.0 * PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * N_PARAMS
    }

    /// Bayesian information criterion.
    pub fn bic(&self) -> f64 {
        -2.0 * self.log_likelihood() + N_PARAMS * (self.n_obs as f64).ln()
    }

    /// Two-sided t-test p-value of the slope against zero.
    ///
    /// `None` without residual degrees of freedom.
    pub fn slope_p_value(&self) -> Option<f64> {
        let dof = self.n_obs as f64 - N_PARAMS;
        if dof < 1.0 {
            return None;
        }
        let se = (self.ssr / dof / self.ss_xx).sqrt();
        if se == 0.0 {
            return (self.slope != 0.0).then_some(0.0);
        }
        let t_stat = self.slope / se;
        let dist = StudentsT::new(0.0, 1.0, dof).ok()?;
        Some(2.0 * dist.cdf(-t_stat.abs()))
    }
}

/// Root mean of a sum of squared errors over `n_vals` values.
pub fn compute_rmse(se_sum: f64, n_vals: usize) -> f64 {
    if n_vals == 0 {
        return f64::NAN;
    }
    (se_sum / n_vals as f64).sqrt()
}
