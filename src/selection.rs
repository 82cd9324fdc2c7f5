//! Linear vs exponential model selection.
//!
//! Both candidate models are fit by ordinary least squares on centered
//! years, the exponential one on the logarithm of the values. The choice
//! combines the AIC difference with the leave-one-out cross-validated RMSE
//! of each model when enough points are available.

use crate::config::SelectionConfig;
use crate::stats::{LinearFit, compute_mean, compute_rmse};
use std::fmt;

/// Outcome of the model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    InsufficientData,
    LinearOnly,
    Linear,
    Exponential,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::InsufficientData => "INSUFFICIENT_DATA",
            Decision::LinearOnly => "LINEAR_ONLY",
            Decision::Linear => "LINEAR",
            Decision::Exponential => "EXPONENTIAL",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model selection record of one series.
///
/// Metrics that could not be computed are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelChoice {
    pub decision: Decision,
    /// Number of usable (finite) points.
    pub n_points: usize,
    /// Number of usable points with a strictly positive value.
    pub n_positive: usize,
    pub aic_linear: Option<f64>,
    pub aic_exponential: Option<f64>,
    pub bic_linear: Option<f64>,
    pub bic_exponential: Option<f64>,
    pub rmse_cv_linear: Option<f64>,
    pub rmse_cv_exponential: Option<f64>,
}

impl ModelChoice {
    fn insufficient(n_points: usize, n_positive: usize) -> Self {
        Self {
            decision: Decision::InsufficientData,
            n_points,
            n_positive,
            aic_linear: None,
            aic_exponential: None,
            bic_linear: None,
            bic_exponential: None,
            rmse_cv_linear: None,
            rmse_cv_exponential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Model {
    Linear,
    Exponential,
}

impl Model {
    fn fit(self, x: &[f64], y: &[f64]) -> Option<LinearFit> {
        match self {
            Model::Linear => LinearFit::fit(x, y),
            Model::Exponential => {
                let log_y: Vec<f64> = y.iter().map(|val| val.ln()).collect();
                LinearFit::fit(x, &log_y)
            }
        }
    }

    fn predict(self, fit: &LinearFit, x: f64) -> f64 {
        match self {
            Model::Linear => fit.predict(x),
            Model::Exponential => fit.predict(x).exp(),
        }
    }
}

/// Decide whether `values` over `years` grow linearly or exponentially.
///
/// Pairs with a non-finite year or value are ignored.
pub fn select_model(years: &[f64], values: &[f64], cfg: &SelectionConfig) -> ModelChoice {
    let (x, y): (Vec<f64>, Vec<f64>) = years
        .iter()
        .zip(values)
        .filter(|&(xi, yi)| xi.is_finite() && yi.is_finite())
        .map(|(&xi, &yi)| (xi, yi))
        .unzip();

    let n_points = y.len();
    let n_positive = y.iter().filter(|&&val| val > 0.0).count();
    let mut choice = ModelChoice::insufficient(n_points, n_positive);

    if n_points < cfg.min_points_linear {
        return choice;
    }

    // Center years for numerical stability.
    let x_mean = compute_mean(&x);
    let x: Vec<f64> = x.iter().map(|xi| xi - x_mean).collect();

    let fit_lin = Model::Linear.fit(&x, &y);
    choice.aic_linear = fit_lin.map(|fit| fit.aic());
    choice.bic_linear = fit_lin.map(|fit| fit.bic());

    if n_points < cfg.min_points_exp {
        choice.decision = Decision::LinearOnly;
        return choice;
    }

    let run_cv = n_points >= cfg.min_points_cv;
    if run_cv {
        choice.rmse_cv_linear = loocv_rmse(Model::Linear, &x, &y);
    }

    if n_positive < n_points {
        choice.decision = Decision::Linear;
        return choice;
    }

    let fit_exp = Model::Exponential.fit(&x, &y);
    choice.aic_exponential = fit_exp.map(|fit| fit.aic());
    choice.bic_exponential = fit_exp.map(|fit| fit.bic());
    if run_cv {
        choice.rmse_cv_exponential = loocv_rmse(Model::Exponential, &x, &y);
    }

    choice.decision = decide(
        choice.aic_linear,
        choice.aic_exponential,
        choice.rmse_cv_linear,
        choice.rmse_cv_exponential,
        cfg,
    );
    choice
}

/// Leave-one-out cross-validated RMSE on the original scale of `y`.
fn loocv_rmse(model: Model, x: &[f64], y: &[f64]) -> Option<f64> {
    let n_vals = y.len();
    let mut x_train = Vec::with_capacity(n_vals);
    let mut y_train = Vec::with_capacity(n_vals);

    let mut se_sum = 0.0;
    for i_out in 0..n_vals {
        x_train.clear();
        y_train.clear();
        for i in (0..n_vals).filter(|&i| i != i_out) {
            x_train.push(x[i]);
            y_train.push(y[i]);
        }

        let fit = model.fit(&x_train, &y_train)?;
        let y_pred = model.predict(&fit, x[i_out]);
        se_sum += (y[i_out] - y_pred).powi(2);
    }

    Some(compute_rmse(se_sum, n_vals))
}

fn decide(
    aic_lin: Option<f64>,
    aic_exp: Option<f64>,
    rmse_lin: Option<f64>,
    rmse_exp: Option<f64>,
    cfg: &SelectionConfig,
) -> Decision {
    let (Some(aic_lin), Some(aic_exp)) = (aic_lin, aic_exp) else {
        return Decision::Linear;
    };

    // Negative values favour the exponential model.
    let delta_aic = aic_exp - aic_lin;
    let mut favours_exp = delta_aic <= -cfg.aic_margin;

    if let (Some(rmse_lin), Some(rmse_exp)) = (rmse_lin, rmse_exp) {
        let rmse_ratio = if rmse_lin > 0.0 {
            rmse_exp / rmse_lin
        } else {
            f64::INFINITY
        };
        favours_exp &= rmse_ratio <= cfg.rmse_ratio;
    }

    if favours_exp {
        Decision::Exponential
    } else {
        Decision::Linear
    }
}
