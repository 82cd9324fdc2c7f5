use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Analysis configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Parameters of the MAV/AMAV aggregation.
    pub aggregation: AggregationConfig,
    /// Parameters of the linear vs exponential model selection.
    pub selection: SelectionConfig,
}

/// Which MAV value feeds each AMAV-POS position.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulationMode {
    /// Position `i` accumulates the MAV of position `i - 1`.
    #[default]
    Prev,
    /// Position `i` accumulates the MAV of position `i`.
    Current,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    /// Accumulation mode of the positive limb.
    pub mode: AccumulationMode,
    /// Include negative MAV values in the positive limb accumulation.
    pub include_negative: bool,
    /// Tolerance below zero before AMAV counts as negative.
    pub epsilon: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            mode: AccumulationMode::Prev,
            include_negative: true,
            epsilon: 1e-12,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    /// Minimum number of points to fit a line.
    pub min_points_linear: usize,
    /// Minimum number of points to fit an exponential.
    pub min_points_exp: usize,
    /// Minimum number of points to run LOOCV.
    pub min_points_cv: usize,
    /// AIC improvement the exponential model must reach.
    pub aic_margin: f64,
    /// Maximum ratio between exponential and linear LOOCV RMSE.
    pub rmse_ratio: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_points_linear: 2,
            min_points_exp: 3,
            min_points_cv: 5,
            aic_margin: 4.0,
            rmse_ratio: 0.98,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded. Missing sections and fields take
    /// their default values. Performs validation on all parameters before
    /// returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let agg = &self.aggregation;
        check_num(agg.epsilon, 0.0..1.0).context("invalid negative tolerance")?;

        let sel = &self.selection;
        check_num(sel.min_points_linear, 2..).context("invalid linear minimum points")?;
        check_num(sel.min_points_exp, sel.min_points_linear..)
            .context("invalid exponential minimum points")?;
        check_num(sel.min_points_cv, 3..).context("invalid cross-validation minimum points")?;
        check_num(sel.aic_margin, 0.0..).context("invalid AIC margin")?;
        if !(sel.rmse_ratio > 0.0) {
            bail!("RMSE ratio must be positive, but is {}", sel.rmse_ratio);
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.aggregation.mode, AccumulationMode::Prev);
        assert_eq!(cfg.selection.min_points_cv, 5);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let contents = String::new()
            + "[aggregation]\n"
            + "mode = \"current\"\n"
            + "include_negative = false\n"
            + "\n"
            + "[selection]\n"
            + "aic_margin = 2.0\n";
        let cfg = Config::from_toml(&contents).unwrap();
        assert_eq!(cfg.aggregation.mode, AccumulationMode::Current);
        assert!(!cfg.aggregation.include_negative);
        assert_eq!(cfg.aggregation.epsilon, 1e-12);
        assert_eq!(cfg.selection.aic_margin, 2.0);
        assert_eq!(cfg.selection.rmse_ratio, 0.98);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_toml("[selection]\nmin_points_linear = 1\n").is_err());
        assert!(Config::from_toml("[selection]\nmin_points_exp = 1\n").is_err());
        assert!(Config::from_toml("[selection]\nrmse_ratio = 0.0\n").is_err());
        assert!(Config::from_toml("[aggregation]\nepsilon = -1.0\n").is_err());
        assert!(Config::from_toml("[aggregation]\nmode = \"next\"\n").is_err());
        assert!(Config::from_toml("[unknown]\nkey = 1\n").is_err());
    }
}
