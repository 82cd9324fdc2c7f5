use crate::config::{AggregationConfig, SelectionConfig};
use crate::export::WideTable;
use crate::selection::{ModelChoice, select_model};
use crate::slopes::derive_study_slopes;
use crate::stats::{LinearFit, compute_mean};
use crate::table::PhenotypeTable;
use crate::trend::{TrendSummary, aggregate_trend};
use crate::types::{Series, count_defined};

/// Minimum number of years with data to summarize a phenotype.
const MIN_SUMMARY_YEARS: usize = 3;

/// Minimum number of points to draw the linear fit of a summary.
const MIN_FIT_POINTS: usize = 3;

/// Run slopes and aggregation for one phenotype.
///
/// Returns `None` if no trend of the phenotype has any value.
pub fn analyze_phenotype(table: &PhenotypeTable, cfg: &AggregationConfig) -> Option<TrendSummary> {
    if !table.has_data() {
        return None;
    }
    let slopes = derive_study_slopes(&table.years, &table.observations());
    Some(aggregate_trend(&slopes, cfg))
}

/// Build the chosen AMAV series of every phenotype with data.
///
/// Each entry holds the phenotype, its year axis and the series.
pub fn build_series(
    tables: &[PhenotypeTable],
    cfg: &AggregationConfig,
) -> Vec<(String, Vec<i32>, Series)> {
    let mut series_vec = Vec::with_capacity(tables.len());
    for table in tables {
        let Some(summary) = analyze_phenotype(table, cfg) else {
            log::debug!("skipped {:?}: no values", table.phenotype);
            continue;
        };
        log::debug!(
            "built {:?}: {} trends, {} AMAV values, AMAV-POS used: {}",
            table.phenotype,
            table.n_trends(),
            count_defined(summary.chosen()),
            summary.uses_amav_pos()
        );
        let series = summary.chosen().clone();
        series_vec.push((table.phenotype.clone(), summary.years, series));
    }
    series_vec
}

/// Linear fit drawn over a trend series.
#[derive(Debug, Clone, PartialEq)]
pub struct FitLine {
    /// Fitted values, defined where the series is defined.
    pub values: Series,
    /// Two-sided p-value of the fitted slope.
    pub p_value: Option<f64>,
}

/// Summarize one phenotype over the years where it has data.
///
/// Returns `None` if fewer than three years have data.
pub fn summarize_phenotype(
    table: &PhenotypeTable,
    cfg: &AggregationConfig,
) -> Option<(TrendSummary, FitLine)> {
    let table = table.restrict_to_observed_years();
    if table.years.len() < MIN_SUMMARY_YEARS {
        return None;
    }
    let summary = analyze_phenotype(&table, cfg)?;
    let linear_fit = linear_fit_line(&summary.years, summary.chosen());
    Some((summary, linear_fit))
}

/// OLS line through the defined values of `series`, evaluated where the
/// series is defined.
///
/// All values are undefined with fewer than three points.
pub fn linear_fit_line(years: &[i32], series: &[Option<f64>]) -> FitLine {
    let (x, y): (Vec<f64>, Vec<f64>) = years
        .iter()
        .zip(series)
        .filter_map(|(&year, val)| val.map(|val| (year as f64, val)))
        .unzip();

    let mut line = FitLine {
        values: vec![None; series.len()],
        p_value: None,
    };
    if y.len() < MIN_FIT_POINTS {
        return line;
    }

    let x_mean = compute_mean(&x);
    let x_cen: Vec<f64> = x.iter().map(|xi| xi - x_mean).collect();
    let Some(fit) = LinearFit::fit(&x_cen, &y) else {
        return line;
    };

    for ((slot, &year), val) in line.values.iter_mut().zip(years).zip(series) {
        if val.is_some() {
            *slot = Some(fit.predict(year as f64 - x_mean));
        }
    }
    line.p_value = fit.slope_p_value();
    line
}

/// Select the model of every column of a wide AMAV table.
pub fn choose_models(table: &WideTable, cfg: &SelectionConfig) -> Vec<(String, ModelChoice)> {
    let mut choices: Vec<(String, ModelChoice)> = table
        .columns
        .iter()
        .map(|(name, series)| {
            let (years, values): (Vec<f64>, Vec<f64>) = table
                .index
                .iter()
                .zip(series)
                .filter_map(|(&year, val)| val.map(|val| (year as f64, val)))
                .unzip();
            let choice = select_model(&years, &values, cfg);
            log::debug!("{name:?}: {} with {} points", choice.decision, choice.n_points);
            (name.clone(), choice)
        })
        .collect();
    choices.sort_by(|a, b| a.0.cmp(&b.0));
    choices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Decision;

    fn phenotype(years: Vec<i32>, values: Vec<Series>) -> PhenotypeTable {
        PhenotypeTable {
            phenotype: "Asthma".to_string(),
            years,
            values,
        }
    }

    #[test]
    fn phenotype_without_values_is_skipped() {
        let table = phenotype(vec![2000, 2001], vec![vec![None, None]]);
        let cfg = AggregationConfig::default();
        assert_eq!(analyze_phenotype(&table, &cfg), None);
        assert!(build_series(&[table], &cfg).is_empty());
    }

    #[test]
    fn chosen_series_prefers_positive_limb() {
        let table = phenotype(
            (2000..=2005).collect(),
            vec![vec![
                Some(5.0),
                Some(3.0),
                Some(2.0),
                Some(4.0),
                Some(7.0),
                Some(11.0),
            ]],
        );
        let series_vec = build_series(&[table], &AggregationConfig::default());
        assert_eq!(series_vec.len(), 1);

        let (name, years, series) = &series_vec[0];
        assert_eq!(name, "Asthma");
        assert_eq!(years.len(), 6);
        // MAV: - -2 -1 2 3 4; AMAV: - - -2 -3 -1 2; valley at 2003.
        assert_eq!(series, &vec![None, None, None, None, Some(2.0), Some(5.0)]);
    }

    #[test]
    fn summary_restricts_axis() {
        let table = phenotype(
            vec![2000, 2001, 2002, 2003, 2004],
            vec![
                vec![Some(1.0), None, Some(2.0), None, Some(3.0)],
                vec![None, None, Some(1.0), None, Some(1.5)],
            ],
        );
        let (summary, fit) = summarize_phenotype(&table, &AggregationConfig::default()).unwrap();
        assert_eq!(summary.years, vec![2000, 2002, 2004]);
        assert_eq!(summary.data_points, vec![0, 1, 2]);
        assert!(fit.values.iter().all(Option::is_none));
        assert_eq!(fit.p_value, None);

        let sparse = phenotype(vec![2000, 2001, 2002], vec![vec![Some(1.0), None, Some(2.0)]]);
        assert_eq!(summarize_phenotype(&sparse, &AggregationConfig::default()), None);
    }

    #[test]
    fn fit_line_over_defined_values() {
        let line = linear_fit_line(
            &[2000, 2001, 2002, 2003],
            &[None, Some(1.0), Some(3.0), Some(5.0)],
        );
        assert_eq!(line.values[0], None);
        for (val, exp) in line.values[1..].iter().zip([1.0, 3.0, 5.0]) {
            assert!((val.unwrap() - exp).abs() < 1e-12);
        }
        assert_eq!(line.p_value, Some(0.0));

        let short = linear_fit_line(&[2000, 2001], &[Some(1.0), Some(2.0)]);
        assert_eq!(short.values, vec![None, None]);
        assert_eq!(short.p_value, None);
    }

    #[test]
    fn fit_line_slope_p_value() {
        // Same slope test as statsmodels OLS on years 2000..=2003.
        let line = linear_fit_line(
            &[2000, 2001, 2002, 2003],
            &[Some(1.0), Some(3.0), Some(2.0), Some(4.0)],
        );
        assert!((line.p_value.unwrap() - 0.2).abs() < 1e-8);
        assert!((line.values[0].unwrap() - 1.3).abs() < 1e-12);
    }

    #[test]
    fn models_per_column_in_name_order() {
        let table = WideTable {
            index_name: "Year".to_string(),
            index: (2010..2016).collect(),
            columns: vec![
                (
                    "Gout".to_string(),
                    vec![None, None, None, None, Some(1.0), None],
                ),
                (
                    "Asthma".to_string(),
                    vec![Some(2.01), Some(2.49), Some(3.005), Some(3.495), Some(4.01), Some(4.49)],
                ),
            ],
        };
        let choices = choose_models(&table, &SelectionConfig::default());
        assert_eq!(choices[0].0, "Asthma");
        assert_eq!(choices[0].1.decision, Decision::Linear);
        assert_eq!(choices[1].0, "Gout");
        assert_eq!(choices[1].1.decision, Decision::InsufficientData);
    }
}
