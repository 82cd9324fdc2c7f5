//! CSV tables written and read by the analysis.

use crate::analysis::FitLine;
use crate::selection::ModelChoice;
use crate::table::parse_number;
use crate::trend::TrendSummary;
use crate::types::Series;
use anyhow::{Context, Result, bail};
use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufReader, BufWriter, Read},
    path::Path,
};

/// Table with an integer index column and one numeric column per phenotype.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub index_name: String,
    pub index: Vec<i32>,
    pub columns: Vec<(String, Series)>,
}

impl WideTable {
    /// Align per-phenotype yearly series on the union of their years.
    pub fn from_series(series_vec: &[(String, Vec<i32>, Series)]) -> Self {
        let index: Vec<i32> = series_vec
            .iter()
            .flat_map(|(_, years, _)| years.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns = series_vec
            .iter()
            .map(|(name, years, series)| {
                let mut aligned = vec![None; index.len()];
                for (year, &val) in years.iter().zip(series) {
                    if let Ok(i_row) = index.binary_search(year) {
                        aligned[i_row] = val;
                    }
                }
                (name.clone(), aligned)
            })
            .collect();

        Self {
            index_name: "Year".to_string(),
            index,
            columns,
        }
    }

    /// Each column divided by its first non-zero value, on the same index.
    pub fn fold_yearly(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, series)| {
                let folds = match first_nonzero(series) {
                    Some(base) => series.iter().map(|val| val.map(|val| val / base)).collect(),
                    None => vec![None; series.len()],
                };
                (name.clone(), folds)
            })
            .collect();

        Self {
            index_name: self.index_name.clone(),
            index: self.index.clone(),
            columns,
        }
    }

    /// Same ratios as [`WideTable::fold_yearly`] over the defined values
    /// only, re-indexed from zero per column.
    pub fn fold_relative(&self) -> Self {
        let rel_vec: Vec<(String, Vec<f64>)> = self
            .columns
            .iter()
            .map(|(name, series)| {
                let rel = match first_nonzero(series) {
                    Some(base) => series.iter().flatten().map(|val| val / base).collect(),
                    None => Vec::new(),
                };
                (name.clone(), rel)
            })
            .collect();

        let n_rows = rel_vec.iter().map(|(_, rel)| rel.len()).max().unwrap_or(0);
        let columns = rel_vec
            .into_iter()
            .map(|(name, rel)| {
                let mut padded: Series = rel.into_iter().map(Some).collect();
                padded.resize(n_rows, None);
                (name, padded)
            })
            .collect();

        Self {
            index_name: "RelYear".to_string(),
            index: (0..n_rows as i32).collect(),
            columns,
        }
    }

    pub fn write_csv<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let writer = create_writer(file)?;
        let mut writer = csv::Writer::from_writer(writer);

        let mut header = vec![self.index_name.clone()];
        header.extend(self.columns.iter().map(|(name, _)| name.clone()));
        writer.write_record(&header).context("failed to write header")?;

        for (i_row, idx) in self.index.iter().enumerate() {
            let mut record = vec![idx.to_string()];
            record.extend(
                self.columns
                    .iter()
                    .map(|(_, series)| fmt_opt(series[i_row])),
            );
            writer.write_record(&record).context("failed to write record")?;
        }

        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    pub fn read_csv<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let reader = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        Self::from_reader(BufReader::new(reader))
    }

    /// Read a wide table whose index is the `Year` column.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers().context("failed to read header")?.clone();
        let i_idx = headers
            .iter()
            .position(|name| name == "Year")
            .context("column Year not found")?;

        let names: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|&(i_col, _)| i_col != i_idx)
            .map(|(i_col, name)| (i_col, name.to_string()))
            .collect();

        let mut index = Vec::new();
        let mut columns: Vec<(String, Series)> = names
            .iter()
            .map(|(_, name)| (name.clone(), Vec::new()))
            .collect();

        for record in reader.records() {
            let record = record.context("failed to read record")?;
            let year = record.get(i_idx).unwrap_or_default();
            let year = year
                .parse::<i32>()
                .with_context(|| format!("invalid year {year:?}"))?;
            index.push(year);
            for ((i_col, _), (_, series)) in names.iter().zip(&mut columns) {
                series.push(record.get(*i_col).and_then(parse_number));
            }
        }

        if index.windows(2).any(|pair| pair[0] >= pair[1]) {
            bail!("years must be strictly increasing");
        }

        Ok(Self {
            index_name: "Year".to_string(),
            index,
            columns,
        })
    }
}

/// First defined non-zero value of a series.
pub fn first_nonzero(series: &[Option<f64>]) -> Option<f64> {
    series.iter().flatten().copied().find(|&val| val != 0.0)
}

/// Write the number of trends parsed per phenotype.
pub fn write_trends_log<P: AsRef<Path>>(file: P, counts: &[(String, usize)]) -> Result<()> {
    let file = file.as_ref();
    let mut writer = csv::Writer::from_writer(create_writer(file)?);

    writer
        .write_record(["Disease", "Trends"])
        .context("failed to write header")?;
    for (name, count) in counts {
        writer
            .write_record([name.clone(), count.to_string()])
            .context("failed to write record")?;
    }

    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// Write one model selection record per phenotype.
pub fn write_model_choices<P: AsRef<Path>>(
    file: P,
    choices: &[(String, ModelChoice)],
) -> Result<()> {
    let file = file.as_ref();
    let mut writer = csv::Writer::from_writer(create_writer(file)?);

    writer
        .write_record([
            "Disease",
            "model",
            "n_all",
            "n_pos",
            "AIC_linear",
            "AIC_exponential",
            "BIC_linear",
            "BIC_exponential",
            "RMSEcv_linear",
            "RMSEcv_exponential",
        ])
        .context("failed to write header")?;

    for (name, choice) in choices {
        writer
            .write_record([
                name.clone(),
                choice.decision.to_string(),
                choice.n_points.to_string(),
                choice.n_positive.to_string(),
                fmt_opt(choice.aic_linear),
                fmt_opt(choice.aic_exponential),
                fmt_opt(choice.bic_linear),
                fmt_opt(choice.bic_exponential),
                fmt_opt(choice.rmse_cv_linear),
                fmt_opt(choice.rmse_cv_exponential),
            ])
            .context("failed to write record")?;
    }

    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// Write the yearly trend summary of one phenotype.
///
/// The AMAV-POS column is only written when it was produced. The slope
/// p-value of the linear fit is repeated on every row.
pub fn write_summary<P: AsRef<Path>>(
    file: P,
    summary: &TrendSummary,
    linear_fit: &FitLine,
) -> Result<()> {
    let file = file.as_ref();
    let mut writer = csv::Writer::from_writer(create_writer(file)?);

    let mut header = vec!["Year", "DataPoints", "MAV", "AMAV"];
    if summary.amav_pos.is_some() {
        header.push("AMAV-POS");
    }
    header.extend(["LinearFit", "PValue"]);
    writer.write_record(&header).context("failed to write header")?;

    for (i_year, year) in summary.years.iter().enumerate() {
        let mut record = vec![
            year.to_string(),
            summary.data_points[i_year].to_string(),
            fmt_opt(summary.mav[i_year]),
            fmt_opt(summary.amav[i_year]),
        ];
        if let Some(amav_pos) = &summary.amav_pos {
            record.push(fmt_opt(amav_pos[i_year]));
        }
        record.push(fmt_opt(linear_fit.values.get(i_year).copied().flatten()));
        record.push(fmt_opt(linear_fit.p_value));
        writer.write_record(&record).context("failed to write record")?;
    }

    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// File name safe version of a phenotype name.
pub fn slugify(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '(' | ')' | '\'' | '’'))
        .map(|c| if matches!(c, '/' | '\\' | ' ') { '_' } else { c })
        .collect()
}

fn create_writer(file: &Path) -> Result<BufWriter<File>> {
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    Ok(BufWriter::new(file))
}

fn fmt_opt(val: Option<f64>) -> String {
    val.map(|val| val.to_string()).unwrap_or_default()
}
