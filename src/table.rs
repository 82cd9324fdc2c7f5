//! Study table input.
//!
//! The table is a CSV file with a `Phenotype` column, year columns
//! (`1800`..=`2100`) and any number of ignored columns such as `Citation`.
//! Each data row is one prevalence trend (study) of a phenotype.

use crate::types::{Observation, Series};
use anyhow::{Context, Result, bail};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

const PHENOTYPE_COLUMN: &str = "phenotype";
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1800..=2100;

/// Study table of all phenotypes.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyTable {
    /// Sorted year axis.
    pub years: Vec<i32>,
    pub rows: Vec<StudyRow>,
}

/// Single trend of the study table, aligned to [`StudyTable::years`].
#[derive(Debug, Clone, PartialEq)]
pub struct StudyRow {
    pub phenotype: String,
    pub values: Series,
}

/// Trends of a single phenotype (`studies x years`).
#[derive(Debug, Clone, PartialEq)]
pub struct PhenotypeTable {
    pub phenotype: String,
    pub years: Vec<i32>,
    pub values: Vec<Series>,
}

impl StudyTable {
    /// Load a [`StudyTable`] from a CSV file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, has no phenotype
    /// column, no year columns or no data rows.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers().context("failed to read header")?.clone();

        let i_phe = headers
            .iter()
            .position(|name| name.eq_ignore_ascii_case(PHENOTYPE_COLUMN))
            .context("cannot find Phenotype column in header")?;

        let mut year_cols = BTreeMap::new();
        for (i_col, name) in headers.iter().enumerate() {
            let Some(year) = parse_year(name) else {
                continue;
            };
            if year_cols.insert(year, i_col).is_some() {
                bail!("year column {year} appears more than once");
            }
        }
        if year_cols.is_empty() {
            bail!("no year-like columns found in the table");
        }

        let mut n_records = 0;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context("failed to read record")?;
            n_records += 1;

            let phenotype = record.get(i_phe).unwrap_or_default().trim();
            // Skip unnamed rows and repeated header rows.
            if phenotype.is_empty() || phenotype.eq_ignore_ascii_case(PHENOTYPE_COLUMN) {
                continue;
            }

            let values = year_cols
                .values()
                .map(|&i_col| record.get(i_col).and_then(parse_number))
                .collect();
            rows.push(StudyRow {
                phenotype: phenotype.to_string(),
                values,
            });
        }
        if n_records == 0 {
            bail!("input table is empty");
        }

        Ok(Self {
            years: year_cols.into_keys().collect(),
            rows,
        })
    }

    /// Group rows by phenotype, in phenotype order.
    pub fn group_by_phenotype(&self) -> Vec<PhenotypeTable> {
        let mut groups: BTreeMap<&str, Vec<Series>> = BTreeMap::new();
        for row in &self.rows {
            groups
                .entry(&row.phenotype)
                .or_default()
                .push(row.values.clone());
        }
        groups
            .into_iter()
            .map(|(phenotype, values)| PhenotypeTable {
                phenotype: phenotype.to_string(),
                years: self.years.clone(),
                values,
            })
            .collect()
    }
}

impl PhenotypeTable {
    pub fn n_trends(&self) -> usize {
        self.values.len()
    }

    /// Whether any trend has at least one value.
    pub fn has_data(&self) -> bool {
        self.values.iter().flatten().any(Option::is_some)
    }

    /// Observed `(year, value)` pairs of each trend.
    pub fn observations(&self) -> Vec<Vec<Observation>> {
        self.values
            .iter()
            .map(|series| {
                self.years
                    .iter()
                    .zip(series)
                    .filter_map(|(&year, val)| val.map(|val| Observation::new(year, val)))
                    .collect()
            })
            .collect()
    }

    /// Copy of the table keeping only years where some trend has a value.
    pub fn restrict_to_observed_years(&self) -> PhenotypeTable {
        let keep: Vec<usize> = (0..self.years.len())
            .filter(|&i_year| {
                self.values
                    .iter()
                    .any(|series| series.get(i_year).copied().flatten().is_some())
            })
            .collect();

        PhenotypeTable {
            phenotype: self.phenotype.clone(),
            years: keep.iter().map(|&i_year| self.years[i_year]).collect(),
            values: self
                .values
                .iter()
                .map(|series| keep.iter().map(|&i_year| series[i_year]).collect())
                .collect(),
        }
    }
}

fn parse_year(name: &str) -> Option<i32> {
    let name = name.trim();
    if name.len() != 4 || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok().filter(|year| YEAR_RANGE.contains(year))
}

/// Parse a numeric cell written with locale conventions.
///
/// Accepts percentages (`12.5%` is `0.125`), decimal commas and thousands
/// separators (`'`, or `.`/`,` when repeated or followed by the other
/// separator). Returns `None` for empty or unparsable cells.
pub fn parse_number(cell: &str) -> Option<f64> {
    let mut cell: String = cell
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '\'' | '’'))
        .collect();
    if cell.is_empty() {
        return None;
    }

    let mut divisor = 1.0;
    if let Some(rest) = cell.strip_suffix('%') {
        cell = rest.to_string();
        divisor = 100.0;
    }

    let n_dot = cell.matches('.').count();
    let n_comma = cell.matches(',').count();
    let cell = match (n_dot, n_comma) {
        (0, 0) | (1, 0) => cell,
        (0, 1) => cell.replace(',', "."),
        (_, 0) => cell.replace('.', ""),
        (0, _) => cell.replace(',', ""),
        _ => {
            // Both separators: the last one is the decimal point.
            let i_dec = cell.rfind(['.', ','])?;
            let (dec, thousands) = if cell[i_dec..].starts_with('.') {
                ('.', ',')
            } else {
                (',', '.')
            };
            if cell.matches(dec).count() > 1 {
                return None;
            }
            cell.replace(thousands, "").replace(dec, ".")
        }
    };

    cell.parse::<f64>()
        .ok()
        .filter(|val| val.is_finite())
        .map(|val| val / divisor)
}
