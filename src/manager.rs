use crate::analysis::{build_series, choose_models, summarize_phenotype};
use crate::config::Config;
use crate::export::{WideTable, slugify, write_model_choices, write_summary, write_trends_log};
use crate::table::StudyTable;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Locations searched for the study table, relative to the work dir.
const INPUT_PATTERNS: [&str; 3] = [
    "data/Supplement*_Table_1.csv",
    "analysis/data/Supplement*_Table_1.csv",
    "Supplement*_Table_1.csv",
];

pub struct Manager {
    work_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let work_dir = work_dir.as_ref().to_path_buf();

        let cfg_file = work_dir.join("config.toml");
        let cfg = if cfg_file.exists() {
            Config::from_file(&cfg_file).context("failed to construct cfg")?
        } else {
            log::info!("{cfg_file:?} not found, using default config");
            Config::default()
        };
        log::info!("{cfg:#?}");

        Ok(Self { work_dir, cfg })
    }

    /// Rebuild the AMAV, fold and trend log tables from the study table.
    pub fn build_tables(&self, input: Option<PathBuf>) -> Result<()> {
        let input = self.resolve_input(input)?;
        let table = StudyTable::from_file(&input)
            .with_context(|| format!("failed to read study table {input:?}"))?;
        log::info!("read {} trends from {input:?}", table.rows.len());

        let tables = table.group_by_phenotype();
        let series_vec = build_series(&tables, &self.cfg.aggregation);
        if series_vec.is_empty() {
            bail!("no phenotype could be parsed into an AMAV series");
        }
        log::info!(
            "built AMAV series for {} of {} phenotypes",
            series_vec.len(),
            tables.len()
        );

        let output_dir = self.create_output_dir()?;

        let amav = WideTable::from_series(&series_vec);
        amav.write_csv(output_dir.join("amav.csv"))
            .context("failed to write AMAV table")?;
        amav.fold_yearly()
            .write_csv(output_dir.join("fold_yearly.csv"))
            .context("failed to write yearly fold table")?;
        amav.fold_relative()
            .write_csv(output_dir.join("fold_relative.csv"))
            .context("failed to write relative fold table")?;

        let counts: Vec<_> = tables
            .iter()
            .map(|table| (table.phenotype.clone(), table.n_trends()))
            .collect();
        write_trends_log(output_dir.join("trends_log.csv"), &counts)
            .context("failed to write trends log")?;

        log::info!("wrote tables to {output_dir:?}");
        Ok(())
    }

    /// Choose between linear and exponential growth for every phenotype.
    pub fn select_models(&self, input: Option<PathBuf>) -> Result<()> {
        let input = input.unwrap_or_else(|| self.output_dir().join("amav.csv"));
        let amav = WideTable::read_csv(&input)
            .with_context(|| format!("failed to read AMAV table {input:?}"))?;
        log::info!("read {} phenotypes from {input:?}", amav.columns.len());

        let choices = choose_models(&amav, &self.cfg.selection);

        let output_dir = self.create_output_dir()?;
        let output = output_dir.join("model_choice.csv");
        write_model_choices(&output, &choices).context("failed to write model choices")?;

        log::info!("saved model comparison to {output:?}");
        Ok(())
    }

    /// Write the yearly trend summary of every phenotype.
    pub fn summarize(&self, input: Option<PathBuf>) -> Result<()> {
        let input = self.resolve_input(input)?;
        let table = StudyTable::from_file(&input)
            .with_context(|| format!("failed to read study table {input:?}"))?;

        let summary_dir = self.create_output_dir()?.join("summaries");
        fs::create_dir_all(&summary_dir)
            .with_context(|| format!("failed to create {summary_dir:?}"))?;

        let mut slugs: HashMap<String, String> = HashMap::new();
        for phe_table in table.group_by_phenotype() {
            let Some((summary, linear_fit)) =
                summarize_phenotype(&phe_table, &self.cfg.aggregation)
            else {
                log::debug!("skipped {:?}: too few years with data", phe_table.phenotype);
                continue;
            };

            let slug = slugify(&phe_table.phenotype);
            if let Some(other) = slugs.get(&slug) {
                bail!(
                    "summaries of {other:?} and {:?} would share the file {slug}.csv",
                    phe_table.phenotype
                );
            }

            let file = summary_dir.join(format!("{slug}.csv"));
            write_summary(&file, &summary, &linear_fit)
                .with_context(|| format!("failed to write summary of {:?}", phe_table.phenotype))?;
            slugs.insert(slug, phe_table.phenotype);
        }

        log::info!("wrote {} summaries to {summary_dir:?}", slugs.len());
        Ok(())
    }

    pub fn clean(&self) -> Result<()> {
        let output_dir = self.output_dir();
        if output_dir.exists() {
            fs::remove_dir_all(&output_dir)
                .with_context(|| format!("failed to remove {output_dir:?}"))?;
            log::info!("removed {output_dir:?}");
        }
        Ok(())
    }

    fn resolve_input(&self, input: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(input) = input {
            if !input.exists() {
                bail!("input file not found: {input:?}");
            }
            return Ok(input);
        }

        for pattern in INPUT_PATTERNS {
            let pattern = self.work_dir.join(pattern);
            let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
            let found = glob(pattern)
                .context("failed to glob input files")?
                .filter_map(Result::ok)
                .find(|p| p.is_file());
            if let Some(found) = found {
                log::info!("found input {found:?}");
                return Ok(found);
            }
        }

        bail!(
            "input file not found, expected one of {INPUT_PATTERNS:?} in {:?}",
            self.work_dir
        );
    }

    fn output_dir(&self) -> PathBuf {
        self.work_dir.join("output")
    }

    fn create_output_dir(&self) -> Result<PathBuf> {
        let output_dir = self.output_dir();
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("failed to create {output_dir:?}"))?;
        Ok(output_dir)
    }
}
