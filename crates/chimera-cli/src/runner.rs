use super::input::Settings;
use super::output::BREAKDOWN_FILE;
use super::reader::{self, TsvIsolation};
use anyhow::Context;
use chimera_core::aggregate::{aggregate, aggregate_percent};
use chimera_core::breakdown::{BreakdownRecord, Provenance};
use chimera_core::classify::RelativeClassifier;
use chimera_core::grouping::Grouper;
use chimera_core::metadata::{IsolationProvider, NoIsolation};
use chimera_core::pipeline::Pipeline;
use chimera_core::record::{IdentificationRecord, ResultLevel};
use fnv::FnvHashMap;
use itertools::Itertools;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

pub struct Runner {
    pub settings: Settings,
    start: Instant,
}

impl Runner {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            start: Instant::now(),
        }
    }

    pub(crate) fn make_path<S: AsRef<str>>(&self, file_name: S) -> PathBuf {
        self.settings.output_directory.join(file_name.as_ref())
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Grouper::new(self.settings.file_suffixes.clone()),
            RelativeClassifier::new(self.settings.refinements),
            Provenance {
                dataset: self.settings.dataset.clone(),
                condition: self.settings.condition.clone(),
            },
        )
    }

    /// Read every identification table, apply the acceptance filter, and
    /// gather the accepted records by result level
    fn read_identifications(
        &self,
    ) -> anyhow::Result<Vec<(ResultLevel, Vec<IdentificationRecord>)>> {
        let mut levels: FnvHashMap<ResultLevel, Vec<IdentificationRecord>> =
            FnvHashMap::default();
        for source in &self.settings.identifications {
            let table = reader::read_identifications(
                &source.path,
                source.level,
                &self.settings.file_suffixes,
            )?;
            let total = table.records.len();
            let accepted = table
                .records
                .into_iter()
                .filter(|record| self.settings.filter.accepts(record))
                .collect::<Vec<_>>();
            info!(
                "- read {} {} records from `{}`, {} unparseable rows skipped, {} rejected by the acceptance filter",
                total,
                source.level,
                source.path,
                table.skipped,
                total - accepted.len()
            );
            levels.entry(source.level).or_default().extend(accepted);
        }
        Ok(levels
            .into_iter()
            .sorted_by_key(|(level, _)| *level)
            .collect())
    }

    fn classify<P>(&self, provider: &P) -> anyhow::Result<Vec<BreakdownRecord>>
    where
        P: IsolationProvider,
    {
        let pipeline = self.pipeline();
        let mut breakdown = Vec::new();
        for (level, records) in self.read_identifications()? {
            let output = pipeline.run(records, level, provider);
            if !output.malformed.is_empty() {
                log::warn!(
                    "{} malformed {} records were skipped",
                    output.malformed.len(),
                    level
                );
            }
            if !output.fallback_files.is_empty() {
                log::warn!(
                    "parents of {} file(s) were selected by score: {}",
                    output.fallback_files.len(),
                    output.fallback_files.join(", ")
                );
            }
            breakdown.extend(output.records);
        }
        Ok(breakdown)
    }

    /// Breakdown records of this run, either reloaded from a previous run or
    /// classified from scratch and written to the output directory
    pub fn breakdown(&mut self) -> anyhow::Result<Vec<BreakdownRecord>> {
        let path = self.make_path(BREAKDOWN_FILE);
        if self.settings.reuse_cache && path.is_file() {
            let records = reader::read_breakdown(&path).with_context(|| {
                format!("Failed to reuse cached breakdown `{}`", path.display())
            })?;
            info!(
                "reused {} cached breakdown records from `{}`",
                records.len(),
                path.display()
            );
            self.settings.output_paths.push(path.display().to_string());
            return Ok(records);
        }

        let records = match &self.settings.isolation_directory {
            Some(directory) => self.classify(&TsvIsolation::new(directory))?,
            None => {
                log::warn!("no `isolation_directory` set, parents are selected by score");
                self.classify(&NoIsolation)?
            }
        };
        let path = self.write_breakdown(&records)?;
        self.settings.output_paths.push(path);
        Ok(records)
    }

    pub fn run(mut self) -> anyhow::Result<Settings> {
        let records = self.breakdown()?;

        let levels = records
            .iter()
            .map(|record| record.level)
            .sorted()
            .dedup()
            .collect::<Vec<_>>();

        let counts = levels
            .iter()
            .flat_map(|&level| aggregate(&records, level, self.settings.split_by))
            .collect::<Vec<_>>();
        let percent = levels
            .iter()
            .flat_map(|&level| aggregate_percent(&records, level, self.settings.split_by))
            .collect::<Vec<_>>();

        let path = self.write_counts(&counts)?;
        self.settings.output_paths.push(path);
        let path = self.write_percent(&percent)?;
        self.settings.output_paths.push(path);

        for level in &levels {
            let (spectra, chimeric, isolated) = records
                .iter()
                .filter(|record| record.level == *level)
                .fold((0, 0, 0), |(spectra, chimeric, isolated), record| {
                    (
                        spectra + 1,
                        chimeric + record.is_chimeric() as usize,
                        isolated + record.isolation_mz().is_some() as usize,
                    )
                });
            info!(
                "- {} level: {} spectra, {} chimeric, {} with a known isolation m/z",
                level, spectra, chimeric, isolated
            );
        }

        let path = self.make_path("results.json");
        self.settings.output_paths.push(path.display().to_string());
        println!("{}", serde_json::to_string_pretty(&self.settings)?);

        let bytes = serde_json::to_vec_pretty(&self.settings)?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write `{}`", path.display()))?;

        let run_time = (Instant::now() - self.start).as_millis();
        info!("finished in {}ms", run_time);

        Ok(self.settings)
    }
}
