use anyhow::{ensure, Context};
use chimera_core::aggregate::SplitBy;
use chimera_core::classify::Refinements;
use chimera_core::mass::Tolerance;
use chimera_core::record::{AcceptanceFilter, ResultLevel, DEFAULT_FILE_SUFFIXES};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A normalized identification table, and the result level of its rows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentificationSource {
    pub path: String,
    pub level: ResultLevel,
}

#[derive(Serialize)]
/// Actual run settings - may include overrides or default values not set by user
pub struct Settings {
    pub version: String,
    pub dataset: String,
    pub condition: String,
    pub identifications: Vec<IdentificationSource>,
    pub isolation_directory: Option<String>,
    pub filter: AcceptanceFilter,
    pub file_suffixes: Vec<String>,
    pub refinements: Refinements,
    pub split_by: SplitBy,
    pub reuse_cache: bool,
    pub output_paths: Vec<String>,

    #[serde(skip_serializing)]
    pub output_directory: PathBuf,
}

#[derive(Deserialize, Default)]
/// Input run parameters deserialized from JSON file
pub struct Input {
    dataset: Option<String>,
    condition: Option<String>,
    identifications: Option<Vec<IdentificationSource>>,
    isolation_directory: Option<String>,
    output_directory: Option<String>,
    filter: Option<AcceptanceFilter>,
    file_suffixes: Option<Vec<String>>,
    refinements: Option<Refinements>,
    split_by: Option<SplitBy>,
    reuse_cache: Option<bool>,
}

impl Input {
    pub fn from_arguments(matches: ArgMatches) -> anyhow::Result<Self> {
        let path = matches
            .get_one::<String>("parameters")
            .context("`parameters` must be set. For more information try '--help'")?;
        let mut input = Input::load(path)
            .with_context(|| format!("Failed to read parameters from `{path}`"))?;

        // Handle JSON configuration overrides
        if let Some(output_directory) = matches.get_one::<String>("output_directory") {
            log::trace!("overriding `output_directory` parameter.");
            input.output_directory = Some(output_directory.into());
        }
        if let Some(isolation_directory) = matches.get_one::<String>("isolation_directory") {
            log::trace!("overriding `isolation_directory` parameter.");
            input.isolation_directory = Some(isolation_directory.into());
        }
        if let Some(split_by) = matches.get_one::<String>("split-by") {
            log::trace!("overriding `split_by` parameter.");
            input.split_by = Some(split_by.parse().map_err(anyhow::Error::msg)?);
        }
        if matches.get_flag("reuse-cache") {
            input.reuse_cache = Some(true);
        }

        ensure!(
            input
                .identifications
                .as_ref()
                .map_or(false, |ids| !ids.is_empty()),
            "`identifications` must list at least one file. For more information try '--help'"
        );

        Ok(input)
    }

    pub fn load<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let input = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(input)
    }

    fn check_tolerance(name: &str, tolerance: &Tolerance) {
        if tolerance.is_skewed() {
            match tolerance {
                Tolerance::Ppm(lo, hi) | Tolerance::Da(lo, hi) => log::warn!(
                    "`{}` tolerance window is not centered on the evaluated candidate: [{} - {}]",
                    name,
                    lo,
                    hi
                ),
            }
        }
    }

    fn check_threshold(name: &str, threshold: Option<f64>) {
        if let Some(value) = threshold {
            if !(0.0..=1.0).contains(&value) {
                log::warn!("`filter.{}` = {} is outside of [0, 1]", name, value);
            }
        }
    }

    pub fn build(self) -> anyhow::Result<Settings> {
        let refinements = self.refinements.unwrap_or_default();
        if let Some(shift) = &refinements.zero_sum_shift {
            Self::check_tolerance("zero_sum_shift.mass", &shift.mass);
            Self::check_tolerance("zero_sum_shift.mz", &shift.mz);
        }
        if let Some(mono) = &refinements.missed_monoisotopic {
            Self::check_tolerance("missed_monoisotopic.tolerance", &mono.tolerance);
            if mono.max_missed == 0 {
                log::warn!("`missed_monoisotopic.max_missed` is 0, no candidate will match");
            }
        }

        let filter = self.filter.unwrap_or_default();
        Self::check_threshold("max_q_value", filter.max_q_value);
        Self::check_threshold("max_pep", filter.max_pep);

        let identifications = self.identifications.unwrap_or_default();
        ensure!(
            !identifications.is_empty(),
            "`identifications` must list at least one file"
        );

        let output_directory = match self.output_directory {
            Some(path) => PathBuf::from(path),
            None => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&output_directory).with_context(|| {
            format!(
                "Failed to create output directory `{}`",
                output_directory.display()
            )
        })?;

        Ok(Settings {
            version: clap::crate_version!().into(),
            dataset: self.dataset.unwrap_or_default(),
            condition: self.condition.unwrap_or_default(),
            identifications,
            isolation_directory: self.isolation_directory,
            filter,
            file_suffixes: self.file_suffixes.unwrap_or_else(|| {
                DEFAULT_FILE_SUFFIXES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            refinements,
            split_by: self.split_by.unwrap_or_default(),
            reuse_cache: self.reuse_cache.unwrap_or(false),
            output_paths: Vec::new(),
            output_directory,
        })
    }
}
