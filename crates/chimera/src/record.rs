//! Normalized view of a single accepted candidate identification.
//!
//! Every search engine reports its matches in a different shape; adapters
//! outside of this crate flatten those into [`IdentificationRecord`]s, which
//! carry only the fields that grouping and classification look at.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Acquisition-pipeline suffixes appended to spectra file names by
/// calibration and averaging steps
pub const DEFAULT_FILE_SUFFIXES: [&str; 2] = ["-calib", "-averaged"];

/// Spectra file extensions removed during file name normalization
const SPECTRA_EXTENSIONS: [&str; 6] = ["gz", "mzml", "mzxml", "mgf", "raw", "d"];

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResultLevel {
    /// Identifications at the spectrum level (PSMs, PrSMs)
    #[default]
    Spectrum,
    /// Identifications deduplicated by sequence (peptides, proteoforms)
    SequenceGroup,
}

impl ResultLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultLevel::Spectrum => "spectrum",
            ResultLevel::SequenceGroup => "sequence_group",
        }
    }
}

impl std::fmt::Display for ResultLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spectrum" | "psm" | "prsm" => Ok(ResultLevel::Spectrum),
            "sequence_group" | "peptide" | "proteoform" => Ok(ResultLevel::SequenceGroup),
            other => Err(format!("unknown result level `{}`", other)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentificationRecord {
    /// Originating spectra file, normalized
    pub file_name: String,
    /// MS2 scan number, `None` if the adapter could not resolve it
    pub scan_number: Option<u32>,
    pub decoy: bool,
    /// Sequence including localized modifications
    pub full_sequence: String,
    /// Protein accession, or a `|`/`;` delimited protein group
    pub accession: String,
    pub score: f64,
    /// Signed difference between experimental and theoretical mass
    pub mass_difference: f64,
    pub precursor_mz: f64,
    pub precursor_charge: u8,
    pub precursor_mass: f64,
    pub q_value: Option<f64>,
    pub pep: Option<f64>,
    pub level: ResultLevel,
}

impl IdentificationRecord {
    /// Sorted, deduplicated protein accessions of this record
    pub fn accessions(&self) -> Vec<&str> {
        self.accession
            .split(|c: char| c == '|' || c == ';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .sorted()
            .dedup()
            .collect()
    }

    /// Do both records map to the same protein (group)?
    pub fn same_protein(&self, other: &IdentificationRecord) -> bool {
        let lhs = self.accessions();
        !lhs.is_empty() && lhs == other.accessions()
    }

    /// Name of the identity field that is missing, if any
    pub fn missing_identity(&self) -> Option<&'static str> {
        if self.full_sequence.trim().is_empty() {
            Some("full sequence")
        } else if self.accessions().is_empty() {
            Some("accession")
        } else {
            None
        }
    }
}

/// Strip directories, spectra file extensions and acquisition-pipeline
/// suffixes from a spectra file name, so that `run1-calib-averaged.mzML`
/// and `/data/run1.raw` both become `run1`
pub fn normalize_file_name<S: AsRef<str>>(name: &str, suffixes: &[S]) -> String {
    let mut name = name
        .trim()
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    while let Some((stem, ext)) = name.rsplit_once('.') {
        if SPECTRA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            name = stem;
        } else {
            break;
        }
    }

    'strip: loop {
        for suffix in suffixes {
            let suffix = suffix.as_ref();
            if suffix.is_empty() {
                continue;
            }
            if let Some(stem) = name.strip_suffix(suffix) {
                name = stem;
                continue 'strip;
            }
        }
        break;
    }
    name.to_string()
}

/// Resolve a scan number from either a bare integer, or a native spectrum id
/// such as `controllerType=0 controllerNumber=1 scan=1234`
pub fn parse_scan_number(id: &str) -> Option<u32> {
    let id = id.trim();
    if let Ok(scan) = id.parse::<u32>() {
        return Some(scan);
    }
    id.split_whitespace()
        .find_map(|token| token.strip_prefix("scan="))
        .and_then(|scan| scan.parse().ok())
}

/// Statistical acceptance thresholds applied before grouping
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceFilter {
    pub max_q_value: Option<f64>,
    pub max_pep: Option<f64>,
}

impl Default for AcceptanceFilter {
    fn default() -> Self {
        Self {
            max_q_value: Some(0.01),
            max_pep: None,
        }
    }
}

impl AcceptanceFilter {
    /// Records without a q-value or PEP were already filtered upstream and
    /// are accepted
    pub fn accepts(&self, record: &IdentificationRecord) -> bool {
        let q = match (self.max_q_value, record.q_value) {
            (Some(max), Some(q)) => q <= max,
            _ => true,
        };
        let pep = match (self.max_pep, record.pep) {
            (Some(max), Some(pep)) => pep <= max,
            _ => true,
        };
        q && pep
    }
}
