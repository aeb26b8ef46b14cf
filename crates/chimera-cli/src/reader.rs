//! Tab-delimited adapters: normalized identification tables, per-file
//! isolation metadata, and previously written breakdown tables.

use anyhow::Context;
use chimera_core::breakdown::BreakdownRecord;
use chimera_core::classify::ClassificationCounts;
use chimera_core::mass::neutral_mass;
use chimera_core::metadata::{IsolationProvider, MetadataError, ScanIsolation, ScanTable};
use chimera_core::record::{
    normalize_file_name, parse_scan_number, IdentificationRecord, ResultLevel,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ISOLATION_EXTENSION: &str = "isolation.tsv";

fn tsv_reader<P: AsRef<Path>>(path: P) -> csv::Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
}

#[derive(Deserialize)]
struct IdentificationRow {
    filename: String,
    scannr: String,
    /// 1 for targets, -1 for decoys
    label: i32,
    peptide: String,
    proteins: String,
    score: f64,
    #[serde(default)]
    delta_mass: Option<f64>,
    precursor_mz: f64,
    charge: u8,
    #[serde(default)]
    precursor_mass: Option<f64>,
    #[serde(default)]
    q_value: Option<f64>,
    #[serde(default)]
    pep: Option<f64>,
}

impl IdentificationRow {
    fn into_record<S: AsRef<str>>(
        self,
        level: ResultLevel,
        file_suffixes: &[S],
    ) -> IdentificationRecord {
        IdentificationRecord {
            file_name: normalize_file_name(&self.filename, file_suffixes),
            scan_number: parse_scan_number(&self.scannr),
            decoy: self.label < 0,
            full_sequence: self.peptide,
            accession: self.proteins,
            score: self.score,
            mass_difference: self.delta_mass.unwrap_or_default(),
            precursor_mz: self.precursor_mz,
            precursor_charge: self.charge,
            precursor_mass: self
                .precursor_mass
                .unwrap_or_else(|| neutral_mass(self.precursor_mz, self.charge)),
            q_value: self.q_value,
            pep: self.pep,
            level,
        }
    }
}

/// Records read from one identification table
#[derive(Debug, Default)]
pub struct IdentificationTable {
    pub records: Vec<IdentificationRecord>,
    /// Rows that could not be parsed and were left out
    pub skipped: usize,
}

/// Read a normalized identification table. Every row is tagged with `level`.
/// Unparseable rows are logged and skipped, only a table that cannot be
/// opened is an error
pub fn read_identifications<P, S>(
    path: P,
    level: ResultLevel,
    file_suffixes: &[S],
) -> anyhow::Result<IdentificationTable>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let mut rdr = tsv_reader(path)
        .with_context(|| format!("Failed to open identifications `{}`", path.display()))?;

    let mut table = IdentificationTable::default();
    for (ix, row) in rdr.deserialize::<IdentificationRow>().enumerate() {
        match row {
            Ok(row) => table.records.push(row.into_record(level, file_suffixes)),
            Err(e) => {
                log::warn!(
                    "skipping row {} of `{}`: {}",
                    ix + 1,
                    path.display(),
                    e
                );
                table.skipped += 1;
            }
        }
    }
    Ok(table)
}

#[derive(Deserialize)]
struct IsolationRow {
    scannr: String,
    isolation_mz: f64,
}

/// Isolation metadata exported as one `<file>.isolation.tsv` table per
/// spectra file, all under the same directory
#[derive(Clone, Debug)]
pub struct TsvIsolation {
    directory: PathBuf,
}

impl TsvIsolation {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", file_name, ISOLATION_EXTENSION))
    }
}

#[derive(Debug, Default)]
pub struct TsvScans {
    scans: ScanTable,
}

impl ScanIsolation for TsvScans {
    fn isolation_mz(&self, scan_number: u32) -> Option<f64> {
        self.scans.get(&scan_number).copied()
    }

    fn close(&mut self) {
        self.scans = ScanTable::default();
    }
}

impl IsolationProvider for TsvIsolation {
    type Handle = TsvScans;

    fn open(&self, file_name: &str) -> Result<TsvScans, MetadataError> {
        let path = self.path(file_name);
        if !path.is_file() {
            return Err(MetadataError::Unavailable {
                file: file_name.to_string(),
            });
        }

        let unreadable = |reason: String| MetadataError::Unreadable {
            file: file_name.to_string(),
            reason,
        };
        let mut rdr = tsv_reader(&path).map_err(|e| unreadable(e.to_string()))?;

        let mut scans = ScanTable::default();
        for row in rdr.deserialize::<IsolationRow>() {
            let row = row.map_err(|e| unreadable(e.to_string()))?;
            match parse_scan_number(&row.scannr) {
                Some(scan) => {
                    scans.insert(scan, row.isolation_mz);
                }
                None => log::trace!(
                    "`{}`: skipping unresolvable scan id `{}`",
                    path.display(),
                    row.scannr
                ),
            }
        }
        Ok(TsvScans { scans })
    }
}

#[derive(Deserialize)]
struct BreakdownRow {
    dataset: String,
    filename: String,
    condition: String,
    level: ResultLevel,
    scannr: u32,
    isolation_mz: f64,
    ids_per_spectra: usize,
    targets: usize,
    decoys: usize,
    duplicate: usize,
    unique_form: usize,
    unique_protein: usize,
    missed_monoisotopic: usize,
    zero_sum_shift: usize,
    charges: String,
    masses: String,
}

fn split_list<T: std::str::FromStr>(list: &str) -> Result<Vec<T>, T::Err> {
    list.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

impl BreakdownRow {
    fn into_record(self) -> anyhow::Result<BreakdownRecord> {
        let charges = split_list(&self.charges).context("invalid `charges` list")?;
        let masses = split_list(&self.masses).context("invalid `masses` list")?;
        Ok(BreakdownRecord {
            dataset: self.dataset,
            file_name: self.filename,
            condition: self.condition,
            level: self.level,
            scan_number: self.scannr,
            isolation_mz: self.isolation_mz,
            ids_per_spectra: self.ids_per_spectra,
            targets: self.targets,
            decoys: self.decoys,
            counts: ClassificationCounts {
                duplicate: self.duplicate,
                unique_form: self.unique_form,
                unique_protein: self.unique_protein,
                missed_monoisotopic: self.missed_monoisotopic,
                zero_sum_shift: self.zero_sum_shift,
            },
            charges,
            masses,
        })
    }
}

/// Read a breakdown table written by [`crate::Runner::write_breakdown`]
pub fn read_breakdown<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<BreakdownRecord>> {
    let path = path.as_ref();
    let mut rdr = tsv_reader(path)
        .with_context(|| format!("Failed to open breakdown `{}`", path.display()))?;

    rdr.deserialize::<BreakdownRow>()
        .enumerate()
        .map(|(ix, row)| {
            row.map_err(anyhow::Error::from)
                .and_then(BreakdownRow::into_record)
                .with_context(|| {
                    format!("Failed to parse row {} of `{}`", ix + 1, path.display())
                })
        })
        .collect()
}
