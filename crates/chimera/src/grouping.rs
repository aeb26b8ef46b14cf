use crate::record::{normalize_file_name, IdentificationRecord, ResultLevel, DEFAULT_FILE_SUFFIXES};
use fnv::FnvHashMap;
use itertools::Itertools;

/// Identifies the acquisition event (MS2 scan) that a candidate came from
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpectrumKey {
    pub file_name: String,
    pub scan_number: u32,
}

/// All accepted candidates of a single spectrum, at a single result level.
/// Members keep input order; parent selection decides the final order
#[derive(Clone, Debug)]
pub struct ChimeraGroup {
    pub key: SpectrumKey,
    pub level: ResultLevel,
    pub members: Vec<IdentificationRecord>,
}

impl ChimeraGroup {
    /// Degree of chimericity, 1 for a non-chimeric spectrum
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn targets(&self) -> impl Iterator<Item = &IdentificationRecord> {
        self.members.iter().filter(|r| !r.decoy)
    }

    pub fn target_count(&self) -> usize {
        self.targets().count()
    }

    pub fn decoy_count(&self) -> usize {
        self.members.iter().filter(|r| r.decoy).count()
    }
}

/// A record that could not be assigned to a spectrum
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedRecord {
    /// Position of the record in the input sequence
    pub index: usize,
    pub file_name: String,
    pub reason: &'static str,
}

impl std::fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "record #{} (file `{}`): {}",
            self.index, self.file_name, self.reason
        )
    }
}

#[derive(Debug, Default)]
pub struct Grouping {
    /// Sorted by spectrum key
    pub groups: Vec<ChimeraGroup>,
    pub malformed: Vec<MalformedRecord>,
}

#[derive(Clone, Debug)]
pub struct Grouper {
    pub file_suffixes: Vec<String>,
}

impl Default for Grouper {
    fn default() -> Self {
        Self {
            file_suffixes: DEFAULT_FILE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Grouper {
    pub fn new(file_suffixes: Vec<String>) -> Self {
        Self { file_suffixes }
    }

    fn key(&self, record: &IdentificationRecord) -> Result<SpectrumKey, &'static str> {
        let file_name = normalize_file_name(&record.file_name, &self.file_suffixes);
        if file_name.is_empty() {
            return Err("missing file name");
        }
        let scan_number = record.scan_number.ok_or("unresolvable scan number")?;
        Ok(SpectrumKey {
            file_name,
            scan_number,
        })
    }

    /// Partition `records` into one group per spectrum. Every record ends up
    /// in exactly one group, or in [`Grouping::malformed`]
    pub fn group<I>(&self, records: I, level: ResultLevel) -> Grouping
    where
        I: IntoIterator<Item = IdentificationRecord>,
    {
        let mut map: FnvHashMap<SpectrumKey, Vec<IdentificationRecord>> = FnvHashMap::default();
        let mut malformed = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            if record.level != level {
                malformed.push(MalformedRecord {
                    index,
                    file_name: record.file_name,
                    reason: "result level does not match the requested level",
                });
                continue;
            }
            match self.key(&record) {
                Ok(key) => map.entry(key).or_default().push(record),
                Err(reason) => malformed.push(MalformedRecord {
                    index,
                    file_name: record.file_name,
                    reason,
                }),
            }
        }

        let groups = map
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .map(|(key, members)| ChimeraGroup {
                key,
                level,
                members,
            })
            .collect();

        Grouping { groups, malformed }
    }
}

/// Group records using the default file name suffixes
pub fn group<I>(records: I, level: ResultLevel) -> Grouping
where
    I: IntoIterator<Item = IdentificationRecord>,
{
    Grouper::default().group(records, level)
}
