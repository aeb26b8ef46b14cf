use crate::breakdown::{self, BreakdownRecord, Provenance};
use crate::classify::RelativeClassifier;
use crate::grouping::{ChimeraGroup, Grouper, MalformedRecord};
use crate::metadata::{IsolationProvider, OpenScans};
use crate::parent::select_order;
use crate::record::{IdentificationRecord, ResultLevel};
use fnv::FnvHashMap;
use itertools::Itertools;
use log::info;
use rayon::prelude::*;
use std::time::Instant;

#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    pub grouper: Grouper,
    pub classifier: RelativeClassifier,
    pub provenance: Provenance,
}

#[derive(Debug, Default)]
pub struct PipelineOutput {
    /// Sorted by file name, then scan number
    pub records: Vec<BreakdownRecord>,
    pub malformed: Vec<MalformedRecord>,
    /// Files processed with the score based tie-break, because their
    /// acquisition metadata could not be opened
    pub fallback_files: Vec<String>,
}

impl PipelineOutput {
    pub fn chimeric(&self) -> usize {
        self.records.iter().filter(|r| r.is_chimeric()).count()
    }
}

struct FileOutput {
    records: Vec<BreakdownRecord>,
    fallback: Option<String>,
}

impl Pipeline {
    pub fn new(grouper: Grouper, classifier: RelativeClassifier, provenance: Provenance) -> Self {
        Self {
            grouper,
            classifier,
            provenance,
        }
    }

    fn process_group(&self, group: &ChimeraGroup, isolation_mz: Option<f64>) -> BreakdownRecord {
        let order = select_order(group, isolation_mz);
        let counts = self.classifier.classify(&order.targets);
        breakdown::build(group, &order, counts, &self.provenance)
    }

    fn process_file<P: IsolationProvider>(
        &self,
        file_name: &str,
        groups: &[ChimeraGroup],
        provider: &P,
    ) -> FileOutput {
        match OpenScans::open(provider, file_name) {
            Ok(scans) => {
                let records = groups
                    .par_iter()
                    .map(|group| {
                        let isolation_mz = scans.isolation_mz(group.key.scan_number);
                        self.process_group(group, isolation_mz)
                    })
                    .collect();
                FileOutput {
                    records,
                    fallback: None,
                }
            }
            Err(e) => {
                log::warn!("{}; parents are selected by score", e);
                let records = groups
                    .par_iter()
                    .map(|group| self.process_group(group, None))
                    .collect();
                FileOutput {
                    records,
                    fallback: Some(file_name.to_string()),
                }
            }
        }
    }

    /// Group, order, classify and summarize all `records` of a single result
    /// level. Spectra files are processed concurrently, each holding at most
    /// one open metadata connection
    pub fn run<P: IsolationProvider>(
        &self,
        records: Vec<IdentificationRecord>,
        level: ResultLevel,
        provider: &P,
    ) -> PipelineOutput {
        let start = Instant::now();
        let grouping = self.grouper.group(records, level);
        for malformed in &grouping.malformed {
            log::warn!("skipping malformed {} record: {}", level, malformed);
        }

        let mut files: FnvHashMap<String, Vec<ChimeraGroup>> = FnvHashMap::default();
        for group in grouping.groups {
            files
                .entry(group.key.file_name.clone())
                .or_default()
                .push(group);
        }

        let outputs = files
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(file_name, groups)| self.process_file(&file_name, &groups, provider))
            .collect::<Vec<_>>();

        let mut output = PipelineOutput {
            malformed: grouping.malformed,
            ..Default::default()
        };
        for file in outputs {
            output.records.extend(file.records);
            output.fallback_files.extend(file.fallback);
        }

        info!(
            "- {} level: {} spectra, {} chimeric, in {}ms",
            level,
            output.records.len(),
            output.chimeric(),
            start.elapsed().as_millis()
        );
        output
    }
}
