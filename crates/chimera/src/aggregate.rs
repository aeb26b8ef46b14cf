//! Reduction of breakdown records into count tables keyed by the number of
//! identifications per spectrum.
//!
//! Buckets come out sorted by series (dataset/condition, when split) and then
//! ascending by `ids_per_spectra`, which is the x-axis order of the charts
//! consuming them. Buckets without any identification are never emitted.

use crate::breakdown::BreakdownRecord;
use crate::classify::ClassificationCounts;
use crate::record::ResultLevel;
use fnv::FnvHashMap;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Which provenance labels split the buckets into separate series
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitBy {
    #[default]
    None,
    Condition,
    Dataset,
    DatasetCondition,
}

impl std::str::FromStr for SplitBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SplitBy::None),
            "condition" => Ok(SplitBy::Condition),
            "dataset" => Ok(SplitBy::Dataset),
            "dataset_condition" => Ok(SplitBy::DatasetCondition),
            other => Err(format!("unknown series split `{}`", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BucketKey {
    pub dataset: Option<String>,
    pub condition: Option<String>,
    pub level: ResultLevel,
    pub ids_per_spectra: usize,
}

impl BucketKey {
    fn new(record: &BreakdownRecord, split: SplitBy) -> Self {
        let (dataset, condition) = match split {
            SplitBy::None => (None, None),
            SplitBy::Condition => (None, Some(record.condition.clone())),
            SplitBy::Dataset => (Some(record.dataset.clone()), None),
            SplitBy::DatasetCondition => {
                (Some(record.dataset.clone()), Some(record.condition.clone()))
            }
        };
        Self {
            dataset,
            condition,
            level: record.level,
            ids_per_spectra: record.ids_per_spectra,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatedBucket {
    pub key: BucketKey,
    /// Number of spectra folded into this bucket
    pub spectra: usize,
    pub targets: usize,
    pub decoys: usize,
    pub counts: ClassificationCounts,
}

impl AggregatedBucket {
    fn from_record(record: &BreakdownRecord, split: SplitBy) -> Self {
        Self {
            key: BucketKey::new(record, split),
            spectra: 1,
            targets: record.targets,
            decoys: record.decoys,
            counts: record.counts,
        }
    }

    fn merge(&mut self, other: &AggregatedBucket) {
        self.spectra += other.spectra;
        self.targets += other.targets;
        self.decoys += other.decoys;
        self.counts += other.counts;
    }

    pub fn total(&self) -> usize {
        self.targets + self.decoys
    }

    pub fn percent_decoy(&self) -> f64 {
        round_percent(self.decoys, self.total())
    }
}

/// Percentages of a single bucket, rounded to two decimals
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PercentBucket {
    pub key: BucketKey,
    pub percent_target: f64,
    pub percent_decoy: f64,
    /// Sibling classes, as a share of all classified siblings in the bucket
    pub percent_duplicate: f64,
    pub percent_unique_form: f64,
    pub percent_unique_protein: f64,
    pub percent_missed_monoisotopic: f64,
    pub percent_zero_sum_shift: f64,
}

impl PercentBucket {
    fn from_bucket(bucket: &AggregatedBucket) -> Option<Self> {
        let total = bucket.total();
        if total == 0 {
            return None;
        }
        let target = hundredths(bucket.targets, total);
        let siblings = bucket.counts.total();
        let counts = &bucket.counts;
        Some(Self {
            key: bucket.key.clone(),
            percent_target: target as f64 / 100.0,
            percent_decoy: (10_000 - target) as f64 / 100.0,
            percent_duplicate: round_percent(counts.duplicate, siblings),
            percent_unique_form: round_percent(counts.unique_form, siblings),
            percent_unique_protein: round_percent(counts.unique_protein, siblings),
            percent_missed_monoisotopic: round_percent(counts.missed_monoisotopic, siblings),
            percent_zero_sum_shift: round_percent(counts.zero_sum_shift, siblings),
        })
    }
}

/// `part / total` in hundredths of a percent, halves rounded up.
/// Integer arithmetic keeps exact midpoints such as 23/160 from drifting
fn hundredths(part: usize, total: usize) -> u64 {
    match total {
        0 => 0,
        _ => {
            let (part, total) = (part as u128, total as u128);
            ((part * 20_000 + total) / (total * 2)) as u64
        }
    }
}

/// `part / total` as a percentage rounded to two decimal places, halves away
/// from zero. Zero when `total` is zero
pub fn round_percent(part: usize, total: usize) -> f64 {
    hundredths(part, total) as f64 / 100.0
}

/// Merges buckets by key. Suitable for streaming: per-thread accumulators are
/// folded independently and combined at the end
#[derive(Default, Debug)]
pub struct BreakdownAccumulator {
    buckets: FnvHashMap<BucketKey, AggregatedBucket>,
}

impl BreakdownAccumulator {
    pub fn fold_op(mut self, rhs: AggregatedBucket) -> Self {
        self.insert(rhs);
        self
    }

    pub fn reduce(mut self, other: Self) -> Self {
        for bucket in other.buckets.into_values() {
            self.insert(bucket);
        }
        self
    }

    fn insert(&mut self, bucket: AggregatedBucket) {
        match self.buckets.get_mut(&bucket.key) {
            Some(existing) => existing.merge(&bucket),
            None => {
                self.buckets.insert(bucket.key.clone(), bucket);
            }
        }
    }

    pub fn add(&mut self, record: &BreakdownRecord, split: SplitBy) {
        self.insert(AggregatedBucket::from_record(record, split));
    }

    /// Finished buckets, sorted by key, without empty buckets
    pub fn into_buckets(self) -> Vec<AggregatedBucket> {
        self.buckets
            .into_values()
            .filter(|bucket| bucket.total() > 0)
            .sorted_by(|a, b| a.key.cmp(&b.key))
            .collect()
    }
}

impl FromParallelIterator<AggregatedBucket> for BreakdownAccumulator {
    fn from_par_iter<I>(par_iter: I) -> Self
    where
        I: IntoParallelIterator<Item = AggregatedBucket>,
    {
        par_iter
            .into_par_iter()
            .fold(BreakdownAccumulator::default, BreakdownAccumulator::fold_op)
            .reduce(BreakdownAccumulator::default, BreakdownAccumulator::reduce)
    }
}

impl FromIterator<AggregatedBucket> for BreakdownAccumulator {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = AggregatedBucket>,
    {
        iter.into_iter()
            .fold(BreakdownAccumulator::default(), BreakdownAccumulator::fold_op)
    }
}

/// Sum breakdown records of `level` into buckets of equal `ids_per_spectra`
pub fn aggregate(
    records: &[BreakdownRecord],
    level: ResultLevel,
    split: SplitBy,
) -> Vec<AggregatedBucket> {
    if records.is_empty() {
        log::trace!("no breakdown records to aggregate at {} level", level);
        return Vec::new();
    }
    records
        .par_iter()
        .filter(|record| record.level == level)
        .map(|record| AggregatedBucket::from_record(record, split))
        .collect::<BreakdownAccumulator>()
        .into_buckets()
}

/// Same buckets as [`aggregate`], expressed as percentages
pub fn aggregate_percent(
    records: &[BreakdownRecord],
    level: ResultLevel,
    split: SplitBy,
) -> Vec<PercentBucket> {
    aggregate(records, level, split)
        .iter()
        .filter_map(PercentBucket::from_bucket)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn record(ids: usize, targets: usize, decoys: usize, condition: &str) -> BreakdownRecord {
        let siblings = targets.saturating_sub(1);
        BreakdownRecord {
            dataset: "dataset".into(),
            file_name: "run1".into(),
            condition: condition.into(),
            level: ResultLevel::Spectrum,
            scan_number: 1,
            isolation_mz: -1.0,
            ids_per_spectra: ids,
            targets,
            decoys,
            counts: ClassificationCounts {
                duplicate: siblings / 2,
                unique_protein: siblings - siblings / 2,
                ..Default::default()
            },
            charges: vec![2; ids],
            masses: vec![1000.0; ids],
        }
    }

    #[test]
    fn split_names() {
        assert_eq!("condition".parse::<SplitBy>(), Ok(SplitBy::Condition));
        assert_eq!(
            "Dataset_Condition".parse::<SplitBy>(),
            Ok(SplitBy::DatasetCondition)
        );
        assert!("file".parse::<SplitBy>().is_err());
    }

    #[test]
    fn target_decoy_percentages() {
        let records = vec![record(2, 2, 0, "a"), record(2, 1, 1, "a")];
        let buckets = aggregate(&records, ResultLevel::Spectrum, SplitBy::None);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].key.ids_per_spectra, 2);
        assert_eq!(buckets[0].spectra, 2);
        assert_eq!(buckets[0].targets, 3);
        assert_eq!(buckets[0].decoys, 1);
        assert_eq!(buckets[0].percent_decoy(), 25.0);

        let percent = aggregate_percent(&records, ResultLevel::Spectrum, SplitBy::None);
        assert_eq!(percent[0].percent_target, 75.0);
        assert_eq!(percent[0].percent_decoy, 25.0);
        // One unique protein sibling from the first record, none from the second
        assert_eq!(percent[0].percent_unique_protein, 100.0);
        assert_eq!(percent[0].percent_duplicate, 0.0);
    }

    #[test]
    fn empty_input() {
        assert!(aggregate(&[], ResultLevel::Spectrum, SplitBy::None).is_empty());
        assert!(aggregate_percent(&[], ResultLevel::SequenceGroup, SplitBy::Condition).is_empty());
    }

    #[test]
    fn other_levels_are_ignored() {
        let records = vec![record(1, 1, 0, "a")];
        assert!(aggregate(&records, ResultLevel::SequenceGroup, SplitBy::None).is_empty());
    }

    #[test]
    fn buckets_sorted_by_series_then_ids() {
        let records = vec![
            record(3, 3, 0, "b"),
            record(1, 1, 0, "b"),
            record(2, 2, 0, "a"),
            record(1, 0, 1, "a"),
            record(3, 2, 1, "a"),
        ];
        let buckets = aggregate(&records, ResultLevel::Spectrum, SplitBy::Condition);
        let keys = buckets
            .iter()
            .map(|b| (b.key.condition.clone().unwrap(), b.key.ids_per_spectra))
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), 1),
                ("a".to_string(), 2),
                ("a".to_string(), 3),
                ("b".to_string(), 1),
                ("b".to_string(), 3),
            ]
        );

        let merged = aggregate(&records, ResultLevel::Spectrum, SplitBy::None);
        assert_eq!(
            merged.iter().map(|b| b.key.ids_per_spectra).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(merged[2].targets, 5);
        assert_eq!(merged[2].decoys, 1);
    }

    #[test]
    fn zero_total_buckets_are_dropped() {
        let records = vec![record(0, 0, 0, "a"), record(1, 1, 0, "a")];
        let buckets = aggregate(&records, ResultLevel::Spectrum, SplitBy::None);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].key.ids_per_spectra, 1);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_percent(1, 3), 33.33);
        assert_eq!(round_percent(2, 3), 66.67);
        assert_eq!(round_percent(1, 8), 12.5);
        assert_eq!(round_percent(3, 3), 100.0);
        assert_eq!(round_percent(0, 0), 0.0);
    }

    #[test]
    fn exact_midpoints_round_up() {
        // 14.375 and 25.625 are not representable, scaling them as floats
        // lands below the midpoint
        assert_eq!(round_percent(23, 160), 14.38);
        assert_eq!(round_percent(41, 160), 25.63);
        assert_eq!(round_percent(1, 16), 6.25);
        assert_eq!(round_percent(1, 1600), 0.06);

        let records = (0..160)
            .map(|ix| record(1, (ix < 23) as usize, (ix >= 23) as usize, "a"))
            .collect::<Vec<_>>();
        let percent = aggregate_percent(&records, ResultLevel::Spectrum, SplitBy::None);
        assert_eq!(percent[0].percent_target, 14.38);
        assert_eq!(percent[0].percent_decoy, 85.62);
    }

    #[test]
    fn sequential_and_parallel_accumulation_agree() {
        let records = (1..50)
            .map(|i| record(i % 5 + 1, i % 5 + 1 - i % 2, i % 2, "a"))
            .collect::<Vec<_>>();
        let mut sequential = BreakdownAccumulator::default();
        for r in &records {
            sequential.add(r, SplitBy::None);
        }
        assert_eq!(
            sequential.into_buckets(),
            aggregate(&records, ResultLevel::Spectrum, SplitBy::None)
        );
    }

    fn arbitrary_records(input: &[(u8, u8)]) -> Vec<BreakdownRecord> {
        input
            .iter()
            .map(|(targets, decoys)| {
                let (targets, decoys) = ((targets % 6) as usize, (decoys % 3) as usize);
                let condition = if targets % 2 == 0 { "even" } else { "odd" };
                record(targets + decoys, targets, decoys, condition)
            })
            .collect()
    }

    #[quickcheck]
    fn aggregation_preserves_totals(input: Vec<(u8, u8)>) -> bool {
        let records = arbitrary_records(&input);
        let buckets = aggregate(&records, ResultLevel::Spectrum, SplitBy::Condition);
        let targets = records.iter().map(|r| r.targets).sum::<usize>();
        let decoys = records.iter().map(|r| r.decoys).sum::<usize>();
        let siblings = records.iter().map(|r| r.counts.total()).sum::<usize>();
        buckets.iter().map(|b| b.targets).sum::<usize>() == targets
            && buckets.iter().map(|b| b.decoys).sum::<usize>() == decoys
            && buckets.iter().map(|b| b.counts.total()).sum::<usize>() == siblings
    }

    #[quickcheck]
    fn percentages_add_up(input: Vec<(u8, u8)>) -> bool {
        let records = arbitrary_records(&input);
        aggregate_percent(&records, ResultLevel::Spectrum, SplitBy::None)
            .iter()
            .all(|b| (b.percent_target + b.percent_decoy - 100.0).abs() <= 0.01)
    }

    #[quickcheck]
    fn buckets_strictly_ascending(input: Vec<(u8, u8)>) -> bool {
        let records = arbitrary_records(&input);
        aggregate(&records, ResultLevel::Spectrum, SplitBy::None)
            .iter()
            .tuple_windows()
            .all(|(a, b)| a.key.ids_per_spectra < b.key.ids_per_spectra)
    }
}
