use anyhow::Context;
use chimera_core::aggregate::{AggregatedBucket, BucketKey, PercentBucket};
use chimera_core::breakdown::BreakdownRecord;
use rayon::prelude::*;

use crate::Runner;

pub const BREAKDOWN_FILE: &str = "chimera_breakdown.tsv";
pub const COUNTS_FILE: &str = "chimera_counts.tsv";
pub const PERCENT_FILE: &str = "chimera_percent.tsv";

fn join_charges(charges: &[u8]) -> String {
    let mut buffer = itoa::Buffer::new();
    charges
        .iter()
        .map(|&z| buffer.format(z).to_string())
        .collect::<Vec<_>>()
        .join(";")
}

fn join_masses(masses: &[f64]) -> String {
    let mut buffer = ryu::Buffer::new();
    masses
        .iter()
        .map(|&m| buffer.format(m).to_string())
        .collect::<Vec<_>>()
        .join(";")
}

fn push_key(record: &mut csv::ByteRecord, key: &BucketKey) {
    record.push_field(key.dataset.as_deref().unwrap_or_default().as_bytes());
    record.push_field(key.condition.as_deref().unwrap_or_default().as_bytes());
    record.push_field(key.level.as_str().as_bytes());
    record.push_field(itoa::Buffer::new().format(key.ids_per_spectra).as_bytes());
}

const KEY_HEADERS: [&str; 4] = ["dataset", "condition", "level", "ids_per_spectra"];

impl Runner {
    fn write_tsv<I>(&self, file_name: &str, headers: &[&str], records: I) -> anyhow::Result<String>
    where
        I: IntoIterator<Item = csv::ByteRecord>,
    {
        let path = self.make_path(file_name);

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(vec![]);

        wtr.write_byte_record(&csv::ByteRecord::from(headers.to_vec()))?;
        for record in records {
            wtr.write_byte_record(&record)?;
        }

        wtr.flush()?;
        let bytes = wtr.into_inner()?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write `{}`", path.display()))?;
        Ok(path.display().to_string())
    }

    pub fn serialize_breakdown(&self, breakdown: &BreakdownRecord) -> csv::ByteRecord {
        let mut record = csv::ByteRecord::new();
        record.push_field(breakdown.dataset.as_bytes());
        record.push_field(breakdown.file_name.as_bytes());
        record.push_field(breakdown.condition.as_bytes());
        record.push_field(breakdown.level.as_str().as_bytes());
        record.push_field(itoa::Buffer::new().format(breakdown.scan_number).as_bytes());
        record.push_field(ryu::Buffer::new().format(breakdown.isolation_mz).as_bytes());
        record.push_field(
            itoa::Buffer::new()
                .format(breakdown.ids_per_spectra)
                .as_bytes(),
        );
        record.push_field(itoa::Buffer::new().format(breakdown.targets).as_bytes());
        record.push_field(itoa::Buffer::new().format(breakdown.decoys).as_bytes());
        record.push_field(
            itoa::Buffer::new()
                .format(breakdown.counts.duplicate)
                .as_bytes(),
        );
        record.push_field(
            itoa::Buffer::new()
                .format(breakdown.counts.unique_form)
                .as_bytes(),
        );
        record.push_field(
            itoa::Buffer::new()
                .format(breakdown.counts.unique_protein)
                .as_bytes(),
        );
        record.push_field(
            itoa::Buffer::new()
                .format(breakdown.counts.missed_monoisotopic)
                .as_bytes(),
        );
        record.push_field(
            itoa::Buffer::new()
                .format(breakdown.counts.zero_sum_shift)
                .as_bytes(),
        );
        record.push_field(join_charges(&breakdown.charges).as_bytes());
        record.push_field(join_masses(&breakdown.masses).as_bytes());
        record
    }

    pub fn write_breakdown(&self, records: &[BreakdownRecord]) -> anyhow::Result<String> {
        let headers = [
            "dataset",
            "filename",
            "condition",
            "level",
            "scannr",
            "isolation_mz",
            "ids_per_spectra",
            "targets",
            "decoys",
            "duplicate",
            "unique_form",
            "unique_protein",
            "missed_monoisotopic",
            "zero_sum_shift",
            "charges",
            "masses",
        ];
        let rows = records
            .par_iter()
            .map(|record| self.serialize_breakdown(record))
            .collect::<Vec<_>>();
        self.write_tsv(BREAKDOWN_FILE, &headers, rows)
    }

    pub fn serialize_counts(&self, bucket: &AggregatedBucket) -> csv::ByteRecord {
        let mut record = csv::ByteRecord::new();
        push_key(&mut record, &bucket.key);
        record.push_field(itoa::Buffer::new().format(bucket.spectra).as_bytes());
        record.push_field(itoa::Buffer::new().format(bucket.targets).as_bytes());
        record.push_field(itoa::Buffer::new().format(bucket.decoys).as_bytes());
        record.push_field(itoa::Buffer::new().format(bucket.counts.duplicate).as_bytes());
        record.push_field(
            itoa::Buffer::new()
                .format(bucket.counts.unique_form)
                .as_bytes(),
        );
        record.push_field(
            itoa::Buffer::new()
                .format(bucket.counts.unique_protein)
                .as_bytes(),
        );
        record.push_field(
            itoa::Buffer::new()
                .format(bucket.counts.missed_monoisotopic)
                .as_bytes(),
        );
        record.push_field(
            itoa::Buffer::new()
                .format(bucket.counts.zero_sum_shift)
                .as_bytes(),
        );
        record
    }

    pub fn write_counts(&self, buckets: &[AggregatedBucket]) -> anyhow::Result<String> {
        let mut headers = KEY_HEADERS.to_vec();
        headers.extend([
            "spectra",
            "targets",
            "decoys",
            "duplicate",
            "unique_form",
            "unique_protein",
            "missed_monoisotopic",
            "zero_sum_shift",
        ]);
        let rows = buckets.iter().map(|bucket| self.serialize_counts(bucket));
        self.write_tsv(COUNTS_FILE, &headers, rows)
    }

    pub fn serialize_percent(&self, bucket: &PercentBucket) -> csv::ByteRecord {
        let mut record = csv::ByteRecord::new();
        push_key(&mut record, &bucket.key);
        for value in [
            bucket.percent_target,
            bucket.percent_decoy,
            bucket.percent_duplicate,
            bucket.percent_unique_form,
            bucket.percent_unique_protein,
            bucket.percent_missed_monoisotopic,
            bucket.percent_zero_sum_shift,
        ] {
            record.push_field(ryu::Buffer::new().format(value).as_bytes());
        }
        record
    }

    pub fn write_percent(&self, buckets: &[PercentBucket]) -> anyhow::Result<String> {
        let mut headers = KEY_HEADERS.to_vec();
        headers.extend([
            "percent_target",
            "percent_decoy",
            "percent_duplicate",
            "percent_unique_form",
            "percent_unique_protein",
            "percent_missed_monoisotopic",
            "percent_zero_sum_shift",
        ]);
        let rows = buckets.iter().map(|bucket| self.serialize_percent(bucket));
        self.write_tsv(PERCENT_FILE, &headers, rows)
    }
}
