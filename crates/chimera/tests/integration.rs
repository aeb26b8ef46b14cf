use chimera_core::aggregate::{aggregate, aggregate_percent, SplitBy};
use chimera_core::breakdown::{self, BreakdownRecord, Provenance};
use chimera_core::classify::RelativeClassifier;
use chimera_core::grouping::group;
use chimera_core::metadata::{InMemoryIsolation, ScanTable};
use chimera_core::parent::select_order;
use chimera_core::pipeline::Pipeline;
use chimera_core::record::{IdentificationRecord, ResultLevel};

fn psm(scan: u32, seq: &str, accession: &str, mz: f64, score: f64) -> IdentificationRecord {
    IdentificationRecord {
        file_name: "Jurkat_Fraction1-calib.mzML".into(),
        scan_number: Some(scan),
        full_sequence: seq.into(),
        accession: accession.into(),
        precursor_mz: mz,
        precursor_charge: 2,
        precursor_mass: mz * 2.0,
        score,
        ..Default::default()
    }
}

fn breakdown_of(records: Vec<IdentificationRecord>, isolation_mz: Option<f64>) -> BreakdownRecord {
    let grouping = group(records, ResultLevel::Spectrum);
    assert_eq!(grouping.groups.len(), 1);
    let g = &grouping.groups[0];
    let order = select_order(g, isolation_mz);
    let counts = RelativeClassifier::default().classify(&order.targets);
    breakdown::build(g, &order, counts, &Provenance::default())
}

#[test]
fn single_target_is_its_own_parent() {
    let record = breakdown_of(vec![psm(1, "PEPTIDE", "P1", 500.0, 10.0)], None);
    assert_eq!(record.ids_per_spectra, 1);
    assert_eq!(record.targets, 1);
    assert_eq!(record.decoys, 0);
    assert_eq!(record.counts.duplicate, 0);
    assert_eq!(record.counts.unique_form, 0);
    assert_eq!(record.counts.unique_protein, 0);
    assert_eq!(record.file_name, "Jurkat_Fraction1");
}

#[test]
fn isolation_selects_parent_then_classifies_rest() {
    let records = vec![
        psm(2, "PEPTIDE[+16]", "P1", 520.0, 30.0),
        psm(2, "PEPTIDE[+16]", "P1", 600.2, 5.0),
        psm(2, "ELVISLIVES", "P2", 700.0, 20.0),
    ];
    let grouping = group(records.clone(), ResultLevel::Spectrum);
    let order = select_order(&grouping.groups[0], Some(600.0));
    assert_eq!(order.parent().map(|p| p.score), Some(5.0));

    let record = breakdown_of(records, Some(600.0));
    assert_eq!(record.targets, 3);
    assert_eq!(record.decoys, 0);
    assert_eq!(record.counts.duplicate, 1);
    assert_eq!(record.counts.unique_protein, 1);
    assert_eq!(record.counts.unique_form, 0);
    assert_eq!(record.isolation_mz, 600.0);
}

#[test]
fn decoys_are_counted_but_not_classified() {
    let mut decoy = psm(3, "EDITPEP", "DECOY_P1", 500.0, 50.0);
    decoy.decoy = true;
    let records = vec![
        decoy,
        psm(3, "PEPTIDE", "P1", 500.0, 10.0),
        psm(3, "PEPTIDER", "P1", 560.0, 40.0),
        psm(3, "SAMPLER", "P9", 610.0, 15.0),
    ];
    let grouping = group(records.clone(), ResultLevel::Spectrum);
    let order = select_order(&grouping.groups[0], None);
    assert_eq!(order.parent().map(|p| p.full_sequence.as_str()), Some("PEPTIDER"));

    let record = breakdown_of(records, None);
    assert_eq!(record.ids_per_spectra, 4);
    assert_eq!(record.targets, 3);
    assert_eq!(record.decoys, 1);
    assert_eq!(record.counts.total(), 2);
    assert_eq!(record.counts.unique_form, 1);
    assert_eq!(record.counts.unique_protein, 1);
    assert_eq!(record.isolation_mz, -1.0);
    assert_eq!(record.charges.len(), 4);
}

#[test]
fn aggregates_target_decoy_percentages() {
    let mut decoy = psm(5, "EDITPEP", "DECOY_P1", 500.0, 50.0);
    decoy.decoy = true;
    let first = breakdown_of(
        vec![
            psm(4, "PEPTIDE", "P1", 500.0, 10.0),
            psm(4, "SAMPLER", "P2", 600.0, 9.0),
        ],
        None,
    );
    let second = breakdown_of(vec![psm(5, "PEPTIDE", "P1", 500.0, 10.0), decoy], None);

    let records = vec![first, second];
    let buckets = aggregate(&records, ResultLevel::Spectrum, SplitBy::None);
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].key.ids_per_spectra, 2);
    assert_eq!(buckets[0].targets, 3);
    assert_eq!(buckets[0].decoys, 1);

    let percent = aggregate_percent(&records, ResultLevel::Spectrum, SplitBy::None);
    assert_eq!(percent[0].percent_target, 75.0);
    assert_eq!(percent[0].percent_decoy, 25.0);
}

#[test]
fn empty_aggregation_input() {
    assert!(aggregate(&[], ResultLevel::Spectrum, SplitBy::None).is_empty());
    assert!(aggregate_percent(&[], ResultLevel::Spectrum, SplitBy::None).is_empty());
}

#[test]
fn empty_accession_is_a_unique_protein() {
    let record = breakdown_of(
        vec![
            psm(6, "PEPTIDE", "P1", 500.0, 10.0),
            psm(6, "PEPTIDE", "", 500.0, 5.0),
        ],
        None,
    );
    assert_eq!(record.counts.unique_protein, 1);
    assert_eq!(record.counts.duplicate, 0);
}

#[test]
fn pipeline_end_to_end() {
    let mut provider = InMemoryIsolation::default();
    let mut scans = ScanTable::default();
    scans.insert(2, 600.0);
    provider.insert("Jurkat_Fraction1", scans);

    let mut records = vec![
        psm(1, "PEPTIDE", "P1", 500.0, 10.0),
        psm(2, "PEPTIDE[+16]", "P1", 520.0, 30.0),
        psm(2, "PEPTIDE[+16]", "P1", 600.2, 5.0),
        psm(2, "ELVISLIVES", "P2", 700.0, 20.0),
    ];
    let mut peptide = psm(2, "PEPTIDE[+16]", "P1", 600.2, 5.0);
    peptide.level = ResultLevel::SequenceGroup;
    records.push(peptide);

    let output = Pipeline::default().run(records, ResultLevel::Spectrum, &provider);
    assert_eq!(output.records.len(), 2);
    assert!(output.fallback_files.is_empty());
    assert_eq!(output.malformed.len(), 1);

    for record in &output.records {
        assert_eq!(record.targets + record.decoys, record.ids_per_spectra);
        assert_eq!(record.counts.total(), record.targets.saturating_sub(1));
    }

    let buckets = aggregate(&output.records, ResultLevel::Spectrum, SplitBy::None);
    let ids = buckets
        .iter()
        .map(|b| b.key.ids_per_spectra)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 3]);
}
