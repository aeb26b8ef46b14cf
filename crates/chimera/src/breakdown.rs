use crate::classify::ClassificationCounts;
use crate::grouping::ChimeraGroup;
use crate::parent::ParentOrder;
use crate::record::ResultLevel;
use serde::{Deserialize, Serialize};

/// Reported in place of the isolation m/z when acquisition metadata is missing
pub const UNKNOWN_ISOLATION_MZ: f64 = -1.0;

/// Caller supplied labels, attached verbatim to every breakdown record
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub dataset: String,
    pub condition: String,
}

/// Per-spectrum summary of a chimeric group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRecord {
    pub dataset: String,
    pub file_name: String,
    pub condition: String,
    pub level: ResultLevel,
    pub scan_number: u32,
    /// `-1` if unknown
    pub isolation_mz: f64,
    pub ids_per_spectra: usize,
    pub targets: usize,
    pub decoys: usize,
    pub counts: ClassificationCounts,
    /// Precursor charge of every member, targets and decoys, in group order
    pub charges: Vec<u8>,
    /// Precursor mass of every member, targets and decoys, in group order
    pub masses: Vec<f64>,
}

impl BreakdownRecord {
    pub fn isolation_mz(&self) -> Option<f64> {
        (self.isolation_mz >= 0.0).then_some(self.isolation_mz)
    }

    pub fn is_chimeric(&self) -> bool {
        self.ids_per_spectra > 1
    }
}

pub fn build(
    group: &ChimeraGroup,
    order: &ParentOrder<'_>,
    counts: ClassificationCounts,
    provenance: &Provenance,
) -> BreakdownRecord {
    let targets = group.target_count();
    let decoys = group.decoy_count();
    debug_assert_eq!(targets + decoys, group.size());
    debug_assert_eq!(counts.total(), targets.saturating_sub(1));

    BreakdownRecord {
        dataset: provenance.dataset.clone(),
        file_name: group.key.file_name.clone(),
        condition: provenance.condition.clone(),
        level: group.level,
        scan_number: group.key.scan_number,
        isolation_mz: order.reported_isolation_mz(),
        ids_per_spectra: group.size(),
        targets,
        decoys,
        counts,
        charges: group.members.iter().map(|m| m.precursor_charge).collect(),
        masses: group.members.iter().map(|m| m.precursor_mass).collect(),
    }
}
