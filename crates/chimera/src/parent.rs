//! Parent selection within a chimeric group.
//!
//! When the isolation m/z of the MS2 scan is known, the candidate whose
//! precursor m/z sits closest to it is the parent, ties broken by score.
//! Otherwise the highest scoring candidate is the parent, ties broken by the
//! smallest absolute mass error. The same policy applies to every candidate of
//! a spectrum; the two are never mixed within a group.

use crate::breakdown::UNKNOWN_ISOLATION_MZ;
use crate::grouping::ChimeraGroup;
use crate::record::IdentificationRecord;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TieBreak {
    IsolationProximity,
    Score,
}

/// Targets of a group, parent first
#[derive(Clone, Debug)]
pub struct ParentOrder<'a> {
    pub targets: Vec<&'a IdentificationRecord>,
    pub isolation_mz: Option<f64>,
    pub tie_break: TieBreak,
}

impl<'a> ParentOrder<'a> {
    pub fn parent(&self) -> Option<&'a IdentificationRecord> {
        self.targets.first().copied()
    }

    pub fn siblings(&self) -> &[&'a IdentificationRecord] {
        self.targets.get(1..).unwrap_or_default()
    }

    /// Isolation m/z as reported on breakdown records, `-1` if unknown
    pub fn reported_isolation_mz(&self) -> f64 {
        self.isolation_mz.unwrap_or(UNKNOWN_ISOLATION_MZ)
    }
}

// Identical scores and distances fall through to the identity of the
// candidate, so that the order never depends on input order
fn identity(a: &IdentificationRecord, b: &IdentificationRecord) -> Ordering {
    a.full_sequence
        .cmp(&b.full_sequence)
        .then_with(|| a.accession.cmp(&b.accession))
        .then_with(|| a.precursor_charge.cmp(&b.precursor_charge))
}

fn by_isolation(
    isolation_mz: f64,
) -> impl Fn(&&IdentificationRecord, &&IdentificationRecord) -> Ordering {
    move |a: &&IdentificationRecord, b: &&IdentificationRecord| {
        let da = (a.precursor_mz - isolation_mz).abs();
        let db = (b.precursor_mz - isolation_mz).abs();
        da.total_cmp(&db)
            .then_with(|| b.score.total_cmp(&a.score))
            .then_with(|| identity(a, b))
    }
}

fn by_score(a: &&IdentificationRecord, b: &&IdentificationRecord) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.mass_difference.abs().total_cmp(&b.mass_difference.abs()))
        .then_with(|| identity(a, b))
}

/// Order the targets of `group` and designate the first one as parent.
/// Decoys are not part of the order. A negative or non-finite isolation m/z is
/// treated as unknown
pub fn select_order(group: &ChimeraGroup, isolation_mz: Option<f64>) -> ParentOrder<'_> {
    let isolation_mz = isolation_mz.filter(|mz| mz.is_finite() && *mz >= 0.0);
    let mut targets = group.targets().collect::<Vec<_>>();

    let tie_break = match isolation_mz {
        Some(mz) => {
            targets.sort_by(by_isolation(mz));
            TieBreak::IsolationProximity
        }
        None => {
            targets.sort_by(by_score);
            TieBreak::Score
        }
    };

    ParentOrder {
        targets,
        isolation_mz,
        tie_break,
    }
}
