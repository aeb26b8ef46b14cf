//! Classification of the non-parent targets of a chimeric group, relative to
//! the parent and to the siblings classified before them

use crate::mass::{Tolerance, NEUTRON};
use crate::record::IdentificationRecord;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Same full sequence as the parent
    Duplicate,
    /// Same protein as the parent, different sequence or modification state
    UniqueForm,
    /// Different protein than the parent
    UniqueProtein,
    /// Different sequence at the same precursor mass and m/z as an already
    /// evaluated sibling
    ZeroSumShift,
    /// Same precursor as an already evaluated sibling, offset by one or
    /// more neutron masses
    MissedMonoisotopic,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub duplicate: usize,
    pub unique_form: usize,
    pub unique_protein: usize,
    pub missed_monoisotopic: usize,
    pub zero_sum_shift: usize,
}

impl ClassificationCounts {
    pub fn add(&mut self, classification: Classification) {
        match classification {
            Classification::Duplicate => self.duplicate += 1,
            Classification::UniqueForm => self.unique_form += 1,
            Classification::UniqueProtein => self.unique_protein += 1,
            Classification::ZeroSumShift => self.zero_sum_shift += 1,
            Classification::MissedMonoisotopic => self.missed_monoisotopic += 1,
        }
    }

    /// Number of classified siblings
    pub fn total(&self) -> usize {
        self.duplicate
            + self.unique_form
            + self.unique_protein
            + self.missed_monoisotopic
            + self.zero_sum_shift
    }
}

impl AddAssign for ClassificationCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.duplicate += rhs.duplicate;
        self.unique_form += rhs.unique_form;
        self.unique_protein += rhs.unique_protein;
        self.missed_monoisotopic += rhs.missed_monoisotopic;
        self.zero_sum_shift += rhs.zero_sum_shift;
    }
}

impl FromIterator<Classification> for ClassificationCounts {
    fn from_iter<I: IntoIterator<Item = Classification>>(iter: I) -> Self {
        let mut counts = Self::default();
        for classification in iter {
            counts.add(classification);
        }
        counts
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZeroSumShift {
    /// Precursor mass window, centered on the evaluated candidate
    pub mass: Tolerance,
    /// Precursor m/z window, centered on the evaluated candidate
    pub mz: Tolerance,
}

impl Default for ZeroSumShift {
    fn default() -> Self {
        Self {
            mass: Tolerance::Ppm(-10.0, 10.0),
            mz: Tolerance::Ppm(-10.0, 10.0),
        }
    }
}

impl ZeroSumShift {
    fn matches(&self, evaluated: &IdentificationRecord, candidate: &IdentificationRecord) -> bool {
        self.mass
            .contains(evaluated.precursor_mass, candidate.precursor_mass)
            && self
                .mz
                .contains(evaluated.precursor_mz, candidate.precursor_mz)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissedMonoisotopic {
    /// Mass window applied after correcting for the neutron offset
    pub tolerance: Tolerance,
    /// Largest number of missed isotope peaks considered
    pub max_missed: u8,
}

impl Default for MissedMonoisotopic {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::Ppm(-10.0, 10.0),
            max_missed: 3,
        }
    }
}

impl MissedMonoisotopic {
    /// Both candidates must share a charge state, so a neutron offset in
    /// mass is also a consistent `n * NEUTRON / z` offset in m/z
    fn matches(&self, evaluated: &IdentificationRecord, candidate: &IdentificationRecord) -> bool {
        if evaluated.precursor_charge != candidate.precursor_charge {
            return false;
        }
        (1..=self.max_missed).any(|n| {
            let offset = n as f64 * NEUTRON;
            self.tolerance
                .contains(evaluated.precursor_mass + offset, candidate.precursor_mass)
                || self
                    .tolerance
                    .contains(evaluated.precursor_mass - offset, candidate.precursor_mass)
        })
    }
}

/// Optional classes that need precursor mass accuracy; leaving both unset
/// restricts classification to duplicate / unique form / unique protein
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Refinements {
    pub zero_sum_shift: Option<ZeroSumShift>,
    pub missed_monoisotopic: Option<MissedMonoisotopic>,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct RelativeClassifier {
    pub refinements: Refinements,
}

impl RelativeClassifier {
    pub fn new(refinements: Refinements) -> Self {
        Self { refinements }
    }

    /// Classify every target after the first (the parent) in `ordered`. The
    /// input order is used as is.
    pub fn classify_each(&self, ordered: &[&IdentificationRecord]) -> Vec<Classification> {
        let (parent, siblings) = match ordered.split_first() {
            Some((&parent, siblings)) => (parent, siblings),
            None => return Vec::new(),
        };

        // Refinements only look back at siblings, never at the parent
        let mut evaluated: Vec<&IdentificationRecord> = Vec::with_capacity(siblings.len());

        let mut classes = Vec::with_capacity(siblings.len());
        for &candidate in siblings {
            classes.push(self.relate(parent, &evaluated, candidate));
            evaluated.push(candidate);
        }
        classes
    }

    pub fn classify(&self, ordered: &[&IdentificationRecord]) -> ClassificationCounts {
        self.classify_each(ordered).into_iter().collect()
    }

    fn relate(
        &self,
        parent: &IdentificationRecord,
        evaluated: &[&IdentificationRecord],
        candidate: &IdentificationRecord,
    ) -> Classification {
        if let Some(field) = candidate
            .missing_identity()
            .or_else(|| parent.missing_identity())
        {
            log::warn!(
                "ambiguous identity in `{}` scan {}: missing {}, counted as a unique protein",
                candidate.file_name,
                candidate.scan_number.unwrap_or_default(),
                field
            );
            return Classification::UniqueProtein;
        }

        if candidate.full_sequence == parent.full_sequence {
            return Classification::Duplicate;
        }

        if let Some(shift) = &self.refinements.zero_sum_shift {
            if evaluated.iter().any(|e| shift.matches(e, candidate)) {
                return Classification::ZeroSumShift;
            }
        }

        if let Some(mono) = &self.refinements.missed_monoisotopic {
            if evaluated.iter().any(|e| mono.matches(e, candidate)) {
                return Classification::MissedMonoisotopic;
            }
        }

        if candidate.same_protein(parent) {
            Classification::UniqueForm
        } else {
            Classification::UniqueProtein
        }
    }
}
