use serde::{Deserialize, Serialize};

pub const PROTON: f64 = 1.0072764;
pub const NEUTRON: f64 = 1.00335;

#[derive(Copy, Clone, Serialize, Deserialize, Debug, PartialEq, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum Tolerance {
    Ppm(f64, f64),
    Da(f64, f64),
}

impl Tolerance {
    /// Compute the (`lower`, `upper`) window (in Da or Th) around `center`
    pub fn bounds(&self, center: f64) -> (f64, f64) {
        match self {
            Tolerance::Ppm(lo, hi) => {
                let delta_lo = center * lo / 1_000_000.0;
                let delta_hi = center * hi / 1_000_000.0;
                (center + delta_lo, center + delta_hi)
            }
            Tolerance::Da(lo, hi) => (center + lo, center + hi),
        }
    }

    pub fn contains(&self, center: f64, rhs: f64) -> bool {
        let (lo, hi) = self.bounds(center);
        rhs >= lo && rhs <= hi
    }

    /// Is the upper bound wider than the lower bound? Tolerances are applied
    /// to the value under test, so this is usually a configuration mistake
    pub fn is_skewed(&self) -> bool {
        match self {
            Tolerance::Ppm(lo, hi) | Tolerance::Da(lo, hi) => hi.abs() > lo.abs() || lo > hi,
        }
    }
}

/// Neutral monoisotopic mass of an ion observed at `mz` with charge `charge`
pub fn neutral_mass(mz: f64, charge: u8) -> f64 {
    let z = charge.max(1) as f64;
    mz * z - z * PROTON
}

#[cfg(test)]
mod test {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn tolerances() {
        assert!(close(
            Tolerance::Ppm(-10.0, 20.0).bounds(1000.0),
            (999.99, 1000.02)
        ));
        assert!(close(
            Tolerance::Ppm(-50.0, 50.0).bounds(1000.0),
            (999.95, 1000.05)
        ));
        assert!(close(Tolerance::Da(-0.5, 0.5).bounds(500.0), (499.5, 500.5)));
        assert!(Tolerance::Da(-0.02, 0.02).contains(500.0, 500.01));
        assert!(!Tolerance::Da(-0.02, 0.02).contains(500.0, 500.03));
    }

    #[test]
    fn skewed() {
        assert!(!Tolerance::Ppm(-10.0, 10.0).is_skewed());
        assert!(Tolerance::Ppm(-5.0, 10.0).is_skewed());
        assert!(Tolerance::Da(0.5, -0.5).is_skewed());
    }

    #[test]
    fn neutral() {
        let mass = neutral_mass(501.0072764, 2);
        assert!((mass - 1000.0).abs() < 1e-6);
        // Charge 0 is treated as singly charged
        assert!((neutral_mass(101.0072764, 0) - 100.0).abs() < 1e-6);
    }
}
