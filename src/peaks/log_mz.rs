use std::cmp;
use std::fmt;

use mzpeaks::{CentroidPeak, CoordinateLike, IntensityMeasurement, KnownCharge, Mass, MZ};

use crate::utils::uncharged_mz;

/// A centroid peak re-expressed in log(m/z) space.
///
/// `log_mz` is the logarithm of the m/z with the charge carrier removed, so that
/// `log_mz + ln(|z|)` is the logarithm of the neutral mass under charge `z`. The
/// `charge` and `isotope_index` fields are zero until the peak is assigned to a
/// [`PeakGroup`](crate::peaks::PeakGroup).
#[derive(Default, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogMzPeak {
    pub mz: f64,
    pub log_mz: f64,
    pub intensity: f32,
    /// The index of the source peak in its spectrum
    pub index: u32,
    pub charge: i32,
    pub isotope_index: i32,
    /// The neutral mass implied by `charge`, or `0.0` when unassigned
    pub neutral_mass: f64,
}

impl LogMzPeak {
    /// Build a peak for a spectrum whose charges all carry the sign of `charge_sign`
    pub fn new(mz: f64, intensity: f32, index: u32, charge_sign: i32) -> Self {
        Self {
            mz,
            log_mz: uncharged_mz(mz, charge_sign).ln(),
            intensity,
            index,
            charge: 0,
            isotope_index: 0,
            neutral_mass: 0.0,
        }
    }

    /// Copy this peak, assigning it a charge and a provisional isotope index
    pub fn assign(&self, charge: i32, isotope_index: i32) -> Self {
        let mut dup = self.clone();
        dup.charge = charge;
        dup.isotope_index = isotope_index;
        dup.neutral_mass = dup.mass_for(charge);
        dup
    }

    /// The neutral mass this peak would have under charge `z`
    #[inline]
    pub fn mass_for(&self, z: i32) -> f64 {
        self.log_mz.exp() * z.abs() as f64
    }

    #[inline]
    pub fn is_assigned(&self) -> bool {
        self.charge != 0
    }

    pub fn as_centroid(&self) -> CentroidPeak {
        CentroidPeak::new(self.mz, self.intensity, self.index)
    }
}

impl fmt::Display for LogMzPeak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "LogMzPeak({}, {}, z={}, i={})",
            self.mz, self.intensity, self.charge, self.isotope_index
        )
    }
}

impl cmp::PartialOrd<LogMzPeak> for LogMzPeak {
    fn partial_cmp(&self, other: &LogMzPeak) -> Option<cmp::Ordering> {
        self.mz.partial_cmp(&other.mz)
    }
}

impl cmp::PartialEq<LogMzPeak> for LogMzPeak {
    fn eq(&self, other: &LogMzPeak) -> bool {
        if (self.mz - other.mz).abs() > 1e-3
            || (self.intensity - other.intensity).abs() > 1e-3
            || self.charge != other.charge
            || self.isotope_index != other.isotope_index
        {
            return false;
        }
        true
    }
}

impl CoordinateLike<MZ> for LogMzPeak {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl CoordinateLike<Mass> for LogMzPeak {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.neutral_mass
    }
}

impl IntensityMeasurement for LogMzPeak {
    #[inline]
    fn intensity(&self) -> f32 {
        self.intensity
    }
}

impl KnownCharge for LogMzPeak {
    #[inline]
    fn charge(&self) -> i32 {
        self.charge
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::{isclose, mass_charge_ratio};

    #[test]
    fn test_log_mz() {
        let mz = mass_charge_ratio(2000.0, 4);
        let peak = LogMzPeak::new(mz, 100.0, 0, 1);
        assert!(!peak.is_assigned());
        assert!(isclose(peak.log_mz + 4f64.ln(), 2000f64.ln(), 1e-9));

        let assigned = peak.assign(4, 1);
        assert_eq!(assigned.charge(), 4);
        assert!(isclose(
            CoordinateLike::<Mass>::coordinate(&assigned),
            2000.0,
            1e-6
        ));
        assert!(isclose(CoordinateLike::<MZ>::coordinate(&assigned), mz, 1e-12));
    }

    #[test]
    fn test_negative_mode() {
        let mz = mass_charge_ratio(2000.0, -4);
        let peak = LogMzPeak::new(mz, 100.0, 0, -1).assign(-4, 0);
        assert!(isclose(peak.neutral_mass, 2000.0, 1e-6));
    }
}
