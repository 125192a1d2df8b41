//! Charge and harmonic pattern filters.
//!
//! In log space, dividing a mass by a charge is a subtraction, so the mass bin that
//! charge hypothesis `j` implies for an m/z bin is that bin plus a constant offset.
//! [`PatternFilters`] holds the charge-dependent log terms, independent of any
//! spectrum, and [`BinOffsets`] turns them into integer offsets for one pair of
//! m/z and mass bin spaces.
use ndarray::Array2;

use crate::binning::BinSpace;
use crate::params::DeconvolutionParams;

/// Per-charge log-domain filter values
#[derive(Debug, Clone, PartialEq)]
pub struct PatternFilters {
    /// `-ln(|z|)` for each charge hypothesis
    pub universal: Vec<f64>,
    /// `-ln(|z_h|)` for each harmonic ratio (rows) and charge hypothesis (columns)
    pub harmonic: Array2<f64>,
    pub harmonic_charges: Vec<i32>,
    pub charges: Vec<i32>,
}

/// The log of the apparent charge of a harmonic artifact of charge `abs_charge`
/// with ratio `h`
fn harmonic_log_charge(abs_charge: i32, h: i32) -> f64 {
    let n = (h / 2) as f64;
    let h = h as f64;
    let z = abs_charge as f64;
    // A unit charge has no lower harmonic, mirror it upwards instead
    let zh = if abs_charge == 1 { z + n / h } else { z - n / h };
    zh.ln()
}

impl PatternFilters {
    pub fn new(params: &DeconvolutionParams) -> Self {
        let charges: Vec<i32> = (0..params.charge_span())
            .map(|j| params.charge_of(j))
            .collect();
        let harmonic_charges = params.usable_harmonics();

        let universal: Vec<f64> = charges.iter().map(|z| -(z.abs() as f64).ln()).collect();
        let harmonic = Array2::from_shape_fn((harmonic_charges.len(), charges.len()), |(k, j)| {
            -harmonic_log_charge(charges[j].abs(), harmonic_charges[k])
        });

        Self {
            universal,
            harmonic,
            harmonic_charges,
            charges,
        }
    }

    /// The number of charge hypotheses
    #[inline]
    pub fn len(&self) -> usize {
        self.universal.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.universal.is_empty()
    }

    #[inline]
    pub fn harmonic_count(&self) -> usize {
        self.harmonic_charges.len()
    }

    /// Convert the filters into integer bin offsets from `mz_space` into `mass_space`.
    /// Both spaces must share the same density.
    pub fn bin_offsets(&self, mz_space: &BinSpace, mass_space: &BinSpace) -> BinOffsets {
        let density = mz_space.density;
        let delta = mz_space.min_value - mass_space.min_value;
        let to_offset = |filter: f64| ((delta - filter) * density).round() as i64;
        BinOffsets {
            universal: self.universal.iter().copied().map(to_offset).collect(),
            harmonic: self.harmonic.mapv(to_offset),
        }
    }
}

/// Integer shifts between an m/z bin and the mass bin implied by each charge
/// hypothesis, `mass_bin = mz_bin + universal[j]`, and between a mass bin and the
/// m/z bin of its harmonic artifacts, `mz_bin = mass_bin - harmonic[[k, j]]`
#[derive(Debug, Clone, PartialEq)]
pub struct BinOffsets {
    pub universal: Vec<i64>,
    pub harmonic: Array2<i64>,
}

impl BinOffsets {
    /// The mass bin charge hypothesis `j` implies for `mz_bin`, if non-negative
    #[inline]
    pub fn mass_bin(&self, mz_bin: usize, j: usize) -> Option<usize> {
        let b = mz_bin as i64 + self.universal[j];
        (b >= 0).then_some(b as usize)
    }

    /// The m/z bin that charge hypothesis `j` maps onto `mass_bin`, if non-negative
    #[inline]
    pub fn mz_bin(&self, mass_bin: usize, j: usize) -> Option<usize> {
        let b = mass_bin as i64 - self.universal[j];
        (b >= 0).then_some(b as usize)
    }

    /// The m/z bin of harmonic `k` of charge hypothesis `j` at `mass_bin`, shifted
    /// by `t` bins
    #[inline]
    pub fn harmonic_mz_bin(&self, mass_bin: usize, k: usize, j: usize, t: i64) -> Option<usize> {
        let b = mass_bin as i64 - self.harmonic[[k, j]] + t;
        (b >= 0).then_some(b as usize)
    }
}
