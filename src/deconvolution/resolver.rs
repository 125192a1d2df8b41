use ndarray::Array2;

use crate::binning::BinSet;

use super::filters::BinOffsets;
use super::scratch::{Scratch, NO_CHARGE};
use super::DeconvolutionError;

const MIN_ROW: usize = 0;
const MAX_ROW: usize = 1;
const MZ_ROW: usize = 2;

/// The charge hypotheses observed per mass bin, and the single hypothesis chosen
/// per m/z bin.
///
/// Row 0 and row 1 hold the smallest and largest charge hypothesis index that
/// assigned an m/z bin to each mass bin. Row 2 holds, per m/z bin, the hypothesis
/// index it was assigned under. Unset slots hold [`NO_CHARGE`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRanges {
    ranges: Array2<u16>,
}

impl Default for ChargeRanges {
    fn default() -> Self {
        Self {
            ranges: Array2::from_elem((3, 0), NO_CHARGE),
        }
    }
}

impl ChargeRanges {
    /// Allocate a matrix wide enough for `len` bins, all unset
    pub fn new(len: usize) -> Result<Self, DeconvolutionError> {
        let n = 3 * len;
        let mut buffer: Vec<u16> = Vec::new();
        buffer
            .try_reserve_exact(n)
            .map_err(DeconvolutionError::allocation("charge ranges", n))?;
        buffer.resize(n, NO_CHARGE);
        let ranges = Array2::from_shape_vec((3, len), buffer).map_err(|_| {
            DeconvolutionError::AllocationFailed {
                what: "charge ranges",
                requested: n,
            }
        })?;
        Ok(Self { ranges })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.ncols()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u16 {
        self.ranges[[row, col]]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u16) {
        self.ranges[[row, col]] = value;
    }

    fn slot(&self, row: usize, col: usize) -> Option<usize> {
        self.ranges
            .get([row, col])
            .copied()
            .filter(|v| *v != NO_CHARGE)
            .map(|v| v as usize)
    }

    /// The inclusive range of charge hypothesis indices observed for `mass_bin`
    pub fn charge_span(&self, mass_bin: usize) -> Option<(usize, usize)> {
        Some((self.slot(MIN_ROW, mass_bin)?, self.slot(MAX_ROW, mass_bin)?))
    }

    /// The charge hypothesis index `mz_bin` was assigned under, if recorded
    pub fn mz_charge(&self, mz_bin: usize) -> Option<usize> {
        self.slot(MZ_ROW, mz_bin)
    }

    fn extend(&mut self, mass_bin: usize, j: usize) {
        let j = j as u16;
        let lo = &mut self.ranges[[MIN_ROW, mass_bin]];
        if *lo == NO_CHARGE || *lo > j {
            *lo = j;
        }
        let hi = &mut self.ranges[[MAX_ROW, mass_bin]];
        if *hi == NO_CHARGE || *hi < j {
            *hi = j;
        }
    }
}

/// Assigns every occupied m/z bin to the single mass bin that explains it best
#[derive(Debug, Clone)]
pub struct ChargeResolver<'a> {
    pub offsets: &'a BinOffsets,
    pub charge_count: usize,
    pub bin_start: usize,
    pub bin_end: usize,
    /// Whether to record the winning hypothesis per m/z bin
    pub record_mz_charges: bool,
}

impl ChargeResolver<'_> {
    /// Rebuild `scratch.mass_bins` and `scratch.mass_bins_for_this_spectrum` from
    /// the winning assignments, returning the number of accepted mass bins.
    ///
    /// Only candidates of this spectrum and mass bins already in `scratch.mass_bins`
    /// (carried over from history) may win, and only if they carry intensity.
    pub fn resolve(&self, scratch: &mut Scratch, ranges: &mut ChargeRanges) -> usize {
        let mass_len = scratch.mass_intensities.len();
        let mut eligible: BinSet = scratch.candidate_mass_bins.clone();
        eligible.union_with(&scratch.mass_bins);
        scratch.mass_bins.clear();
        scratch.mass_bins_for_this_spectrum.clear();

        for mz_bin in scratch.mz_bins.iter() {
            let mut best: Option<(usize, usize, f32)> = None;
            for j in 0..self.charge_count {
                let Some(mass_bin) = self.offsets.mass_bin(mz_bin, j) else {
                    continue;
                };
                if mass_bin >= mass_len {
                    break;
                }
                if !eligible.contains(mass_bin) {
                    continue;
                }
                let intensity = scratch.mass_intensities[mass_bin];
                if intensity == 0.0 {
                    continue;
                }
                if best.map_or(true, |(_, _, b)| intensity > b) {
                    best = Some((mass_bin, j, intensity));
                }
            }

            let Some((mass_bin, j, _)) = best else {
                continue;
            };
            if mass_bin < self.bin_start || mass_bin >= self.bin_end {
                continue;
            }
            ranges.extend(mass_bin, j);
            if self.record_mz_charges {
                ranges.set(MZ_ROW, mz_bin, j as u16);
            }
            scratch.mass_bins.insert(mass_bin);
            if scratch.candidate_mass_bins.contains(mass_bin) {
                scratch.mass_bins_for_this_spectrum.insert(mass_bin);
            }
        }
        scratch.mass_bins.count()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::deconvolution::candidates::test::{prepare, sweep};
    use crate::params::DeconvolutionParams;
    use crate::utils::mass_charge_ratio;

    #[test]
    fn test_charge_ranges() {
        let mut ranges = ChargeRanges::new(10).unwrap();
        assert_eq!(ranges.charge_span(3), None);
        ranges.extend(3, 5);
        ranges.extend(3, 2);
        ranges.extend(3, 4);
        assert_eq!(ranges.charge_span(3), Some((2, 5)));
        assert_eq!(ranges.mz_charge(3), None);
        ranges.set(2, 3, 7);
        assert_eq!(ranges.mz_charge(3), Some(7));
        assert_eq!(ranges.charge_span(100), None);
    }

    #[test]
    fn test_resolve_single_winner() {
        let params = DeconvolutionParams::default()
            .with_charge_range(1, 20)
            .with_min_continuous_charge_peak_count(vec![2]);
        let mass = 15_000.0;
        let peaks: Vec<(f64, f32)> = [10, 11, 12, 13]
            .iter()
            .map(|z| (mass_charge_ratio(mass, *z), 100.0))
            .collect();
        let mut prepared = prepare(&params, &peaks);
        sweep(&params, &mut prepared, 1);

        let mut ranges = ChargeRanges::new(
            prepared
                .scratch
                .mass_intensities
                .len()
                .max(prepared.scratch.mz_intensities.len()),
        )
        .unwrap();
        let resolver = ChargeResolver {
            offsets: &prepared.offsets,
            charge_count: prepared.filters.len(),
            bin_start: 0,
            bin_end: prepared.mass_space.len(),
            record_mz_charges: true,
        };
        let n = resolver.resolve(&mut prepared.scratch, &mut ranges);
        assert!(n > 0);

        let b = prepared.mass_space.bin_of(mass.ln());
        let best = (b - 1..=b + 1)
            .filter(|i| prepared.scratch.mass_bins.contains(*i))
            .max_by(|i, j| {
                prepared.scratch.mass_intensities[*i]
                    .total_cmp(&prepared.scratch.mass_intensities[*j])
            })
            .unwrap();
        assert_eq!(ranges.charge_span(best), Some((9, 12)));
        assert!(prepared.scratch.mass_bins_for_this_spectrum.contains(best));

        // Every m/z bin is assigned to at most one mass bin
        for mz_bin in prepared.scratch.mz_bins.iter() {
            if let Some(j) = ranges.mz_charge(mz_bin) {
                let mb = prepared.offsets.mass_bin(mz_bin, j).unwrap();
                assert!(prepared.scratch.mass_bins.contains(mb));
            }
        }
    }
}
