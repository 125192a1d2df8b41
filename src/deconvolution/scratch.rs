//! Per-spectrum working buffers.
//!
//! Every buffer here is sized to the bin spaces of the spectrum being processed
//! and is cleared on [`Scratch::reset`] before any stage reads it. Several
//! stages treat a zero slot as "nothing observed", so stale values from a previous
//! spectrum would corrupt the result.
use ndarray::Array2;

use crate::binning::{BinSet, BinSpace};
use crate::peaks::LogMzPeak;

use super::DeconvolutionError;

/// Marks an unset charge hypothesis slot
pub const NO_CHARGE: u16 = u16::MAX;

#[derive(Debug, Default, Clone)]
pub struct Scratch {
    /// m/z bins holding at least one peak or smoothing neighbor
    pub mz_bins: BinSet,
    pub mz_intensities: Vec<f32>,
    /// Mass bins accepted as signal, including those carried over from history
    pub mass_bins: BinSet,
    /// Mass bins accepted from evidence in the current spectrum alone
    pub mass_bins_for_this_spectrum: BinSet,
    pub candidate_mass_bins: BinSet,
    pub mass_intensities: Vec<f32>,
    /// The last charge hypothesis index that touched each mass bin
    pub prev_charges: Vec<u16>,
    pub prev_intensities: Vec<f32>,
    /// The number of peaks in the current run of continuous charges per mass bin
    pub run_lengths: Vec<u16>,
    /// Rows are harmonic ratios followed by one row for non-adjacent charges
    pub noise: Array2<f32>,
}

fn refill<T: Clone>(
    buffer: &mut Vec<T>,
    len: usize,
    value: T,
    what: &'static str,
) -> Result<(), DeconvolutionError> {
    buffer.clear();
    buffer
        .try_reserve(len)
        .map_err(DeconvolutionError::allocation(what, len))?;
    buffer.resize(len, value);
    Ok(())
}

impl Scratch {
    /// Resize and zero every buffer for a spectrum with `mz_len` m/z bins,
    /// `mass_len` mass bins and `n_harmonics` harmonic ratios
    pub fn reset(
        &mut self,
        mz_len: usize,
        mass_len: usize,
        n_harmonics: usize,
    ) -> Result<(), DeconvolutionError> {
        self.mz_bins
            .reset(mz_len)
            .map_err(DeconvolutionError::allocation("m/z bins", mz_len))?;
        refill(&mut self.mz_intensities, mz_len, 0.0, "m/z intensities")?;

        for set in [
            &mut self.mass_bins,
            &mut self.mass_bins_for_this_spectrum,
            &mut self.candidate_mass_bins,
        ] {
            set.reset(mass_len)
                .map_err(DeconvolutionError::allocation("mass bins", mass_len))?;
        }
        refill(&mut self.mass_intensities, mass_len, 0.0, "mass intensities")?;
        refill(&mut self.prev_charges, mass_len, NO_CHARGE, "previous charges")?;
        refill(&mut self.prev_intensities, mass_len, 0.0, "previous intensities")?;
        refill(&mut self.run_lengths, mass_len, 0, "charge run lengths")?;

        let rows = n_harmonics + 1;
        let n_noise = rows * mass_len;
        let mut noise = std::mem::take(&mut self.noise).into_raw_vec();
        refill(&mut noise, n_noise, 0.0, "harmonic noise")?;
        self.noise = Array2::from_shape_vec((rows, mass_len), noise)
            .map_err(|_| DeconvolutionError::AllocationFailed {
                what: "harmonic noise",
                requested: n_noise,
            })?;
        Ok(())
    }

    /// Mark the m/z bin of each peak, plus the neighboring bin on the side the
    /// peak's exact position falls on when that neighbor holds no peak itself
    pub fn populate_mz_bins(&mut self, peaks: &[LogMzPeak], mz_space: &BinSpace) {
        let mut placed = Vec::with_capacity(peaks.len());
        for p in peaks {
            let Some(bin) = mz_space.get(p.log_mz) else {
                continue;
            };
            self.mz_bins.insert(bin);
            self.mz_intensities[bin] += p.intensity;
            placed.push((bin, p));
        }

        let direct = self.mz_bins.clone();
        for (bin, p) in placed {
            if let Some(neighbor) = mz_space.smoothing_neighbor(p.log_mz, bin) {
                if !direct.contains(neighbor) {
                    self.mz_bins.insert(neighbor);
                    self.mz_intensities[neighbor] += p.intensity;
                }
            }
        }
    }
}
