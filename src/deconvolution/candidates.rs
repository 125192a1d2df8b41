//! Candidate mass bin selection.
//!
//! Every occupied m/z bin is tested against every charge hypothesis in one pass.
//! Bins are visited from high to low m/z so that, for any given mass bin, the
//! hypotheses that reach it arrive in ascending charge order and continuity can be
//! tracked with a single "previous charge" slot per mass bin.
use crate::binning::BinSpace;
use crate::utils::{AMMONIA_MASS, ISOTOPE_MASSDIFF, WATER_MASS};

use super::filters::BinOffsets;
use super::scratch::{Scratch, NO_CHARGE};

/// The settings of one candidate selection pass
#[derive(Debug, Clone)]
pub struct CandidateSweep<'a> {
    pub offsets: &'a BinOffsets,
    pub mz_space: &'a BinSpace,
    /// The signed charge of each hypothesis tested, possibly fewer than configured
    pub charges: &'a [i32],
    /// Mass bins outside `[bin_start, bin_end)` are never considered
    pub bin_start: usize,
    pub bin_end: usize,
    /// The number of supporting peaks required to make a mass bin a candidate
    pub min_support: usize,
    pub factor: f32,
    pub ms_level: u8,
    pub use_neutral_losses: bool,
}

impl CandidateSweep<'_> {
    /// Fill `scratch.candidate_mass_bins` and `scratch.mass_intensities`, returning
    /// the number of candidates
    pub fn run(&self, scratch: &mut Scratch) -> usize {
        let order: Vec<usize> = scratch.mz_bins.iter().collect();
        if self.ms_level > 1 {
            self.sweep_msn(&order, scratch);
        } else {
            self.sweep_ms1(&order, scratch);
        }
        self.subtract_noise(scratch);
        scratch.candidate_mass_bins.count()
    }

    #[inline]
    fn in_range(&self, mz_bin: usize, j: usize) -> Result<usize, bool> {
        match self.offsets.mass_bin(mz_bin, j) {
            Some(mb) if mb >= self.bin_end => Err(true),
            Some(mb) if mb >= self.bin_start => Ok(mb),
            _ => Err(false),
        }
    }

    fn start_run(&self, mass_bin: usize, intensity: f32, scratch: &mut Scratch) {
        scratch.run_lengths[mass_bin] = 1;
        if self.min_support <= 1 {
            scratch.mass_intensities[mass_bin] += intensity;
            scratch.candidate_mass_bins.insert(mass_bin);
        }
    }

    /// Look for a harmonic artifact of hypothesis `j` at `mass_bin`. Matches are
    /// recorded in the harmonic noise rows.
    fn harmonic_noise(
        &self,
        mz_bin: usize,
        mass_bin: usize,
        j: usize,
        intensity: f32,
        scratch: &mut Scratch,
    ) -> bool {
        let n_harmonics = scratch.noise.nrows() - 1;
        let low = intensity * (1.0 - 1.0 / self.factor);
        let high = intensity * self.factor;
        let mut found = false;
        for k in 0..n_harmonics {
            let mut strongest = 0.0f32;
            for t in -1..=1 {
                let Some(hb) = self.offsets.harmonic_mz_bin(mass_bin, k, j, t) else {
                    continue;
                };
                if hb == mz_bin || !scratch.mz_bins.contains(hb) {
                    continue;
                }
                let h_intensity = scratch.mz_intensities[hb];
                if h_intensity >= low && h_intensity <= high {
                    strongest = strongest.max(h_intensity);
                }
            }
            if strongest > 0.0 {
                scratch.noise[[k, mass_bin]] += strongest;
                found = true;
            }
        }
        found
    }

    fn sweep_ms1(&self, order: &[usize], scratch: &mut Scratch) {
        let discontinuous_row = scratch.noise.nrows() - 1;
        for &mz_bin in order.iter().rev() {
            let intensity = scratch.mz_intensities[mz_bin];
            for j in 0..self.charges.len() {
                let mass_bin = match self.in_range(mz_bin, j) {
                    Ok(mb) => mb,
                    Err(true) => break,
                    Err(false) => continue,
                };

                let prev_charge = scratch.prev_charges[mass_bin];
                let prev_intensity = scratch.prev_intensities[mass_bin];
                scratch.prev_charges[mass_bin] = j as u16;
                scratch.prev_intensities[mass_bin] = intensity;

                if prev_charge == NO_CHARGE {
                    self.start_run(mass_bin, intensity, scratch);
                    continue;
                }

                let (low, high) = if intensity < prev_intensity {
                    (intensity, prev_intensity)
                } else {
                    (prev_intensity, intensity)
                };
                let similar = high <= low * self.factor;
                if j != prev_charge as usize + 1 {
                    if similar {
                        scratch.noise[[discontinuous_row, mass_bin]] += low;
                    }
                    self.start_run(mass_bin, intensity, scratch);
                    continue;
                }
                if !similar {
                    self.start_run(mass_bin, intensity, scratch);
                    continue;
                }

                if self.harmonic_noise(mz_bin, mass_bin, j, intensity, scratch) {
                    scratch.run_lengths[mass_bin] = 0;
                    continue;
                }

                let run = &mut scratch.run_lengths[mass_bin];
                // `start_run` already counted the first peak when a single peak suffices
                if *run == 1 && self.min_support > 1 {
                    scratch.mass_intensities[mass_bin] += prev_intensity;
                }
                *run = run.saturating_add(1);
                scratch.mass_intensities[mass_bin] += intensity;
                if *run as usize >= self.min_support {
                    scratch.candidate_mass_bins.insert(mass_bin);
                }
            }
        }
    }

    /// The most intense occupied m/z bin within one bin of `uncharged_mz`,
    /// excluding `origin` and its immediate neighbors. Nothing is found outside
    /// the m/z space.
    fn peak_near(&self, uncharged_mz: f64, origin: usize, scratch: &Scratch) -> Option<f32> {
        if uncharged_mz <= 0.0 {
            return None;
        }
        let center = self.mz_space.get(uncharged_mz.ln())?;
        (center.saturating_sub(1)..=center + 1)
            .filter(|b| b.abs_diff(origin) > 1 && scratch.mz_bins.contains(*b))
            .map(|b| scratch.mz_intensities[b])
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Fragment spectra rarely show a charge state series, so support comes from the
    /// next isotope peak and optionally neutral losses instead.
    ///
    /// Unlike MS1, hypotheses failing the isotope test subtract their intensity from
    /// the mass bin. This asymmetry is kept as observed and awaits expert review.
    fn sweep_msn(&self, order: &[usize], scratch: &mut Scratch) {
        for &mz_bin in order.iter().rev() {
            let intensity = scratch.mz_intensities[mz_bin];
            let uncharged = self.mz_space.value_of(mz_bin).exp();
            for (j, z) in self.charges.iter().enumerate() {
                let mass_bin = match self.in_range(mz_bin, j) {
                    Ok(mb) => mb,
                    Err(true) => break,
                    Err(false) => continue,
                };
                let abs_z = z.abs() as f64;

                let isotope = self
                    .peak_near(uncharged + ISOTOPE_MASSDIFF / abs_z, mz_bin, scratch)
                    .filter(|i| *i < intensity);

                let Some(isotope_intensity) = isotope else {
                    scratch.mass_intensities[mass_bin] -= intensity;
                    continue;
                };

                let mut support = intensity + isotope_intensity;
                if self.use_neutral_losses {
                    for loss in [WATER_MASS, AMMONIA_MASS] {
                        if let Some(li) = self.peak_near(uncharged - loss / abs_z, mz_bin, scratch) {
                            support += li;
                        }
                    }
                }
                scratch.mass_intensities[mass_bin] += support;
                let run = &mut scratch.run_lengths[mass_bin];
                *run = run.saturating_add(1);
                if *run as usize >= self.min_support {
                    scratch.candidate_mass_bins.insert(mass_bin);
                }
            }
        }
    }

    fn subtract_noise(&self, scratch: &mut Scratch) {
        for mass_bin in scratch.candidate_mass_bins.iter() {
            let noise = scratch
                .noise
                .column(mass_bin)
                .iter()
                .fold(0.0f32, |acc, v| acc.max(*v));
            scratch.mass_intensities[mass_bin] -= noise;
        }
    }
}
