#[cfg(feature = "parallelism")]
use rayon::prelude::*;

use mzpeaks::{CentroidLike, IntensityMeasurement, MZLocated};

use crate::averagine::{IsotopeEnvelopeModel, PrecomputedAveragine};
use crate::binning::BinSpace;
use crate::params::DeconvolutionParams;
use crate::peaks::{LogMzPeak, PeakGroup};
use crate::scoring::{AveragineScorer, PeakGroupScorer, ScoringContext};
use crate::spectrum::{
    CentroidSpectrumType, DeconvolvedSpectrum, IonProperties, SelectedIon, SpectrumLike,
};
use crate::utils::ISOTOPE_MASSDIFF;

use super::assembler::PeakGroupAssembler;
use super::candidates::CandidateSweep;
use super::filters::PatternFilters;
use super::history::ContinuityHistory;
use super::resolver::{ChargeRanges, ChargeResolver};
use super::scratch::Scratch;
use super::DeconvolutionError;

/// The bounds that apply to one spectrum after any precursor caps
#[derive(Debug, Clone, Copy)]
struct SpectrumBounds {
    charge_count: usize,
    max_mass: f64,
}

/// The half-open range of mass bins whose masses lie within `[min_log_mass, max_log_mass]`,
/// or `None` if the two do not overlap
fn mass_range_bins(
    mass_space: &BinSpace,
    min_log_mass: f64,
    max_log_mass: f64,
) -> Option<(usize, usize)> {
    if max_log_mass < mass_space.min_value || min_log_mass > max_log_mass {
        return None;
    }
    let bin_start = if min_log_mass < mass_space.min_value {
        0
    } else {
        mass_space.get(min_log_mass)?
    };
    let bin_end = mass_space
        .get(max_log_mass)
        .map_or(mass_space.len(), |b| b + 1);
    (bin_start < bin_end).then_some((bin_start, bin_end))
}

/// Deconvolves a sequence of spectra from one run.
///
/// A session owns everything carried between spectra: the continuity history of
/// recently accepted masses and reusable working buffers. Spectra must be passed in
/// acquisition order, since the history describes "the most recent spectra".
/// Independent runs need independent sessions.
#[derive(Debug, Clone)]
pub struct DeconvolutionSession<
    S: PeakGroupScorer = AveragineScorer,
    M: IsotopeEnvelopeModel = PrecomputedAveragine,
> {
    params: DeconvolutionParams,
    filters: PatternFilters,
    model: M,
    scorer: S,
    history: ContinuityHistory,
    scratch: Scratch,
}

impl DeconvolutionSession {
    /// Create a session with the default scorer and an averagine model covering
    /// the configured mass range
    pub fn new(params: DeconvolutionParams) -> Result<Self, DeconvolutionError> {
        params.validate()?;
        let model = PrecomputedAveragine::with_max_mass(params.max_mass);
        Self::from_parts(params, AveragineScorer, model)
    }
}

impl<S: PeakGroupScorer, M: IsotopeEnvelopeModel> DeconvolutionSession<S, M> {
    pub fn from_parts(
        params: DeconvolutionParams,
        scorer: S,
        model: M,
    ) -> Result<Self, DeconvolutionError> {
        params.validate()?;
        let filters = PatternFilters::new(&params);
        let history = ContinuityHistory::new(params.num_overlapped_scans);
        Ok(Self {
            params,
            filters,
            model,
            scorer,
            history,
            scratch: Scratch::default(),
        })
    }

    /// Replace the scorer, keeping all other state
    pub fn with_scorer<T: PeakGroupScorer>(self, scorer: T) -> DeconvolutionSession<T, M> {
        DeconvolutionSession {
            params: self.params,
            filters: self.filters,
            model: self.model,
            scorer,
            history: self.history,
            scratch: self.scratch,
        }
    }

    pub fn params(&self) -> &DeconvolutionParams {
        &self.params
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn scorer_mut(&mut self) -> &mut S {
        &mut self.scorer
    }

    /// The mass bins remembered from recent MS1 spectra
    pub fn history(&self) -> &ContinuityHistory {
        &self.history
    }

    /// Forget every previous spectrum, as at the start of a new run
    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    /// Convert peaks into [`LogMzPeak`]s, dropping those at or below the intensity
    /// threshold or with no meaningful m/z, sorted by m/z
    fn log_peaks<C: CentroidLike>(&self, peaks: &[C]) -> Vec<LogMzPeak> {
        let sign = self.params.charge_sign();
        let threshold = self.params.intensity_threshold;
        let mut log_peaks: Vec<LogMzPeak> = peaks
            .iter()
            .enumerate()
            .filter(|(_, p)| p.intensity() > threshold)
            .map(|(i, p)| LogMzPeak::new(p.mz(), p.intensity(), i as u32, sign))
            .filter(|p| p.log_mz.is_finite())
            .collect();
        log_peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        log_peaks
    }

    fn bounds(&self, ms_level: u8, precursor: Option<&SelectedIon>) -> SpectrumBounds {
        let mut bounds = SpectrumBounds {
            charge_count: self.filters.len(),
            max_mass: self.params.max_mass,
        };
        if ms_level < 2 {
            return bounds;
        }
        let Some(precursor) = precursor else {
            return bounds;
        };
        if let Some(z) = precursor.charge() {
            let cap = (z.abs() - self.params.min_charge.abs() + 1).max(0) as usize;
            bounds.charge_count = bounds.charge_count.min(cap);
            bounds.max_mass = bounds.max_mass.min(precursor.neutral_mass());
        }
        bounds
    }

    /// Deconvolve one spectrum's peaks, returning the peak groups the scorer keeps.
    ///
    /// For MS1 spectra, masses accepted in the last `num_overlapped_scans` MS1
    /// spectra are given a chance to win even without full evidence here, and the
    /// surviving masses of this spectrum are remembered for the following ones. For
    /// fragment spectra with a known `precursor`, charges and masses are capped by
    /// the precursor's.
    pub fn deconvolve<C: CentroidLike>(
        &mut self,
        peaks: &[C],
        ms_level: u8,
        precursor: Option<&SelectedIon>,
    ) -> Result<Vec<PeakGroup>, DeconvolutionError> {
        if ms_level == 0 {
            return Err(DeconvolutionError::UnsupportedMSLevel(ms_level));
        }

        let log_peaks = self.log_peaks(peaks);
        let (Some(first), Some(last)) = (log_peaks.first(), log_peaks.last()) else {
            log::debug!("No peaks above the intensity threshold, nothing to deconvolve");
            return Ok(Vec::new());
        };

        let bounds = self.bounds(ms_level, precursor);
        if bounds.charge_count == 0 || bounds.max_mass <= self.params.min_mass {
            log::debug!(
                "No charge or mass hypotheses left for MS{ms_level} after precursor caps {bounds:?}"
            );
            return Ok(Vec::new());
        }

        let density = self.params.bin_density(ms_level);
        let tolerance = self.params.tolerance(ms_level);
        let filters = &self.filters;
        let charges = &filters.charges[..bounds.charge_count];

        let mz_space = BinSpace::new(first.log_mz, last.log_mz, density);
        let padded_max_mass = bounds.max_mass
            + (self.model.right_count(bounds.max_mass) + 1) as f64 * ISOTOPE_MASSDIFF;
        let mass_max = (last.log_mz - filters.universal[bounds.charge_count - 1])
            .min(padded_max_mass.ln());
        let mass_space = BinSpace::new(first.log_mz - filters.universal[0], mass_max, density);
        let Some((bin_start, bin_end)) = mass_range_bins(
            &mass_space,
            self.params.min_mass.ln(),
            bounds.max_mass.ln(),
        ) else {
            log::debug!(
                "MS{ms_level}: the configured mass range does not overlap the spectrum's mass space"
            );
            return Ok(Vec::new());
        };
        let offsets = filters.bin_offsets(&mz_space, &mass_space);

        log::debug!(
            "MS{ms_level}: {} peaks, {} m/z bins, {} mass bins",
            log_peaks.len(),
            mz_space.len(),
            mass_space.len()
        );

        let scratch = &mut self.scratch;
        scratch.reset(mz_space.len(), mass_space.len(), filters.harmonic_count())?;
        scratch.populate_mz_bins(&log_peaks, &mz_space);

        let is_ms1 = ms_level == 1;
        if is_ms1 {
            let carried =
                self.history
                    .union_into(&mut scratch.mass_bins, mass_space.min_value, density);
            log::trace!("Carried {carried} mass bins over from previous spectra");
        }

        let n_candidates = CandidateSweep {
            offsets: &offsets,
            mz_space: &mz_space,
            charges,
            bin_start,
            bin_end,
            min_support: self.params.min_continuous_charge_peak_count(ms_level),
            factor: self.params.intensity_ratio_factor as f32,
            ms_level,
            use_neutral_losses: self.params.use_neutral_losses,
        }
        .run(scratch);

        let mut ranges = ChargeRanges::new(mass_space.len().max(mz_space.len()))?;
        let n_accepted = ChargeResolver {
            offsets: &offsets,
            charge_count: charges.len(),
            bin_start,
            bin_end,
            record_mz_charges: is_ms1,
        }
        .resolve(scratch, &mut ranges);

        let groups = PeakGroupAssembler {
            peaks: &log_peaks,
            mz_space: &mz_space,
            mass_space: &mass_space,
            offsets: &offsets,
            charges,
            model: &self.model,
            tolerance,
            max_missing: self.params.max_missing_isotopes,
        }
        .assemble(scratch, &ranges);

        log::debug!(
            "MS{ms_level}: {n_candidates} candidate mass bins, {n_accepted} accepted, {} peak groups",
            groups.len()
        );

        let context = ScoringContext {
            ms_level,
            params: &self.params,
            model: &self.model,
        };
        let groups = self.scorer.score(groups, &context);

        if is_ms1 {
            let mut survivors: Vec<usize> = groups
                .iter()
                .map(|g| g.mass_bin_index)
                .filter(|b| scratch.mass_bins_for_this_spectrum.contains(*b))
                .collect();
            survivors.sort_unstable();
            survivors.dedup();
            self.history.push(survivors, mass_space.min_value);
        }
        Ok(groups)
    }

    /// Deconvolve a centroided spectrum, carrying its metadata through to the result
    pub fn deconvolve_spectrum<C: CentroidLike>(
        &mut self,
        spectrum: &CentroidSpectrumType<C>,
    ) -> Result<DeconvolvedSpectrum, DeconvolutionError> {
        if let Some(sign) = spectrum.polarity().sign() {
            if sign != self.params.charge_sign() {
                log::warn!(
                    "Spectrum {} has polarity {:?} but charges of sign {} are configured",
                    spectrum.id(),
                    spectrum.polarity(),
                    self.params.charge_sign()
                );
            }
        }
        let groups = self.deconvolve(
            spectrum.peaks.as_slice(),
            spectrum.ms_level(),
            spectrum.precursor(),
        )?;
        Ok(DeconvolvedSpectrum::new(spectrum.description.clone(), groups))
    }
}

fn deconvolve_run<C: CentroidLike>(
    run: &[CentroidSpectrumType<C>],
    params: &DeconvolutionParams,
) -> Result<Vec<DeconvolvedSpectrum>, DeconvolutionError> {
    let mut session = DeconvolutionSession::new(params.clone())?;
    run.iter()
        .map(|spectrum| session.deconvolve_spectrum(spectrum))
        .collect()
}

/// Deconvolve several independent runs, each with its own session and continuity
/// history. When the `parallelism` feature is enabled, each run is processed on a
/// separate thread. Spectra within a run are always processed in order.
pub fn deconvolve_runs<C: CentroidLike + Send + Sync>(
    runs: &[Vec<CentroidSpectrumType<C>>],
    params: &DeconvolutionParams,
) -> Result<Vec<Vec<DeconvolvedSpectrum>>, DeconvolutionError> {
    #[cfg(not(feature = "parallelism"))]
    {
        runs.iter().map(|run| deconvolve_run(run, params)).collect()
    }
    #[cfg(feature = "parallelism")]
    {
        runs.par_iter()
            .map(|run| deconvolve_run(run, params))
            .collect()
    }
}
