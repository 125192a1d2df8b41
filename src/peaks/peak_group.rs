use std::cmp;
use std::fmt;

use indexmap::IndexMap;
use mzpeaks::{CoordinateLike, DeconvolutedPeak, IntensityMeasurement, Mass};

use super::LogMzPeak;
use crate::utils::ISOTOPE_MASSDIFF;

/// Summary of the peaks of one charge state in a [`PeakGroup`]
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChargeStats {
    /// Summed squared intensity of peaks inside the isotope span that were not matched
    pub noise_power: f64,
    /// Summed squared intensity of the matched peaks
    pub signal_power: f64,
    pub intensity: f32,
    pub peak_count: usize,
    pub snr: f64,
}

impl ChargeStats {
    pub fn with_noise(noise_power: f64) -> Self {
        Self {
            noise_power,
            ..Default::default()
        }
    }

    fn add_peak(&mut self, intensity: f32) {
        self.intensity += intensity;
        self.signal_power += (intensity as f64).powi(2);
        self.peak_count += 1;
    }

    /// Recompute the signal-to-noise ratio from the accumulated powers
    pub fn update_snr(&mut self) -> f64 {
        self.snr = if self.noise_power > 0.0 {
            self.signal_power / self.noise_power
        } else {
            self.signal_power
        };
        self.snr
    }
}

/// One isotopic envelope of one analyte, observed in one or more charge states.
///
/// Every peak carries its own charge and an isotope index, and no two peaks share
/// both charge and isotope index. Isotope indices are non-negative. A freshly
/// assembled group starts at zero, but once re-indexed against an isotope model
/// index zero is the model's monoisotopic position and the smallest observed
/// index may be larger.
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakGroup {
    /// The mass bin this group was assembled from
    pub mass_bin_index: usize,
    pub peaks: Vec<LogMzPeak>,
    #[cfg_attr(feature = "serde", serde(with = "indexmap::map::serde_seq"))]
    pub charge_stats: IndexMap<i32, ChargeStats>,
    /// The neutral mass of isotope index zero
    pub monoisotopic_mass: f64,
    pub intensity: f32,
    pub isotope_cosine: f64,
    pub charge_score: f64,
    pub snr: f64,
}

impl fmt::Display for PeakGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PeakGroup({:0.4}, {}, charges={:?}, peaks={})",
            self.monoisotopic_mass,
            self.intensity,
            self.charges(),
            self.peaks.len()
        )
    }
}

impl cmp::PartialEq for PeakGroup {
    fn eq(&self, other: &Self) -> bool {
        self.mass_bin_index == other.mass_bin_index
            && (self.monoisotopic_mass - other.monoisotopic_mass).abs() < 1e-3
            && self.peaks.len() == other.peaks.len()
    }
}

impl cmp::PartialOrd for PeakGroup {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        self.monoisotopic_mass.partial_cmp(&other.monoisotopic_mass)
    }
}

impl CoordinateLike<Mass> for PeakGroup {
    fn coordinate(&self) -> f64 {
        self.monoisotopic_mass
    }
}

impl IntensityMeasurement for PeakGroup {
    fn intensity(&self) -> f32 {
        self.intensity
    }
}

impl PeakGroup {
    /// Build a group from peaks gathered independently per charge state.
    ///
    /// The most intense peak is the reference. Every peak's isotope index is
    /// recomputed from its neutral mass distance to the reference, peaks whose
    /// residual exceeds `tolerance * reference_mass` are discarded, only the most
    /// intense peak per (charge, isotope index) is kept, and indices are shifted so
    /// the smallest is zero. Returns `None` if nothing survives.
    pub fn from_pooled_peaks(
        mass_bin_index: usize,
        pooled: Vec<LogMzPeak>,
        noise_power: IndexMap<i32, f64>,
        tolerance: f64,
    ) -> Option<Self> {
        let reference = pooled
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))?;
        let reference_mass = reference.neutral_mass;
        let max_residual = tolerance * reference_mass;

        let mut peaks: Vec<LogMzPeak> = Vec::with_capacity(pooled.len());
        for mut peak in pooled {
            let delta = peak.neutral_mass - reference_mass;
            let index = (delta / ISOTOPE_MASSDIFF).round();
            if (delta - index * ISOTOPE_MASSDIFF).abs() > max_residual {
                continue;
            }
            peak.isotope_index = index as i32;
            match peaks
                .iter_mut()
                .find(|p| p.charge == peak.charge && p.isotope_index == peak.isotope_index)
            {
                Some(existing) => {
                    if existing.intensity < peak.intensity {
                        *existing = peak;
                    }
                }
                None => peaks.push(peak),
            }
        }

        let min_index = peaks.iter().map(|p| p.isotope_index).min()?;
        for p in peaks.iter_mut() {
            p.isotope_index -= min_index;
        }
        peaks.sort_by(|a, b| {
            a.charge
                .cmp(&b.charge)
                .then(a.isotope_index.cmp(&b.isotope_index))
        });

        let mut charge_stats: IndexMap<i32, ChargeStats> = IndexMap::new();
        for (z, noise) in noise_power {
            charge_stats.insert(z, ChargeStats::with_noise(noise));
        }
        let mut intensity = 0.0;
        for p in peaks.iter() {
            charge_stats.entry(p.charge).or_default().add_peak(p.intensity);
            intensity += p.intensity;
        }
        charge_stats.retain(|_, stats| stats.peak_count > 0);
        charge_stats.sort_keys();

        let mut group = Self {
            mass_bin_index,
            peaks,
            charge_stats,
            intensity,
            ..Default::default()
        };
        group.update_monoisotopic_mass();
        Some(group)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogMzPeak> {
        self.peaks.iter()
    }

    /// The distinct charge states in this group, in ascending order of magnitude
    pub fn charges(&self) -> Vec<i32> {
        let mut charges: Vec<i32> = self.charge_stats.keys().copied().collect();
        charges.sort_by_key(|z| z.abs());
        charges
    }

    pub fn max_isotope_index(&self) -> i32 {
        self.peaks.iter().map(|p| p.isotope_index).max().unwrap_or(0)
    }

    /// Summed intensity per isotope index, across all charges
    pub fn isotope_intensities(&self) -> Vec<f64> {
        let mut acc = vec![0.0; self.max_isotope_index() as usize + 1];
        for p in self.peaks.iter() {
            acc[p.isotope_index as usize] += p.intensity as f64;
        }
        acc
    }

    /// Summed intensity per isotope index for a single charge state
    pub fn isotope_intensities_for_charge(&self, charge: i32) -> Vec<f64> {
        let mut acc = vec![0.0; self.max_isotope_index() as usize + 1];
        for p in self.peaks.iter().filter(|p| p.charge == charge) {
            acc[p.isotope_index as usize] += p.intensity as f64;
        }
        acc
    }

    /// Shift every isotope index by `offset`, dropping peaks that would become negative
    pub fn shift_isotope_indices(&mut self, offset: i32) {
        if offset == 0 {
            return;
        }
        self.peaks.retain_mut(|p| {
            p.isotope_index += offset;
            p.isotope_index >= 0
        });
        self.recompute_charge_stats();
        self.update_monoisotopic_mass();
    }

    fn recompute_charge_stats(&mut self) {
        let mut intensity = 0.0;
        for stats in self.charge_stats.values_mut() {
            stats.intensity = 0.0;
            stats.signal_power = 0.0;
            stats.peak_count = 0;
        }
        for p in self.peaks.iter() {
            self.charge_stats
                .entry(p.charge)
                .or_default()
                .add_peak(p.intensity);
            intensity += p.intensity;
        }
        self.charge_stats.retain(|_, stats| stats.peak_count > 0);
        self.intensity = intensity;
    }

    /// Set the monoisotopic mass to the intensity-weighted mean of each peak's
    /// neutral mass, corrected back to isotope index zero
    pub fn update_monoisotopic_mass(&mut self) -> f64 {
        let mut weighted = 0.0;
        let mut total = 0.0;
        for p in self.peaks.iter() {
            let w = p.intensity as f64;
            weighted += (p.neutral_mass - p.isotope_index as f64 * ISOTOPE_MASSDIFF) * w;
            total += w;
        }
        if total > 0.0 {
            self.monoisotopic_mass = weighted / total;
        }
        self.monoisotopic_mass
    }

    /// Recompute per-charge and group-level signal-to-noise ratios
    pub fn update_snr(&mut self) -> f64 {
        let mut signal = 0.0;
        let mut noise = 0.0;
        for stats in self.charge_stats.values_mut() {
            stats.update_snr();
            signal += stats.signal_power;
            noise += stats.noise_power;
        }
        self.snr = if noise > 0.0 { signal / noise } else { signal };
        self.snr
    }

    /// Collapse this group into one deconvoluted peak per charge state
    pub fn to_deconvoluted_peaks(&self) -> Vec<DeconvolutedPeak> {
        self.charge_stats
            .iter()
            .map(|(z, stats)| DeconvolutedPeak {
                neutral_mass: self.monoisotopic_mass,
                intensity: stats.intensity,
                charge: *z,
                index: 0,
            })
            .collect()
    }
}
