//! Scoring and filtering of assembled peak groups.
//!
//! The deconvolution engine emits every plausible [`PeakGroup`] it can assemble
//! and leaves the decision of which ones to report to a [`PeakGroupScorer`]. The
//! groups the scorer returns also decide which mass bins the engine remembers for
//! the following spectra.
use std::cmp::Ordering;

use crate::averagine::IsotopeEnvelopeModel;
use crate::params::DeconvolutionParams;
use crate::peaks::PeakGroup;

/// What a scorer knows about the spectrum the groups came from
#[derive(Clone, Copy)]
pub struct ScoringContext<'a> {
    pub ms_level: u8,
    pub params: &'a DeconvolutionParams,
    pub model: &'a dyn IsotopeEnvelopeModel,
}

/// Decides which peak groups of a spectrum are reported
pub trait PeakGroupScorer {
    /// Score `groups`, returning the subset to report. The returned groups may have
    /// had their isotope indices and monoisotopic masses revised.
    fn score(&mut self, groups: Vec<PeakGroup>, context: &ScoringContext) -> Vec<PeakGroup>;
}

/// Reports every group as assembled
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughScorer;

impl PeakGroupScorer for PassThroughScorer {
    fn score(&mut self, groups: Vec<PeakGroup>, _context: &ScoringContext) -> Vec<PeakGroup> {
        groups
    }
}

/// Scores groups by their agreement with the averagine isotope envelope and by the
/// shape of their charge state distribution, then removes overlapping masses.
#[derive(Debug, Default, Clone, Copy)]
pub struct AveragineScorer;

/// The cosine between `observed` and `expected` when observed index `i` is aligned
/// with expected index `i + offset`
pub fn shifted_cosine(observed: &[f64], expected: &[f64], offset: i32) -> f64 {
    let mut dot = 0.0;
    for (i, o) in observed.iter().enumerate() {
        let e = i as i32 + offset;
        if e < 0 {
            continue;
        }
        if let Some(v) = expected.get(e as usize) {
            dot += o * v;
        }
    }
    let norm_o = observed.iter().map(|v| v * v).sum::<f64>().sqrt();
    let norm_e = expected.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm_o == 0.0 || norm_e == 0.0 {
        return 0.0;
    }
    dot / (norm_o * norm_e)
}

/// The fraction of `intensities` consistent with a distribution that rises to a
/// single maximum and falls after it
pub fn unimodal_fit(intensities: &[f64]) -> f64 {
    let total: f64 = intensities.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let Some((apex, apex_value)) = intensities
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
    else {
        return 0.0;
    };

    let mut explained = apex_value;
    let mut cap = apex_value;
    for v in intensities[..apex].iter().rev() {
        explained += v.min(cap);
        cap = cap.min(*v);
    }
    cap = apex_value;
    for v in intensities[apex + 1..].iter() {
        explained += v.min(cap);
        cap = cap.min(*v);
    }
    explained / total
}

impl AveragineScorer {
    /// Find the isotope offset that best aligns the group with the expected
    /// envelope, returning the offset and its cosine
    pub fn best_isotope_offset(group: &PeakGroup, model: &dyn IsotopeEnvelopeModel) -> (i32, f64) {
        let observed = group.isotope_intensities();
        let mass = group.monoisotopic_mass;
        let expected = model.envelope(mass);
        let lowest = -(model.left_count(mass) as i32) - 1;
        let highest = expected.len() as i32 - 1;

        let mut best = (0, f64::NEG_INFINITY);
        for offset in lowest..=highest.max(0) {
            let cosine = shifted_cosine(&observed, expected, offset);
            if cosine > best.1 {
                best = (offset, cosine);
            }
        }
        best
    }

    /// Score the charge state distribution over every charge between the lowest
    /// and highest observed, missing charges counting as zero intensity
    pub fn charge_fit(group: &PeakGroup) -> f64 {
        let charges = group.charges();
        let (Some(lo), Some(hi)) = (charges.first(), charges.last()) else {
            return 0.0;
        };
        if charges.len() == 1 {
            return 1.0;
        }
        let lo = lo.abs();
        let profile: Vec<f64> = (lo..=hi.abs())
            .map(|z| {
                group
                    .charge_stats
                    .iter()
                    .find(|(c, _)| c.abs() == z)
                    .map(|(_, s)| s.intensity as f64)
                    .unwrap_or(0.0)
            })
            .collect();
        unimodal_fit(&profile)
    }

    fn score_group(&self, mut group: PeakGroup, context: &ScoringContext) -> Option<PeakGroup> {
        let (offset, _) = Self::best_isotope_offset(&group, context.model);
        group.shift_isotope_indices(offset);
        if group.is_empty() {
            return None;
        }

        let observed = group.isotope_intensities();
        let expected = context.model.envelope(group.monoisotopic_mass);
        group.isotope_cosine = shifted_cosine(&observed, expected, 0);
        if group.isotope_cosine < context.params.min_isotope_cosine(context.ms_level) {
            return None;
        }

        group.charge_score = Self::charge_fit(&group);
        if group.charge_score < context.params.min_charge_cosine(context.ms_level) {
            return None;
        }

        group.update_snr();
        Some(group)
    }

    /// Keep the more intense of any two groups closer than twice the tolerance
    fn remove_overlaps(groups: Vec<PeakGroup>, tolerance: f64) -> Vec<PeakGroup> {
        let mut by_intensity = groups;
        by_intensity.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
        let mut kept: Vec<PeakGroup> = Vec::with_capacity(by_intensity.len());
        for group in by_intensity {
            let mass = group.monoisotopic_mass;
            let width = 2.0 * tolerance * mass;
            if kept
                .iter()
                .any(|k| (k.monoisotopic_mass - mass).abs() <= width)
            {
                continue;
            }
            kept.push(group);
        }
        kept
    }
}

impl PeakGroupScorer for AveragineScorer {
    fn score(&mut self, groups: Vec<PeakGroup>, context: &ScoringContext) -> Vec<PeakGroup> {
        let n = groups.len();
        let scored: Vec<PeakGroup> = groups
            .into_iter()
            .filter_map(|g| self.score_group(g, context))
            .collect();
        let mut kept = Self::remove_overlaps(scored, context.params.tolerance(context.ms_level));
        if let Some(limit) = context.params.max_mass_count(context.ms_level) {
            kept.truncate(limit);
        }
        kept.sort_by(|a, b| {
            a.monoisotopic_mass
                .partial_cmp(&b.monoisotopic_mass)
                .unwrap_or(Ordering::Equal)
        });
        log::debug!("Kept {} of {n} peak groups after scoring", kept.len());
        kept
    }
}

#[cfg(test)]
mod test {
    use indexmap::IndexMap;

    use super::*;
    use crate::averagine::PrecomputedAveragine;
    use crate::peaks::LogMzPeak;
    use crate::utils::{isclose, mass_charge_ratio, ISOTOPE_MASSDIFF};

    fn group_of(mass: f64, series: &[(i32, &[f32])]) -> PeakGroup {
        let mut pooled = Vec::new();
        for (z, intensities) in series {
            for (i, inten) in intensities.iter().enumerate() {
                let m = mass + i as f64 * ISOTOPE_MASSDIFF;
                pooled.push(
                    LogMzPeak::new(mass_charge_ratio(m, *z), *inten, 0, 1).assign(*z, i as i32),
                );
            }
        }
        PeakGroup::from_pooled_peaks(0, pooled, IndexMap::new(), 10e-6).unwrap()
    }

    #[test]
    fn test_shifted_cosine() {
        let a = [1.0, 0.5, 0.1];
        assert!(isclose(shifted_cosine(&a, &a, 0), 1.0, 1e-12));
        assert!(shifted_cosine(&a, &a, 1) < 0.9);
        assert_eq!(shifted_cosine(&[0.0, 0.0], &a, 0), 0.0);
    }

    #[test]
    fn test_unimodal_fit() {
        assert!(isclose(unimodal_fit(&[1.0, 3.0, 5.0, 2.0, 1.0]), 1.0, 1e-12));
        // the dip at index 2 and the recovery after it are partly unexplained
        let fit = unimodal_fit(&[5.0, 4.0, 0.0, 4.0]);
        assert!(fit < 0.7, "{fit}");
        assert_eq!(unimodal_fit(&[]), 0.0);
    }

    #[test]
    fn test_charge_fit() {
        let single = group_of(1000.0, &[(2, &[100.0, 50.0])]);
        assert_eq!(AveragineScorer::charge_fit(&single), 1.0);
        let gapped = group_of(5000.0, &[(5, &[100.0]), (6, &[1.0]), (7, &[100.0])]);
        assert!(AveragineScorer::charge_fit(&gapped) < 0.6);
    }

    #[test_log::test]
    fn test_averagine_scorer() {
        let model = PrecomputedAveragine::with_max_mass(5_000.0);
        let params = DeconvolutionParams::default();
        let context = ScoringContext {
            ms_level: 1,
            params: &params,
            model: &model,
        };
        let good = group_of(1000.0, &[(2, &[100.0, 60.0, 20.0]), (3, &[90.0, 55.0])]);
        // nothing like an isotope envelope at this mass
        let bad = group_of(2000.0, &[(2, &[100.0, 2.0, 100.0, 2.0, 100.0])]);
        // within twice the tolerance of `good`, but weaker
        let shadow = group_of(1000.005, &[(2, &[50.0, 30.0, 10.0])]);

        let mut scorer = AveragineScorer;
        let kept = scorer.score(vec![bad, shadow, good], &context);
        assert_eq!(kept.len(), 1);
        let group = &kept[0];
        assert!(group.isotope_cosine > 0.9, "{}", group.isotope_cosine);
        assert_eq!(group.charge_score, 1.0);
        assert!(isclose(group.monoisotopic_mass, 1000.0, 1e-3));
        assert_eq!(group.iter().map(|p| p.isotope_index).min(), Some(0));
    }

    #[test]
    fn test_max_mass_count() {
        let model = PrecomputedAveragine::with_max_mass(5_000.0);
        let params = DeconvolutionParams::default().with_max_mass_count(vec![1]);
        let context = ScoringContext {
            ms_level: 1,
            params: &params,
            model: &model,
        };
        let a = group_of(1000.0, &[(2, &[100.0, 60.0, 20.0])]);
        let b = group_of(1200.0, &[(2, &[300.0, 200.0, 80.0])]);
        let kept = AveragineScorer.score(vec![a, b], &context);
        assert_eq!(kept.len(), 1);
        assert!(isclose(kept[0].monoisotopic_mass, 1200.0, 1e-3));
    }

    #[test]
    fn test_pass_through() {
        let model = PrecomputedAveragine::with_max_mass(5_000.0);
        let params = DeconvolutionParams::default();
        let context = ScoringContext {
            ms_level: 1,
            params: &params,
            model: &model,
        };
        let groups = vec![group_of(2000.0, &[(2, &[10.0, 100.0, 5.0, 100.0])])];
        assert_eq!(PassThroughScorer.score(groups, &context).len(), 1);
    }
}
