//! Peak group assembly.
//!
//! For each accepted mass bin, the charge states recorded by the resolver are
//! revisited in the original peak list. Starting from an anchor peak per charge,
//! the isotope series is walked in both directions and the matched peaks of all
//! charges are pooled into one [`PeakGroup`].
use indexmap::IndexMap;

use crate::averagine::IsotopeEnvelopeModel;
use crate::binning::BinSpace;
use crate::peaks::{LogMzPeak, PeakGroup};
use crate::utils::ISOTOPE_MASSDIFF;

use super::filters::BinOffsets;
use super::resolver::ChargeRanges;
use super::scratch::Scratch;

#[derive(Debug, Clone)]
pub struct PeakGroupAssembler<'a, M: IsotopeEnvelopeModel + ?Sized> {
    /// The spectrum's peaks in ascending m/z order
    pub peaks: &'a [LogMzPeak],
    pub mz_space: &'a BinSpace,
    pub mass_space: &'a BinSpace,
    pub offsets: &'a BinOffsets,
    pub charges: &'a [i32],
    pub model: &'a M,
    pub tolerance: f64,
    pub max_missing: usize,
}

impl<M: IsotopeEnvelopeModel + ?Sized> PeakGroupAssembler<'_, M> {
    /// Build one group per accepted mass bin that is a local maximum both along the
    /// isotope axis and among adjacent accepted bins
    pub fn assemble(&self, scratch: &Scratch, ranges: &ChargeRanges) -> Vec<PeakGroup> {
        let peak_bins: Vec<Option<usize>> = self
            .peaks
            .iter()
            .map(|p| self.mz_space.get(p.log_mz))
            .collect();
        let mut cursors = vec![0usize; self.charges.len()];
        let accepted: Vec<usize> = scratch.mass_bins.iter().collect();
        let intensities = &scratch.mass_intensities;

        let mut groups = Vec::new();
        for (i, &mass_bin) in accepted.iter().enumerate() {
            let intensity = intensities[mass_bin];
            if !self.is_isotope_local_max(mass_bin, intensity, intensities) {
                continue;
            }
            if i > 0 {
                let lower = accepted[i - 1];
                if lower + 1 == mass_bin && intensities[lower] >= intensity {
                    continue;
                }
            }
            if let Some(upper) = accepted.get(i + 1) {
                if *upper == mass_bin + 1 && intensities[*upper] > intensity {
                    continue;
                }
            }
            let Some((j_min, j_max)) = ranges.charge_span(mass_bin) else {
                continue;
            };

            let mass = self.mass_space.value_of(mass_bin).exp();
            let left = self.model.left_count(mass);
            let right = self.model.right_count(mass);

            let mut pooled = Vec::new();
            let mut noise_power = IndexMap::new();
            for j in j_min..=j_max.min(self.charges.len() - 1) {
                let Some(mz_bin) = self.offsets.mz_bin(mass_bin, j) else {
                    continue;
                };
                if ranges.mz_charge(mz_bin).is_some_and(|owner| owner != j) {
                    continue;
                }
                let Some(anchor) = self.find_anchor(mz_bin, &mut cursors[j], &peak_bins) else {
                    continue;
                };
                let z = self.charges[j];
                let noise = self.walk_isotopes(anchor, z, left, right, &mut pooled);
                noise_power.insert(z, noise);
            }

            if let Some(group) =
                PeakGroup::from_pooled_peaks(mass_bin, pooled, noise_power, self.tolerance)
            {
                groups.push(group);
            }
        }
        log::trace!(
            "Assembled {} peak groups from {} mass bins",
            groups.len(),
            accepted.len()
        );
        groups
    }

    /// The strongest mass intensity within one bin of `mass`, zero outside the
    /// mass space
    fn neighborhood_max(&self, mass: f64, intensities: &[f32]) -> f32 {
        if mass <= 0.0 {
            return 0.0;
        }
        let Some(center) = self.mass_space.get(mass.ln()) else {
            return 0.0;
        };
        (center.saturating_sub(1)..=center + 1)
            .filter_map(|b| intensities.get(b).copied())
            .fold(0.0f32, f32::max)
    }

    /// A mass bin is kept only if a neighboring isotope position carries intensity
    /// and neither neighbor is stronger than it
    fn is_isotope_local_max(&self, mass_bin: usize, intensity: f32, intensities: &[f32]) -> bool {
        let mass = self.mass_space.value_of(mass_bin).exp();
        let below = self.neighborhood_max(mass - ISOTOPE_MASSDIFF, intensities);
        let above = self.neighborhood_max(mass + ISOTOPE_MASSDIFF, intensities);
        if below <= 0.0 && above <= 0.0 {
            return false;
        }
        below <= intensity && above <= intensity
    }

    /// The most intense peak whose m/z bin is within one of `mz_bin`.
    ///
    /// Mass bins are visited in ascending order, so for a fixed charge the target
    /// m/z bins ascend too and `cursor` never has to move backwards.
    fn find_anchor(
        &self,
        mz_bin: usize,
        cursor: &mut usize,
        peak_bins: &[Option<usize>],
    ) -> Option<usize> {
        let lo = mz_bin.saturating_sub(1);
        let hi = mz_bin + 1;
        while *cursor < peak_bins.len() && peak_bins[*cursor].map_or(true, |b| b < lo) {
            *cursor += 1;
        }
        let mut best: Option<usize> = None;
        for (i, bin) in peak_bins.iter().enumerate().skip(*cursor) {
            match bin {
                Some(b) if *b <= hi => {}
                Some(_) => break,
                None => continue,
            }
            if best.map_or(true, |k| self.peaks[i].intensity > self.peaks[k].intensity) {
                best = Some(i);
            }
        }
        best
    }

    /// The most intense peak within `width` of `mz`
    fn closest_peak(&self, mz: f64, width: f64) -> Option<usize> {
        let start = self.peaks.partition_point(|p| p.mz < mz - width);
        self.peaks[start..]
            .iter()
            .take_while(|p| p.mz <= mz + width)
            .enumerate()
            .max_by(|(_, a), (_, b)| a.intensity.total_cmp(&b.intensity))
            .map(|(i, _)| start + i)
    }

    /// Collect the isotope series of charge `z` around `anchor` into `pooled` and
    /// return the summed squared intensity of unmatched peaks inside its span
    fn walk_isotopes(
        &self,
        anchor: usize,
        z: i32,
        left: usize,
        right: usize,
        pooled: &mut Vec<LogMzPeak>,
    ) -> f64 {
        let anchor_peak = &self.peaks[anchor];
        let mz = anchor_peak.mz;
        let step = ISOTOPE_MASSDIFF / z.abs() as f64;
        let width = self.tolerance * mz * 2.0;

        let mut matched = vec![anchor];
        pooled.push(anchor_peak.assign(z, 0));
        let mut lowest = mz;
        let mut highest = mz;

        for (direction, bound) in [(-1i32, left), (1i32, right)] {
            let mut misses = 0;
            for i in 1..=bound as i32 {
                let expected = mz + (direction * i) as f64 * step;
                match self.closest_peak(expected, width) {
                    Some(k) => {
                        misses = 0;
                        if !matched.contains(&k) {
                            matched.push(k);
                            pooled.push(self.peaks[k].assign(z, direction * i));
                        }
                        lowest = lowest.min(self.peaks[k].mz);
                        highest = highest.max(self.peaks[k].mz);
                    }
                    None => {
                        misses += 1;
                        if misses > self.max_missing {
                            break;
                        }
                    }
                }
            }
        }

        let start = self.peaks.partition_point(|p| p.mz < lowest - width);
        self.peaks[start..]
            .iter()
            .enumerate()
            .take_while(|(_, p)| p.mz <= highest + width)
            .filter(|(i, _)| !matched.contains(&(start + i)))
            .map(|(_, p)| (p.intensity as f64).powi(2))
            .sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::averagine::PrecomputedAveragine;
    use crate::deconvolution::candidates::test::{prepare, sweep, Prepared};
    use crate::deconvolution::resolver::ChargeResolver;
    use crate::params::DeconvolutionParams;
    use crate::utils::mass_charge_ratio;

    fn assemble(params: &DeconvolutionParams, peaks: &[(f64, f32)]) -> Vec<PeakGroup> {
        let mut prepared: Prepared = prepare(params, peaks);
        sweep(params, &mut prepared, 1);
        let mut ranges = ChargeRanges::new(
            prepared
                .scratch
                .mass_intensities
                .len()
                .max(prepared.scratch.mz_intensities.len()),
        )
        .unwrap();
        ChargeResolver {
            offsets: &prepared.offsets,
            charge_count: prepared.filters.len(),
            bin_start: 0,
            bin_end: prepared.mass_space.len(),
            record_mz_charges: true,
        }
        .resolve(&mut prepared.scratch, &mut ranges);

        let mut log_peaks: Vec<LogMzPeak> = peaks
            .iter()
            .enumerate()
            .map(|(i, (mz, inten))| LogMzPeak::new(*mz, *inten, i as u32, 1))
            .collect();
        log_peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        let model = PrecomputedAveragine::with_max_mass(5_000.0);
        let assembler = PeakGroupAssembler {
            peaks: &log_peaks,
            mz_space: &prepared.mz_space,
            mass_space: &prepared.mass_space,
            offsets: &prepared.offsets,
            charges: &prepared.filters.charges,
            model: &model,
            tolerance: params.tolerance(1),
            max_missing: params.max_missing_isotopes,
        };
        assembler.assemble(&prepared.scratch, &ranges)
    }

    fn two_charge_envelope(mass: f64) -> Vec<(f64, f32)> {
        vec![
            (mass_charge_ratio(mass, 2), 100.0),
            (mass_charge_ratio(mass + ISOTOPE_MASSDIFF, 2), 60.0),
            (mass_charge_ratio(mass + 2.0 * ISOTOPE_MASSDIFF, 2), 20.0),
            (mass_charge_ratio(mass, 3), 90.0),
            (mass_charge_ratio(mass + ISOTOPE_MASSDIFF, 3), 55.0),
        ]
    }

    #[test_log::test]
    fn test_assemble_two_charges() {
        let params = DeconvolutionParams::default()
            .with_charge_range(1, 4)
            .with_min_continuous_charge_peak_count(vec![2]);
        let mass = 1000.0;
        let groups = assemble(&params, &two_charge_envelope(mass));
        assert_eq!(groups.len(), 1, "{groups:?}");
        let group = &groups[0];
        assert_eq!(group.charges(), vec![2, 3]);
        assert_eq!(group.len(), 5);
        assert!((group.monoisotopic_mass - mass).abs() < 0.01);

        let z2: Vec<i32> = group.iter().filter(|p| p.charge == 2).map(|p| p.isotope_index).collect();
        assert_eq!(z2, vec![0, 1, 2]);
        let z3: Vec<i32> = group.iter().filter(|p| p.charge == 3).map(|p| p.isotope_index).collect();
        assert_eq!(z3, vec![0, 1]);
        assert_eq!(group.charge_stats[&2].noise_power, 0.0);
    }

    #[test]
    fn test_unique_charge_isotope_slots() {
        let params = DeconvolutionParams::default()
            .with_charge_range(1, 4)
            .with_min_continuous_charge_peak_count(vec![2]);
        let groups = assemble(&params, &two_charge_envelope(1000.0));
        for group in groups.iter() {
            let mut slots: Vec<(i32, i32)> = group.iter().map(|p| (p.charge, p.isotope_index)).collect();
            let n = slots.len();
            slots.sort();
            slots.dedup();
            assert_eq!(slots.len(), n);
            assert_eq!(group.iter().map(|p| p.isotope_index).min(), Some(0));
        }
    }

    #[test]
    fn test_isolated_mass_is_dropped() {
        let params = DeconvolutionParams::default()
            .with_charge_range(1, 4)
            .with_min_continuous_charge_peak_count(vec![2]);
        // Two charge states but no isotope peaks at all
        let mass = 1000.0;
        let peaks = vec![
            (mass_charge_ratio(mass, 2), 100.0),
            (mass_charge_ratio(mass, 3), 90.0),
        ];
        assert!(assemble(&params, &peaks).is_empty());
    }

    #[test]
    fn test_low_edge_mass_needs_isotope_neighbor() {
        let params = DeconvolutionParams::default().with_charge_range(1, 4);
        let mass = 1000.0;
        let prepared = prepare(&params, &[(mass_charge_ratio(mass, 1), 100.0)]);
        let model = PrecomputedAveragine::with_max_mass(5_000.0);
        let assembler = PeakGroupAssembler {
            peaks: &[],
            mz_space: &prepared.mz_space,
            mass_space: &prepared.mass_space,
            offsets: &prepared.offsets,
            charges: &prepared.filters.charges,
            model: &model,
            tolerance: params.tolerance(1),
            max_missing: params.max_missing_isotopes,
        };
        assert_eq!(prepared.mass_space.bin_of(mass.ln()), 0);

        // The isotope below the first mass bin lies outside the mass space
        let mut intensities = vec![0.0f32; prepared.mass_space.len()];
        intensities[0] = 100.0;
        assert!(!assembler.is_isotope_local_max(0, 100.0, &intensities));

        let above = prepared.mass_space.bin_of((mass + ISOTOPE_MASSDIFF).ln());
        intensities[above] = 50.0;
        assert!(assembler.is_isotope_local_max(0, 100.0, &intensities));
    }
}
