use mzpeaks::{
    peak_set::PeakSetVec, CentroidLike, CentroidPeak, DeconvolutedPeakSet, MZPeakSetType,
    PeakCollection,
};

use crate::peaks::PeakGroup;
use crate::spectrum::scan_properties::{ScanPolarity, SelectedIon, SpectrumDescription};

/// A trait for providing a uniform delegated access to spectrum metadata
pub trait SpectrumLike {
    /// The method to access the spectrum description itself, which supplies
    /// the data for most other methods on this trait.
    fn description(&self) -> &SpectrumDescription;

    /// The method to access the spectrum description itself, mutably.
    fn description_mut(&mut self) -> &mut SpectrumDescription;

    /// Access the precursor information, if it exists.
    #[inline]
    fn precursor(&self) -> Option<&SelectedIon> {
        self.description().precursor.as_ref()
    }

    /// Access the MS exponentiation level
    #[inline]
    fn ms_level(&self) -> u8 {
        self.description().ms_level
    }

    /// Access the native ID string for the spectrum
    #[inline]
    fn id(&self) -> &str {
        &self.description().id
    }

    /// Access the index of the spectrum in the source file
    #[inline]
    fn index(&self) -> usize {
        self.description().index
    }

    /// Access the polarity of the spectrum
    #[inline]
    fn polarity(&self) -> ScanPolarity {
        self.description().polarity
    }
}

/// Represents a spectrum that has been centroided
#[derive(Debug, Clone)]
pub struct CentroidSpectrumType<C: CentroidLike = CentroidPeak> {
    /// The spectrum metadata describing acquisition conditions and details.
    pub description: SpectrumDescription,
    /// The picked centroid peaks
    pub peaks: MZPeakSetType<C>,
}

pub type CentroidSpectrum = CentroidSpectrumType<CentroidPeak>;

impl<C: CentroidLike> Default for CentroidSpectrumType<C> {
    fn default() -> Self {
        Self {
            description: Default::default(),
            peaks: PeakSetVec::empty(),
        }
    }
}

impl<C: CentroidLike> SpectrumLike for CentroidSpectrumType<C> {
    #[inline]
    fn description(&self) -> &SpectrumDescription {
        &self.description
    }

    fn description_mut(&mut self) -> &mut SpectrumDescription {
        &mut self.description
    }
}

impl<C: CentroidLike> CentroidSpectrumType<C> {
    pub fn new(description: SpectrumDescription, peaks: MZPeakSetType<C>) -> Self {
        Self { description, peaks }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.len() == 0
    }
}

/// The peak groups found in one spectrum, along with that spectrum's metadata
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeconvolvedSpectrum {
    pub description: SpectrumDescription,
    pub groups: Vec<PeakGroup>,
}

impl SpectrumLike for DeconvolvedSpectrum {
    #[inline]
    fn description(&self) -> &SpectrumDescription {
        &self.description
    }

    fn description_mut(&mut self) -> &mut SpectrumDescription {
        &mut self.description
    }
}

impl DeconvolvedSpectrum {
    pub fn new(description: SpectrumDescription, groups: Vec<PeakGroup>) -> Self {
        Self {
            description,
            groups,
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PeakGroup> {
        self.groups.iter()
    }

    /// Flatten the peak groups into one neutral mass peak per charge state of
    /// each group
    pub fn to_deconvoluted_peaks(&self) -> DeconvolutedPeakSet {
        let peaks = self
            .groups
            .iter()
            .flat_map(|g| g.to_deconvoluted_peaks())
            .collect();
        DeconvolutedPeakSet::new(peaks)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use mzpeaks::PeakSet;

    use super::*;
    use crate::utils::{mass_charge_ratio, ISOTOPE_MASSDIFF};

    /// One charge state of a synthetic analyte: its charge and the intensities of
    /// its isotope peaks starting from the monoisotopic peak
    pub(crate) type ChargeSeries<'a> = (i32, &'a [f32]);

    /// Lay out the isotope series of each analyte as centroid peaks
    pub(crate) fn synthetic_peaks(analytes: &[(f64, &[ChargeSeries])]) -> Vec<CentroidPeak> {
        let mut peaks = Vec::new();
        for (mass, series) in analytes {
            for (z, intensities) in series.iter() {
                for (i, intensity) in intensities.iter().enumerate() {
                    let m = mass + i as f64 * ISOTOPE_MASSDIFF;
                    peaks.push(CentroidPeak::new(mass_charge_ratio(m, *z), *intensity, 0));
                }
            }
        }
        peaks
    }

    pub(crate) fn synthetic_spectrum(
        index: usize,
        ms_level: u8,
        analytes: &[(f64, &[ChargeSeries])],
    ) -> CentroidSpectrum {
        let description = SpectrumDescription::new(
            format!("scan={}", index + 1),
            index,
            ms_level,
            ScanPolarity::Positive,
        );
        CentroidSpectrum::new(description, PeakSet::new(synthetic_peaks(analytes)))
    }

    #[test]
    fn test_synthetic_spectrum() {
        let spectrum = synthetic_spectrum(
            3,
            1,
            &[(1000.0, &[(2, &[100.0, 60.0][..]), (3, &[90.0][..])][..])],
        );
        assert_eq!(spectrum.len(), 3);
        assert_eq!(spectrum.index(), 3);
        assert_eq!(spectrum.id(), "scan=4");
        assert_eq!(spectrum.ms_level(), 1);
        assert!(spectrum.precursor().is_none());
        // sorted by m/z
        let mzs: Vec<f64> = spectrum.peaks.iter().map(|p| p.mz).collect();
        assert!(mzs.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_deconvolved() {
        let spectrum = DeconvolvedSpectrum::default();
        assert!(spectrum.is_empty());
        assert_eq!(spectrum.to_deconvoluted_peaks().len(), 0);
    }
}
