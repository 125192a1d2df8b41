//! Configuration for the deconvolution engine.
//!
//! Several thresholds are given per MS level. They are indexed by `ms_level - 1`,
//! and the last entry is reused for any deeper level.
use thiserror::Error;

/// Charge hypotheses are indexed with `u16`, and `u16::MAX` marks an unset index
pub const MAX_CHARGE_HYPOTHESES: usize = u16::MAX as usize;

/// Errors found while validating a [`DeconvolutionParams`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("The charge range cannot include zero")]
    ZeroCharge,
    #[error("The charge bounds {0} and {1} must share a sign")]
    MixedPolarity(i32, i32),
    #[error("The minimum charge magnitude {0} exceeds the maximum {1}")]
    InvertedChargeRange(i32, i32),
    #[error("The mass range [{0}, {1}] is empty or not positive")]
    InvalidMassRange(f64, f64),
    #[error("Mass tolerance must be a positive number of PPM, got {0}")]
    InvalidTolerance(f64),
    #[error("The intensity ratio factor must be greater than 1, got {0}")]
    InvalidRatioFactor(f64),
    #[error("{0} charge hypotheses requested, at most {max} are supported", max = MAX_CHARGE_HYPOTHESES)]
    TooManyCharges(usize),
    #[error("The per-MS level parameter {0} has no entries")]
    EmptyPerLevel(&'static str),
}

/// Parameters controlling a [`DeconvolutionSession`](crate::deconvolution::DeconvolutionSession).
///
/// Charges are signed. Negative mode analysis uses negative bounds, e.g. `min_charge = -1`
/// and `max_charge = -20`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeconvolutionParams {
    pub min_charge: i32,
    pub max_charge: i32,
    pub min_mass: f64,
    pub max_mass: f64,
    /// Peaks at or below this intensity are ignored
    pub intensity_threshold: f32,
    /// Mass accuracy in parts-per-million, per MS level
    pub tolerance_ppm: Vec<f64>,
    /// The number of consecutive charge states a mass must be observed in, per MS level
    pub min_continuous_charge_peak_count: Vec<usize>,
    pub min_isotope_cosine: Vec<f64>,
    pub min_charge_cosine: Vec<f64>,
    /// The maximum number of masses to report, per MS level. Non-positive values mean unlimited.
    pub max_mass_count: Vec<i64>,
    /// The number of previous MS1 spectra whose masses are carried forward
    pub num_overlapped_scans: usize,
    /// The harmonic ratios tested against each charge state
    pub harmonic_charges: Vec<i32>,
    /// The largest intensity ratio between peaks of the same analyte in adjacent charge states
    pub intensity_ratio_factor: f64,
    /// The number of consecutive missing isotope peaks tolerated while walking an isotope series
    pub max_missing_isotopes: usize,
    /// Whether water and ammonia losses count as supporting evidence in MSn spectra
    pub use_neutral_losses: bool,
}

impl Default for DeconvolutionParams {
    fn default() -> Self {
        Self {
            min_charge: 1,
            max_charge: 100,
            min_mass: 50.0,
            max_mass: 100_000.0,
            intensity_threshold: 0.0,
            tolerance_ppm: vec![10.0, 10.0],
            min_continuous_charge_peak_count: vec![3, 1],
            min_isotope_cosine: vec![0.75, 0.75],
            min_charge_cosine: vec![0.5, 0.5],
            max_mass_count: vec![-1, -1],
            num_overlapped_scans: 15,
            harmonic_charges: vec![2, 3, 5],
            intensity_ratio_factor: 4.0,
            max_missing_isotopes: 2,
            use_neutral_losses: true,
        }
    }
}

#[inline]
fn per_level<T: Copy>(values: &[T], ms_level: u8) -> Option<T> {
    let i = (ms_level.max(1) - 1) as usize;
    values.get(i).or_else(|| values.last()).copied()
}

impl DeconvolutionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_charge_range(mut self, min_charge: i32, max_charge: i32) -> Self {
        self.min_charge = min_charge;
        self.max_charge = max_charge;
        self
    }

    pub fn with_mass_range(mut self, min_mass: f64, max_mass: f64) -> Self {
        self.min_mass = min_mass;
        self.max_mass = max_mass;
        self
    }

    pub fn with_intensity_threshold(mut self, threshold: f32) -> Self {
        self.intensity_threshold = threshold;
        self
    }

    pub fn with_tolerance_ppm(mut self, tolerance: Vec<f64>) -> Self {
        self.tolerance_ppm = tolerance;
        self
    }

    pub fn with_min_continuous_charge_peak_count(mut self, counts: Vec<usize>) -> Self {
        self.min_continuous_charge_peak_count = counts;
        self
    }

    pub fn with_min_isotope_cosine(mut self, cosines: Vec<f64>) -> Self {
        self.min_isotope_cosine = cosines;
        self
    }

    pub fn with_min_charge_cosine(mut self, cosines: Vec<f64>) -> Self {
        self.min_charge_cosine = cosines;
        self
    }

    pub fn with_max_mass_count(mut self, counts: Vec<i64>) -> Self {
        self.max_mass_count = counts;
        self
    }

    pub fn with_num_overlapped_scans(mut self, num_overlapped_scans: usize) -> Self {
        self.num_overlapped_scans = num_overlapped_scans;
        self
    }

    pub fn with_harmonic_charges(mut self, harmonic_charges: Vec<i32>) -> Self {
        self.harmonic_charges = harmonic_charges;
        self
    }

    pub fn with_intensity_ratio_factor(mut self, factor: f64) -> Self {
        self.intensity_ratio_factor = factor;
        self
    }

    pub fn with_neutral_losses(mut self, use_neutral_losses: bool) -> Self {
        self.use_neutral_losses = use_neutral_losses;
        self
    }

    /// Check the parameters for internal consistency
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.min_charge == 0 || self.max_charge == 0 {
            return Err(ParamError::ZeroCharge);
        }
        if self.min_charge.signum() != self.max_charge.signum() {
            return Err(ParamError::MixedPolarity(self.min_charge, self.max_charge));
        }
        if self.min_charge.abs() > self.max_charge.abs() {
            return Err(ParamError::InvertedChargeRange(
                self.min_charge,
                self.max_charge,
            ));
        }
        if self.charge_span() > MAX_CHARGE_HYPOTHESES {
            return Err(ParamError::TooManyCharges(self.charge_span()));
        }
        if !(self.min_mass > 0.0 && self.min_mass < self.max_mass && self.max_mass.is_finite()) {
            return Err(ParamError::InvalidMassRange(self.min_mass, self.max_mass));
        }
        if self.tolerance_ppm.is_empty() {
            return Err(ParamError::EmptyPerLevel("tolerance_ppm"));
        }
        if let Some(bad) = self.tolerance_ppm.iter().find(|t| !(**t > 0.0)) {
            return Err(ParamError::InvalidTolerance(*bad));
        }
        if self.min_continuous_charge_peak_count.is_empty() {
            return Err(ParamError::EmptyPerLevel("min_continuous_charge_peak_count"));
        }
        if !(self.intensity_ratio_factor > 1.0) {
            return Err(ParamError::InvalidRatioFactor(self.intensity_ratio_factor));
        }
        Ok(())
    }

    /// The sign shared by every charge state considered
    #[inline]
    pub fn charge_sign(&self) -> i32 {
        self.min_charge.signum()
    }

    /// The number of charge hypotheses tested
    #[inline]
    pub fn charge_span(&self) -> usize {
        (self.max_charge.abs() - self.min_charge.abs() + 1).max(0) as usize
    }

    /// The signed charge of charge hypothesis `j`
    #[inline]
    pub fn charge_of(&self, j: usize) -> i32 {
        self.min_charge + self.charge_sign() * j as i32
    }

    /// The relative mass tolerance for `ms_level`
    pub fn tolerance(&self, ms_level: u8) -> f64 {
        per_level(&self.tolerance_ppm, ms_level).unwrap_or(10.0) * 1e-6
    }

    /// The number of bins per unit of log-value for `ms_level`
    pub fn bin_density(&self, ms_level: u8) -> f64 {
        1.0 / self.tolerance(ms_level)
    }

    pub fn min_continuous_charge_peak_count(&self, ms_level: u8) -> usize {
        per_level(&self.min_continuous_charge_peak_count, ms_level)
            .unwrap_or(1)
            .max(1)
    }

    pub fn min_isotope_cosine(&self, ms_level: u8) -> f64 {
        per_level(&self.min_isotope_cosine, ms_level).unwrap_or(0.0)
    }

    pub fn min_charge_cosine(&self, ms_level: u8) -> f64 {
        per_level(&self.min_charge_cosine, ms_level).unwrap_or(0.0)
    }

    /// The maximum number of masses to report, `None` meaning unlimited
    pub fn max_mass_count(&self, ms_level: u8) -> Option<usize> {
        match per_level(&self.max_mass_count, ms_level) {
            Some(n) if n > 0 => Some(n as usize),
            _ => None,
        }
    }

    /// The harmonic ratios actually usable, dropping anything that cannot
    /// describe a harmonic
    pub fn usable_harmonics(&self) -> Vec<i32> {
        self.harmonic_charges
            .iter()
            .copied()
            .filter(|h| {
                if *h < 2 {
                    log::warn!("Ignoring harmonic ratio {h}, harmonics must be at least 2");
                    false
                } else {
                    true
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let params = DeconvolutionParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.charge_span(), 100);
        assert_eq!(params.charge_of(0), 1);
        assert_eq!(params.charge_of(99), 100);
        assert_eq!(params.min_continuous_charge_peak_count(1), 3);
        assert_eq!(params.min_continuous_charge_peak_count(2), 1);
        assert_eq!(params.min_continuous_charge_peak_count(5), 1);
        assert_eq!(params.max_mass_count(1), None);
        assert!((params.bin_density(1) - 1e5).abs() < 1e-6);
    }

    #[test]
    fn test_negative_mode() {
        let params = DeconvolutionParams::default().with_charge_range(-2, -10);
        assert!(params.validate().is_ok());
        assert_eq!(params.charge_span(), 9);
        assert_eq!(params.charge_of(0), -2);
        assert_eq!(params.charge_of(8), -10);
    }

    #[test]
    fn test_invalid() {
        let params = DeconvolutionParams::default().with_charge_range(0, 5);
        assert_eq!(params.validate(), Err(ParamError::ZeroCharge));
        let params = DeconvolutionParams::default().with_charge_range(-1, 5);
        assert_eq!(params.validate(), Err(ParamError::MixedPolarity(-1, 5)));
        let params = DeconvolutionParams::default().with_charge_range(6, 5);
        assert_eq!(params.validate(), Err(ParamError::InvertedChargeRange(6, 5)));
        let params = DeconvolutionParams::default().with_mass_range(100.0, 10.0);
        assert!(matches!(
            params.validate(),
            Err(ParamError::InvalidMassRange(..))
        ));
        let params = DeconvolutionParams::default().with_tolerance_ppm(vec![]);
        assert_eq!(
            params.validate(),
            Err(ParamError::EmptyPerLevel("tolerance_ppm"))
        );
        let params = DeconvolutionParams::default().with_mass_range(100.0, f64::INFINITY);
        assert!(matches!(
            params.validate(),
            Err(ParamError::InvalidMassRange(..))
        ));
        let params = DeconvolutionParams::default().with_intensity_ratio_factor(1.0);
        assert_eq!(params.validate(), Err(ParamError::InvalidRatioFactor(1.0)));
    }

    #[test]
    fn test_charge_hypothesis_limit() {
        let params = DeconvolutionParams::default().with_charge_range(1, 65_535);
        assert!(params.validate().is_ok());
        let params = DeconvolutionParams::default().with_charge_range(1, 65_536);
        assert_eq!(params.validate(), Err(ParamError::TooManyCharges(65_536)));
        let params = DeconvolutionParams::default().with_charge_range(-2, -65_537);
        assert_eq!(params.validate(), Err(ParamError::TooManyCharges(65_536)));
    }

    #[test_log::test]
    fn test_usable_harmonics() {
        let params = DeconvolutionParams::default().with_harmonic_charges(vec![1, 2, 3]);
        assert_eq!(params.usable_harmonics(), vec![2, 3]);
    }
}
