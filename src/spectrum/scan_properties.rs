use crate::utils::neutral_mass;

/// Common behavior of anything describing an ion with a (possibly unknown) charge
pub trait IonProperties {
    fn mz(&self) -> f64;
    fn neutral_mass(&self) -> f64;
    fn charge(&self) -> Option<i32>;
    fn has_charge(&self) -> bool {
        self.charge().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Describes the precursor ion a fragment spectrum was produced from
pub struct SelectedIon {
    /// The selected ion's m/z as reported, may not be the monoisotopic peak.
    pub mz: f64,
    pub intensity: f32,
    /// The reported precursor ion's charge state. May be absent in
    /// some source files.
    pub charge: Option<i32>,
}

impl SelectedIon {
    pub fn new(mz: f64, intensity: f32, charge: Option<i32>) -> Self {
        Self {
            mz,
            intensity,
            charge,
        }
    }
}

impl IonProperties for SelectedIon {
    fn mz(&self) -> f64 {
        self.mz
    }

    fn neutral_mass(&self) -> f64 {
        let charge = self.charge.unwrap_or(1);
        neutral_mass(self.mz, charge)
    }

    fn charge(&self) -> Option<i32> {
        self.charge
    }
}

/**
Describes the polarity of a mass spectrum. A spectrum is either `Positive` (1+), `Negative` (-1)
or `Unknown` (0). The `Unknown` state is the default.
*/
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScanPolarity {
    #[default]
    Unknown = 0,
    Positive = 1,
    Negative = -1,
}

impl ScanPolarity {
    /// The sign of the charges expected in a spectrum of this polarity
    pub fn sign(&self) -> Option<i32> {
        match self {
            Self::Unknown => None,
            Self::Positive => Some(1),
            Self::Negative => Some(-1),
        }
    }
}

/**
The metadata of a spectrum that the deconvolution engine depends upon or carries
through to its output.
*/
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectrumDescription {
    pub id: String,
    pub index: usize,
    pub ms_level: u8,
    pub polarity: ScanPolarity,
    pub precursor: Option<SelectedIon>,
}

impl SpectrumDescription {
    pub fn new(id: String, index: usize, ms_level: u8, polarity: ScanPolarity) -> Self {
        Self {
            id,
            index,
            ms_level,
            polarity,
            precursor: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::{isclose, mass_charge_ratio};

    #[test]
    fn test_selected_ion() {
        let ion = SelectedIon::new(mass_charge_ratio(1500.0, 3), 1e4, Some(3));
        assert!(isclose(ion.neutral_mass(), 1500.0, 1e-6));
        assert!(ion.has_charge());

        let ion = SelectedIon::new(mass_charge_ratio(1500.0, -2), 1e4, Some(-2));
        assert!(isclose(ion.neutral_mass(), 1500.0, 1e-6));

        let unknown = SelectedIon::new(501.0, 1e4, None);
        assert!(!unknown.has_charge());
    }

    #[test]
    fn test_polarity() {
        assert_eq!(ScanPolarity::default(), ScanPolarity::Unknown);
        assert_eq!(ScanPolarity::Negative.sign(), Some(-1));
        assert_eq!(ScanPolarity::Unknown.sign(), None);
    }
}
