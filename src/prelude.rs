//! Traits needed to work with spectra, isotope models and scorers
pub use crate::averagine::IsotopeEnvelopeModel;
pub use crate::scoring::PeakGroupScorer;
pub use crate::spectrum::{IonProperties, SpectrumLike};
