//! Minimal spectrum representations consumed and produced by the deconvolution
//! engine
pub mod scan_properties;
pub mod spectrum_types;

pub use crate::spectrum::scan_properties::{
    IonProperties, ScanPolarity, SelectedIon, SpectrumDescription,
};
pub use crate::spectrum::spectrum_types::{
    CentroidSpectrum, CentroidSpectrumType, DeconvolvedSpectrum, SpectrumLike,
};
