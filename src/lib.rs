//! `mzflash` deconvolves centroided mass spectra of multiply charged analytes into
//! neutral mass peak groups.
//!
//! Peaks are moved into log(m/z) space where every charge state of an analyte is a
//! constant shift away from its neutral mass. Charge hypotheses can then be tested
//! with integer bin arithmetic, harmonic artifacts recognized by their own shifts,
//! and masses seen in recent spectra carried forward to boost sensitivity.
//!
//! ```no_run
//! use mzflash::prelude::*;
//! use mzflash::{DeconvolutionParams, DeconvolutionSession, CentroidSpectrum};
//!
//! # fn load() -> Vec<CentroidSpectrum> { Vec::new() }
//! let params = DeconvolutionParams::default().with_charge_range(1, 50);
//! let mut session = DeconvolutionSession::new(params).unwrap();
//! for spectrum in load() {
//!     let deconvolved = session.deconvolve_spectrum(&spectrum).unwrap();
//!     for group in deconvolved.iter() {
//!         println!("{} {}", spectrum.id(), group);
//!     }
//! }
//! ```
pub mod averagine;
pub mod binning;
pub mod deconvolution;
pub mod params;
pub mod peaks;
pub mod prelude;
pub mod scoring;
pub mod spectrum;
pub mod utils;

pub use crate::averagine::{IsotopeEnvelopeModel, PrecomputedAveragine};
pub use crate::deconvolution::{deconvolve_runs, DeconvolutionError, DeconvolutionSession};
pub use crate::params::{DeconvolutionParams, ParamError};
pub use crate::peaks::{ChargeStats, LogMzPeak, PeakGroup};
pub use crate::scoring::{AveragineScorer, PassThroughScorer, PeakGroupScorer, ScoringContext};
pub use crate::spectrum::{
    CentroidSpectrum, CentroidSpectrumType, DeconvolvedSpectrum, ScanPolarity, SelectedIon,
    SpectrumDescription,
};
