//! The spectral deconvolution engine.
//!
//! A spectrum is processed in a fixed sequence of stages, each living in its own
//! submodule:
//!
//! 1. peaks are mapped into a log-domain m/z bin space ([`scratch`])
//! 2. for MS1 spectra, mass bins accepted in recent spectra are carried forward ([`history`])
//! 3. every occupied m/z bin is tested against every charge hypothesis using the
//!    precomputed bin offsets of [`filters`] to find candidate mass bins ([`candidates`])
//! 4. each m/z bin is assigned to its single best candidate mass bin ([`resolver`])
//! 5. isotope series are collected from the original peaks for every accepted mass
//!    bin to build [`PeakGroup`](crate::peaks::PeakGroup)s ([`assembler`])
//! 6. the groups are scored and filtered by a [`PeakGroupScorer`](crate::scoring::PeakGroupScorer)
//!
//! [`DeconvolutionSession`] drives these stages and owns all state carried between
//! spectra.
use std::collections::TryReserveError;

use thiserror::Error;

use crate::params::ParamError;

pub mod assembler;
pub mod candidates;
pub mod engine;
pub mod filters;
pub mod history;
pub mod resolver;
pub mod scratch;

pub use engine::{deconvolve_runs, DeconvolutionSession};
pub use filters::{BinOffsets, PatternFilters};
pub use history::{ContinuityHistory, HistoryEntry};
pub use resolver::ChargeRanges;

/// Errors that abort the processing of a spectrum
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeconvolutionError {
    #[error("Invalid deconvolution parameters: {0}")]
    InvalidParameters(
        #[from]
        #[source]
        ParamError,
    ),
    #[error("Failed to allocate {requested} elements for {what}")]
    AllocationFailed { what: &'static str, requested: usize },
    #[error("MS level {0} is not supported, levels start at 1")]
    UnsupportedMSLevel(u8),
}

impl DeconvolutionError {
    pub(crate) fn allocation(what: &'static str, requested: usize) -> impl Fn(TryReserveError) -> Self {
        move |_| Self::AllocationFailed { what, requested }
    }
}
