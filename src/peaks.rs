//! Peak types used while deconvolving a spectrum
pub mod log_mz;
pub mod peak_group;

pub use crate::peaks::log_mz::LogMzPeak;
pub use crate::peaks::peak_group::{ChargeStats, PeakGroup};
