//! Discretization of log-domain values into integer bins.
//!
//! Both m/z and neutral mass are binned in log space with the same density, so
//! converting between an m/z bin and the mass bin implied by a charge state is
//! a constant integer shift.
pub mod bins;
pub mod bitset;

pub use bins::{bin_of, value_of, BinSpace};
pub use bitset::{BinSet, BinSetIter};
