//! Expected isotopic envelopes as a function of neutral mass.
//!
//! The deconvolution engine only needs coarse answers from the isotope model: how
//! many isotope peaks to expect on either side of the most abundant one, and the
//! shape of the envelope for scoring. [`PrecomputedAveragine`] answers both from a
//! table of envelopes computed once for fixed-width mass buckets.
use crate::utils::ISOTOPE_MASSDIFF;

/// The elemental composition of the averagine residue per 111.1254 Da
const AVERAGINE_RESIDUE_MASS: f64 = 111.1254;
const AVERAGINE_CARBON: f64 = 4.9384;
const AVERAGINE_HYDROGEN: f64 = 7.7583;
const AVERAGINE_NITROGEN: f64 = 1.3577;
const AVERAGINE_OXYGEN: f64 = 1.4773;
const AVERAGINE_SULFUR: f64 = 0.0417;

/// Natural abundances of isotopes one neutron heavier than the lightest
const C13: f64 = 0.0107;
const H2: f64 = 0.000115;
const N15: f64 = 0.00364;
const O17: f64 = 0.00038;
const S33: f64 = 0.0075;

/// Natural abundances of isotopes two neutrons heavier than the lightest
const O18: f64 = 0.00205;
const S34: f64 = 0.0421;

/// The source of expected isotope envelopes used to bound isotope series and to
/// score assembled peak groups.
pub trait IsotopeEnvelopeModel {
    /// Relative abundances, starting at the monoisotopic peak, with the apex scaled to 1
    fn envelope(&self, mass: f64) -> &[f64];

    /// The isotope index of the most abundant peak
    fn apex_index(&self, mass: f64) -> usize;

    /// The number of isotope peaks below the apex carrying non-negligible abundance
    fn left_count(&self, mass: f64) -> usize;

    /// The number of isotope peaks above the apex carrying non-negligible abundance
    fn right_count(&self, mass: f64) -> usize;

    /// The mass difference between the apex and the monoisotopic peak
    fn apex_mass_delta(&self, mass: f64) -> f64 {
        self.apex_index(mass) as f64 * ISOTOPE_MASSDIFF
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Envelope {
    abundances: Vec<f64>,
    apex: usize,
    left: usize,
    right: usize,
}

/// Poisson probabilities for `lambda` relative to the mode, generated until the tail
/// falls below `floor`.
///
/// Terms are accumulated in log space since `exp(-lambda)` underflows for very
/// large masses.
fn poisson_series(lambda: f64, floor: f64) -> Vec<f64> {
    let log_floor = floor.max(f64::MIN_POSITIVE).ln();
    let mut log_terms = Vec::new();
    let mut log_p = -lambda;
    let mut log_mode = f64::NEG_INFINITY;
    let mut k = 0usize;
    loop {
        log_terms.push(log_p);
        log_mode = log_mode.max(log_p);
        if k as f64 >= lambda && log_p < log_mode + log_floor {
            break;
        }
        k += 1;
        log_p += (lambda / k as f64).ln();
    }
    log_terms.into_iter().map(|v| (v - log_mode).exp()).collect()
}

impl Envelope {
    fn for_mass(mass: f64, floor: f64) -> Self {
        let residues = mass / AVERAGINE_RESIDUE_MASS;
        let lambda_one = residues
            * (AVERAGINE_CARBON * C13
                + AVERAGINE_HYDROGEN * H2
                + AVERAGINE_NITROGEN * N15
                + AVERAGINE_OXYGEN * O17
                + AVERAGINE_SULFUR * S33);
        let lambda_two = residues * (AVERAGINE_OXYGEN * O18 + AVERAGINE_SULFUR * S34);

        // Heavier by one neutron per event
        let single = poisson_series(lambda_one, floor * 1e-2);
        // Heavier by two neutrons per event
        let double = poisson_series(lambda_two, floor * 1e-2);

        let mut combined = vec![0.0; single.len() + 2 * double.len()];
        for (i, a) in single.iter().enumerate() {
            for (j, b) in double.iter().enumerate() {
                combined[i + 2 * j] += a * b;
            }
        }

        let (apex, max) = combined
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |(ai, av), (i, v)| if v > av { (i, v) } else { (ai, av) });
        if max > 0.0 {
            combined.iter_mut().for_each(|v| *v /= max);
        }

        let first = combined.iter().position(|v| *v >= floor).unwrap_or(apex);
        let last = combined.iter().rposition(|v| *v >= floor).unwrap_or(apex);
        combined.truncate(last + 1);

        Self {
            abundances: combined,
            apex,
            left: apex - first,
            right: last - apex,
        }
    }
}

/// A table of averagine isotope envelopes for fixed-width mass buckets
#[derive(Debug, Clone, PartialEq)]
pub struct PrecomputedAveragine {
    bucket_width: f64,
    floor: f64,
    envelopes: Vec<Envelope>,
}

impl PrecomputedAveragine {
    pub const DEFAULT_BUCKET_WIDTH: f64 = 25.0;
    pub const DEFAULT_FLOOR: f64 = 0.001;

    /// Tabulate envelopes up to `max_mass` in buckets of `bucket_width` Da, truncating
    /// each envelope where abundance relative to the apex drops below `floor`
    pub fn new(max_mass: f64, bucket_width: f64, floor: f64) -> Self {
        let bucket_width = if bucket_width > 0.0 {
            bucket_width
        } else {
            Self::DEFAULT_BUCKET_WIDTH
        };
        let n = (max_mass.max(0.0) / bucket_width).ceil() as usize + 1;
        let envelopes = (0..n)
            .map(|i| Envelope::for_mass((i as f64 + 0.5) * bucket_width, floor))
            .collect();
        log::debug!("Precomputed {n} averagine envelopes up to {max_mass:0.1} Da");
        Self {
            bucket_width,
            floor,
            envelopes,
        }
    }

    pub fn with_max_mass(max_mass: f64) -> Self {
        Self::new(max_mass, Self::DEFAULT_BUCKET_WIDTH, Self::DEFAULT_FLOOR)
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    #[inline]
    fn bucket(&self, mass: f64) -> &Envelope {
        let i = (mass.max(0.0) / self.bucket_width) as usize;
        &self.envelopes[i.min(self.envelopes.len() - 1)]
    }
}

impl Default for PrecomputedAveragine {
    fn default() -> Self {
        Self::with_max_mass(100_000.0)
    }
}

impl IsotopeEnvelopeModel for PrecomputedAveragine {
    fn envelope(&self, mass: f64) -> &[f64] {
        &self.bucket(mass).abundances
    }

    fn apex_index(&self, mass: f64) -> usize {
        self.bucket(mass).apex
    }

    fn left_count(&self, mass: f64) -> usize {
        self.bucket(mass).left
    }

    fn right_count(&self, mass: f64) -> usize {
        self.bucket(mass).right
    }
}
