use num_traits::Float;

/// The mass of a proton, the charge carrier assumed throughout this crate
pub const PROTON: f64 = 1.00727646677;

/// The average mass difference between adjacent isotopic peaks of a
/// peptide or protein, dominated by the <sup>13</sup>C-<sup>12</sup>C difference
pub const ISOTOPE_MASSDIFF: f64 = 1.002_35;

/// The mass lost by the neutral loss of water
pub const WATER_MASS: f64 = 18.010_564_684;

/// The mass lost by the neutral loss of ammonia
pub const AMMONIA_MASS: f64 = 17.026_549_101;

#[inline]
pub fn mass_charge_ratio(mass: f64, z: i32) -> f64 {
    (mass / (z.abs() as f64)) + z.signum() as f64 * PROTON
}

#[inline]
pub fn neutral_mass(mz: f64, z: i32) -> f64 {
    (mz * z.abs() as f64) - z as f64 * PROTON
}

/// The m/z of a peak with the charge carrier removed, `mz - PROTON` for
/// positive charges and `mz + PROTON` for negative ones.
#[inline]
pub fn uncharged_mz(mz: f64, z_sign: i32) -> f64 {
    mz - z_sign.signum() as f64 * PROTON
}

#[inline]
pub fn isclose<T: Float>(a: T, b: T, delta: T) -> bool {
    (a - b).abs() < delta
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mass_round_trip() {
        let mass = 10_000.0;
        for z in [1, 2, 7, 25, -3] {
            let mz = mass_charge_ratio(mass, z);
            assert!(isclose(neutral_mass(mz, z), mass, 1e-6), "z = {z}");
        }
    }

    #[test]
    fn test_uncharged_mz() {
        let mz = mass_charge_ratio(1000.0, 2);
        assert!(isclose(uncharged_mz(mz, 2) * 2.0, 1000.0, 1e-9));
        let mz = mass_charge_ratio(1000.0, -2);
        assert!(isclose(uncharged_mz(mz, -2) * 2.0, 1000.0, 1e-9));
    }
}
