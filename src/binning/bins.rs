/// Map `value` to its bin index. Values below `min_value` fall into bin zero.
///
/// `density` is the number of bins per unit of log-value, the inverse of the
/// relative tolerance.
#[inline]
pub fn bin_of(value: f64, min_value: f64, density: f64) -> usize {
    if value < min_value {
        return 0;
    }
    ((value - min_value) * density).round() as usize
}

/// The value at the center of `bin`
#[inline]
pub fn value_of(bin: usize, min_value: f64, density: f64) -> f64 {
    min_value + bin as f64 / density
}

/// A bounded, uniform bin space over a log-domain interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinSpace {
    pub min_value: f64,
    pub density: f64,
    len: usize,
}

impl BinSpace {
    /// Create a bin space covering `[min_value, max_value]`. An inverted interval
    /// yields a single bin.
    pub fn new(min_value: f64, max_value: f64, density: f64) -> Self {
        let len = bin_of(max_value.max(min_value), min_value, density) + 1;
        Self {
            min_value,
            density,
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn bin_of(&self, value: f64) -> usize {
        bin_of(value, self.min_value, self.density)
    }

    #[inline]
    pub fn value_of(&self, bin: usize) -> f64 {
        value_of(bin, self.min_value, self.density)
    }

    /// The bin of `value` if it lies inside this space
    #[inline]
    pub fn get(&self, value: f64) -> Option<usize> {
        if value < self.min_value {
            return None;
        }
        let bin = self.bin_of(value);
        (bin < self.len).then_some(bin)
    }

    /// The bin next to `bin` on the side `value` falls on, if `value` is off-center
    /// and that bin exists
    pub fn smoothing_neighbor(&self, value: f64, bin: usize) -> Option<usize> {
        let exact = (value - self.min_value) * self.density;
        let center = bin as f64;
        if exact > center && bin + 1 < self.len {
            Some(bin + 1)
        } else if exact < center && bin > 0 {
            Some(bin - 1)
        } else {
            None
        }
    }

    /// The integer shift that translates a bin index of a space anchored at
    /// `other_min` into this space, `index_here = index_there - shift`
    #[inline]
    pub fn shift_from(&self, other_min: f64) -> i64 {
        ((self.min_value - other_min) * self.density).round() as i64
    }
}
