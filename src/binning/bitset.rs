use std::collections::TryReserveError;
use std::iter::FusedIterator;

const WORD: usize = u64::BITS as usize;

/// A fixed-length set of bin indices backed by a packed bit vector.
///
/// Out-of-range indices are never members and inserting them is a no-op.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BinSet {
    words: Vec<u64>,
    len: usize,
}

impl BinSet {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD)],
            len,
        }
    }

    /// Clear the set and resize it to hold `len` bins, reusing the existing buffer
    pub fn reset(&mut self, len: usize) -> Result<(), TryReserveError> {
        let n_words = len.div_ceil(WORD);
        self.words.clear();
        self.words.try_reserve(n_words)?;
        self.words.resize(n_words, 0);
        self.len = len;
        Ok(())
    }

    /// The number of bins this set spans, not the number of members
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index / WORD] & (1 << (index % WORD)) != 0
    }

    /// Add `index`, returning `true` if it was not already present
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let word = &mut self.words[index / WORD];
        let mask = 1 << (index % WORD);
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    #[inline]
    pub fn remove(&mut self, index: usize) {
        if index < self.len {
            self.words[index / WORD] &= !(1 << (index % WORD));
        }
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// The number of members
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Add every member of `other` that fits in this set
    pub fn union_with(&mut self, other: &BinSet) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
        if other.len > self.len {
            self.mask_tail();
        }
    }

    fn mask_tail(&mut self) {
        let rem = self.len % WORD;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    /// Iterate over members in ascending order
    pub fn iter(&self) -> BinSetIter<'_> {
        BinSetIter {
            words: &self.words,
            word_index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

/// Ascending iterator over the members of a [`BinSet`]
#[derive(Debug, Clone)]
pub struct BinSetIter<'a> {
    words: &'a [u64],
    word_index: usize,
    current: u64,
}

impl Iterator for BinSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_index * WORD + bit);
            }
            self.word_index += 1;
            if self.word_index >= self.words.len() {
                return None;
            }
            self.current = self.words[self.word_index];
        }
    }
}

impl FusedIterator for BinSetIter<'_> {}

impl<'a> IntoIterator for &'a BinSet {
    type Item = usize;
    type IntoIter = BinSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<usize> for BinSet {
    /// Build a set just large enough to hold every index
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let indices: Vec<usize> = iter.into_iter().collect();
        let len = indices.iter().max().map(|m| m + 1).unwrap_or(0);
        let mut set = Self::new(len);
        for i in indices {
            set.insert(i);
        }
        set
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_membership() {
        let mut set = BinSet::new(130);
        assert!(set.insert(0));
        assert!(set.insert(64));
        assert!(set.insert(129));
        assert!(!set.insert(129));
        assert!(!set.insert(130));
        assert!(set.contains(64));
        assert!(!set.contains(63));
        assert!(!set.contains(1000));
        assert_eq!(set.count(), 3);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 64, 129]);
        set.remove(64);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 129]);
    }

    #[test]
    fn test_reset_and_union() {
        let mut a = BinSet::new(10);
        a.insert(3);
        a.reset(200).unwrap();
        assert_eq!(a.len(), 200);
        assert_eq!(a.count(), 0);

        let b: BinSet = [5usize, 70, 199].into_iter().collect();
        a.union_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![5, 70, 199]);

        let mut small = BinSet::new(71);
        small.union_with(&b);
        assert_eq!(small.iter().collect::<Vec<_>>(), vec![5, 70]);
    }

    #[test]
    fn test_empty_iter() {
        let set = BinSet::new(0);
        assert_eq!(set.iter().next(), None);
        let set = BinSet::new(64);
        assert_eq!(set.iter().count(), 0);
    }
}
