use std::collections::VecDeque;

use crate::binning::BinSet;

/// The mass bins accepted in one previous spectrum, with the log-mass value of that
/// spectrum's first mass bin
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub mass_bins: Vec<usize>,
    pub anchor: f64,
}

/// A bounded first-in-first-out window over the mass bins accepted in the most
/// recent MS1 spectra.
///
/// Each spectrum anchors its own mass bin space, so stored bin indices are
/// translated into the current space by the rounded anchor difference before use.
/// A capacity of zero disables the window.
#[derive(Debug, Clone, Default)]
pub struct ContinuityHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl ContinuityHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Add every remembered mass bin to `target`, translated from its entry's anchor
    /// to `anchor`. Bins falling outside `target` are ignored. Returns the number of
    /// bins newly added.
    pub fn union_into(&self, target: &mut BinSet, anchor: f64, density: f64) -> usize {
        let mut added = 0;
        for entry in self.entries.iter() {
            let shift = ((anchor - entry.anchor) * density).round() as i64;
            for index in entry.mass_bins.iter() {
                let j = *index as i64 - shift;
                if j < 0 {
                    continue;
                }
                if j as usize >= target.len() {
                    break;
                }
                if target.insert(j as usize) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Remember `mass_bins` under `anchor`, evicting the oldest entry if the window is full
    pub fn push(&mut self, mass_bins: Vec<usize>, anchor: f64) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
            log::trace!("Evicted the oldest continuity history entry");
        }
        log::trace!(
            "Remembering {} mass bins at anchor {anchor:0.6}",
            mass_bins.len()
        );
        self.entries.push_back(HistoryEntry { mass_bins, anchor });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_window_bound() {
        let mut history = ContinuityHistory::new(3);
        for i in 0..10 {
            history.push(vec![i], 7.0);
            assert!(history.len() <= 3);
        }
        assert_eq!(history.len(), 3);
        let kept: Vec<usize> = history.iter().map(|e| e.mass_bins[0]).collect();
        assert_eq!(kept, vec![7, 8, 9]);
    }

    #[test]
    fn test_disabled() {
        let mut history = ContinuityHistory::new(0);
        history.push(vec![1, 2, 3], 7.0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_shifted_union() {
        let density = 1e5;
        let mut history = ContinuityHistory::new(2);
        // Remembered against an anchor 25 bins lower than the current one
        history.push(vec![10, 30, 100, 5000], 7.0);
        let mut target = BinSet::new(1000);
        let added = history.union_into(&mut target, 7.0 + 25.0 / density, density);
        assert_eq!(added, 2);
        assert_eq!(target.iter().collect::<Vec<_>>(), vec![5, 75]);
    }
}
