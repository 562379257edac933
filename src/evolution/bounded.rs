//! Fixed-capacity set of the best candidates seen so far.
//!
//! Keeps at most `capacity` entries and a pointer to the worst one. A new
//! candidate is only compared against that worst entry; when it wins it
//! takes the worst slot and the pointer is recomputed over the kept entries.
//! Selecting the best `k` of `n` values costs O(n·k) and no sort.

/// Which end of the key range is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    /// Keep the smallest keys (nearest neighbours).
    Smallest,
    /// Keep the largest keys (elites).
    Largest,
}

impl Keep {
    /// Whether key `a` is strictly better than key `b`.
    fn better(self, a: f64, b: f64) -> bool {
        match self {
            Keep::Smallest => a < b,
            Keep::Largest => a > b,
        }
    }
}

/// Bounded set of `(key, item)` pairs.
#[derive(Debug, Clone)]
pub struct BoundedBest<T> {
    keep: Keep,
    capacity: usize,
    entries: Vec<(f64, T)>,
    worst: usize,
}

impl<T> BoundedBest<T> {
    pub fn new(keep: Keep, capacity: usize) -> Self {
        Self {
            keep,
            capacity,
            entries: Vec::with_capacity(capacity),
            worst: 0,
        }
    }

    /// Offer a candidate. Returns whether it was kept.
    ///
    /// Ties never displace a kept entry, so the first of equal keys stays.
    pub fn offer(&mut self, key: f64, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }

        if self.entries.len() < self.capacity {
            self.entries.push((key, item));
            let last = self.entries.len() - 1;
            if last == 0 || self.keep.better(self.entries[self.worst].0, key) {
                self.worst = last;
            }
            return true;
        }

        if !self.keep.better(key, self.entries[self.worst].0) {
            return false;
        }

        self.entries[self.worst] = (key, item);
        self.recompute_worst();
        true
    }

    fn recompute_worst(&mut self) {
        let mut worst = 0;
        for (i, (key, _)) in self.entries.iter().enumerate().skip(1) {
            if self.keep.better(self.entries[worst].0, *key) {
                worst = i;
            }
        }
        self.worst = worst;
    }

    /// Key of the current worst entry.
    pub fn worst_key(&self) -> Option<f64> {
        self.entries.get(self.worst).map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of kept keys.
    pub fn key_sum(&self) -> f64 {
        self.entries.iter().map(|(k, _)| k).sum()
    }

    /// Mean of kept keys, 0 when empty.
    pub fn key_mean(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.key_sum() / self.entries.len() as f64
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, T)> {
        self.entries.iter()
    }

    /// Kept entries in insertion-slot order (not sorted).
    pub fn into_entries(self) -> Vec<(f64, T)> {
        self.entries
    }
}
