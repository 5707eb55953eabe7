//! Ring buffer of past far-end block spectra.

use derive_more::Debug;

use crate::common::Spectrum;

/// Fixed-capacity history of far-end spectra, one slot per filter partition.
///
/// [`push`](Self::push) steps the write position backwards, so
/// `slot(age)` is always `(position + age) mod capacity` and `slot(0)` is the
/// newest spectrum.
#[derive(Debug, Clone)]
pub struct FarHistory {
    #[debug(skip)]
    slots: Vec<Spectrum>,
    position: usize,
}

impl FarHistory {
    /// Creates a zeroed history. `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            slots: vec![Spectrum::ZERO; capacity.max(1)],
            position: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot index of the newest spectrum.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn push(&mut self, spectrum: &Spectrum) {
        let capacity = self.slots.len();
        self.position = (self.position + capacity - 1) % capacity;
        self.slots[self.position] = *spectrum;
    }

    /// Spectrum pushed `age` blocks ago, wrapping modulo the capacity.
    #[inline]
    pub fn slot(&self, age: usize) -> &Spectrum {
        &self.slots[(self.position + age) % self.slots.len()]
    }

    /// Iterates from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &Spectrum> + '_ {
        (0..self.slots.len()).map(|age| self.slot(age))
    }

    pub fn clear(&mut self) {
        self.slots.fill(Spectrum::ZERO);
        self.position = 0;
    }
}
