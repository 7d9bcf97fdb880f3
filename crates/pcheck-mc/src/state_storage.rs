//! Canonical state indexing during exploration.
//!
//! Freshly generated state encodings are deduplicated through the keyed
//! hash map; the first time an encoding is seen it receives the next dense
//! index, and every later occurrence resolves to that same index.

use pcheck_storage::{BitVector, BitVectorHashMap, CapacityExhausted};

/// Maps fixed-width state encodings to dense state indices.
pub struct StateStorage {
    states: BitVectorHashMap<usize>,
}

impl StateStorage {
    /// Storage for encodings of `state_width` bits (a positive multiple
    /// of 64).
    pub fn new(state_width: usize) -> Self {
        Self {
            states: BitVectorHashMap::new(state_width),
        }
    }

    /// The index of `encoding`, assigning the next free index on first
    /// sight.
    pub fn index_of_or_add(&mut self, encoding: &BitVector) -> Result<usize, CapacityExhausted> {
        let fresh = self.states.len();
        self.states.find_or_add(encoding, fresh)
    }

    /// The index of a previously registered encoding.
    pub fn index_of(&self, encoding: &BitVector) -> Option<usize> {
        self.states
            .contains(encoding)
            .then(|| self.states.get_value(encoding))
    }

    /// Number of distinct states registered.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Renumber every registered index through `permutation` (old index to
    /// new index), after a global reordering of the state space.
    pub fn remap(&mut self, permutation: &[usize]) {
        assert_eq!(permutation.len(), self.states.len());
        self.states.remap(|&old| permutation[old]);
    }

    /// Iterate over (encoding, index) pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (BitVector, usize)> + '_ {
        self.states.iter().map(|(key, &index)| (key, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoding(value: usize) -> BitVector {
        BitVector::from_fn(64, |i| (value >> i) & 1 == 1)
    }

    #[test]
    fn test_indices_assigned_in_discovery_order() {
        let mut storage = StateStorage::new(64);
        assert_eq!(storage.index_of_or_add(&encoding(7)).unwrap(), 0);
        assert_eq!(storage.index_of_or_add(&encoding(3)).unwrap(), 1);
        // Re-offering an encoding never allocates a second index.
        assert_eq!(storage.index_of_or_add(&encoding(7)).unwrap(), 0);
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.index_of(&encoding(3)), Some(1));
        assert_eq!(storage.index_of(&encoding(9)), None);
    }

    #[test]
    fn test_remap_applies_permutation() {
        let mut storage = StateStorage::new(64);
        for value in 0..4 {
            storage.index_of_or_add(&encoding(value)).unwrap();
        }
        storage.remap(&[2, 0, 3, 1]);
        assert_eq!(storage.index_of(&encoding(0)), Some(2));
        assert_eq!(storage.index_of(&encoding(1)), Some(0));
        assert_eq!(storage.index_of(&encoding(2)), Some(3));
        assert_eq!(storage.index_of(&encoding(3)), Some(1));
    }
}
