//! Fixed-capacity bit vector used throughout the engine to denote sets of
//! states ("which states have probability 1", "which states remain in the
//! reduced system", ...).
//!
//! The capacity is fixed at construction. All binary operations require both
//! operands to have the same capacity; mixing capacities is a programming
//! error and panics. Trailing bits of the last word are kept at zero so that
//! equality and hashing can work on whole words.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitAnd, BitOr, Not};

/// A fixed-capacity set of bits indexed `0..len`.
#[derive(Clone, PartialEq, Eq)]
pub struct BitVector {
    bit_count: usize,
    words: Vec<u64>,
}

impl BitVector {
    /// Create an all-zero bit vector with the given capacity.
    pub fn new(bit_count: usize) -> Self {
        Self {
            bit_count,
            words: vec![0; bit_count.div_ceil(64)],
        }
    }

    /// Create an all-one bit vector with the given capacity.
    pub fn full(bit_count: usize) -> Self {
        let mut result = Self::new(bit_count);
        result.set_all();
        result
    }

    /// Create a bit vector with exactly the given indices set.
    pub fn from_indices(bit_count: usize, indices: &[usize]) -> Self {
        let mut result = Self::new(bit_count);
        for &i in indices {
            result.set(i, true);
        }
        result
    }

    /// Create a bit vector by evaluating a predicate for every index.
    pub fn from_fn(bit_count: usize, mut f: impl FnMut(usize) -> bool) -> Self {
        let mut result = Self::new(bit_count);
        for i in 0..bit_count {
            if f(i) {
                result.set(i, true);
            }
        }
        result
    }

    /// Capacity of the vector in bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.bit_count
    }

    /// True iff no bit is set.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// True iff every bit is set.
    pub fn is_full(&self) -> bool {
        self.count_ones() == self.bit_count
    }

    /// Membership test.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.bit_count, "bit index {index} out of bounds");
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Set or clear a single bit.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.bit_count, "bit index {index} out of bounds");
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    /// Set every bit.
    pub fn set_all(&mut self) {
        for w in &mut self.words {
            *w = u64::MAX;
        }
        self.clear_trailing_bits();
    }

    /// Clear every bit.
    pub fn clear_all(&mut self) {
        for w in &mut self.words {
            *w = 0;
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Number of set bits strictly below `index`. This is the translation
    /// from a state index to its dense position within the set, used when a
    /// reduced system is indexed by the set bits only.
    pub fn rank(&self, index: usize) -> usize {
        assert!(index <= self.bit_count, "rank index {index} out of bounds");
        let full_words = index / 64;
        let mut count: usize = self.words[..full_words]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum();
        let rem = index % 64;
        if rem != 0 {
            count += (self.words[full_words] & ((1u64 << rem) - 1)).count_ones() as usize;
        }
        count
    }

    /// Index of the first set bit at or after `from`, if any. The idiom used
    /// everywhere to scan sparse sets without materializing an index list.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        if from >= self.bit_count {
            return None;
        }
        let mut word_index = from / 64;
        let mut word = self.words[word_index] & (u64::MAX << (from % 64));
        loop {
            if word != 0 {
                let bit = word_index * 64 + word.trailing_zeros() as usize;
                return (bit < self.bit_count).then_some(bit);
            }
            word_index += 1;
            if word_index == self.words.len() {
                return None;
            }
            word = self.words[word_index];
        }
    }

    /// Lazy ascending iterator over the set bit indices.
    pub fn iter(&self) -> BitVectorIter<'_> {
        BitVectorIter {
            vector: self,
            next: 0,
        }
    }

    /// In-place intersection.
    pub fn intersect_with(&mut self, other: &BitVector) {
        self.check_compatible(other);
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w &= o;
        }
    }

    /// In-place union.
    pub fn union_with(&mut self, other: &BitVector) {
        self.check_compatible(other);
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// Set difference `self \ other` as a new vector.
    pub fn and_not(&self, other: &BitVector) -> BitVector {
        self.check_compatible(other);
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .map(|(w, o)| w & !o)
            .collect();
        BitVector {
            bit_count: self.bit_count,
            words,
        }
    }

    /// Complement as a new vector.
    pub fn complement(&self) -> BitVector {
        let mut result = BitVector {
            bit_count: self.bit_count,
            words: self.words.iter().map(|w| !w).collect(),
        };
        result.clear_trailing_bits();
        result
    }

    /// True iff every set bit of `self` is also set in `other`.
    pub fn is_subset_of(&self, other: &BitVector) -> bool {
        self.check_compatible(other);
        self.words.iter().zip(&other.words).all(|(w, o)| w & !o == 0)
    }

    /// True iff the two vectors share no set bit.
    pub fn is_disjoint_from(&self, other: &BitVector) -> bool {
        self.check_compatible(other);
        self.words.iter().zip(&other.words).all(|(w, o)| w & o == 0)
    }

    /// Raw word access for keyed storage (hash map buckets).
    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }

    pub(crate) fn from_words(bit_count: usize, words: Vec<u64>) -> Self {
        debug_assert_eq!(words.len(), bit_count.div_ceil(64));
        let mut result = Self { bit_count, words };
        result.clear_trailing_bits();
        result
    }

    #[inline]
    fn check_compatible(&self, other: &BitVector) {
        assert_eq!(
            self.bit_count, other.bit_count,
            "bit vectors of different capacity are not comparable"
        );
    }

    fn clear_trailing_bits(&mut self) {
        let rem = self.bit_count % 64;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }
}

/// Ascending iterator over set bits, built on `next_set_bit`.
pub struct BitVectorIter<'a> {
    vector: &'a BitVector,
    next: usize,
}

impl Iterator for BitVectorIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let bit = self.vector.next_set_bit(self.next)?;
        self.next = bit + 1;
        Some(bit)
    }
}

impl<'a> IntoIterator for &'a BitVector {
    type Item = usize;
    type IntoIter = BitVectorIter<'a>;

    fn into_iter(self) -> BitVectorIter<'a> {
        self.iter()
    }
}

impl BitAnd for &BitVector {
    type Output = BitVector;

    fn bitand(self, rhs: &BitVector) -> BitVector {
        let mut result = self.clone();
        result.intersect_with(rhs);
        result
    }
}

impl BitOr for &BitVector {
    type Output = BitVector;

    fn bitor(self, rhs: &BitVector) -> BitVector {
        let mut result = self.clone();
        result.union_with(rhs);
        result
    }
}

impl Not for &BitVector {
    type Output = BitVector;

    fn not(self) -> BitVector {
        self.complement()
    }
}

impl Hash for BitVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bit_count.hash(state);
        self.words.hash(state);
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector(len={}, {})", self.bit_count, self)
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, bit) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", bit)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_set_get() {
        let mut bv = BitVector::new(100);
        assert!(!bv.get(63));
        bv.set(63, true);
        bv.set(64, true);
        bv.set(99, true);
        assert!(bv.get(63));
        assert!(bv.get(64));
        assert!(bv.get(99));
        assert_eq!(bv.count_ones(), 3);
        bv.set(64, false);
        assert_eq!(bv.count_ones(), 2);
    }

    #[test]
    fn test_next_set_bit_scan() {
        let bv = BitVector::from_indices(200, &[3, 64, 65, 199]);
        let collected: Vec<usize> = bv.iter().collect();
        assert_eq!(collected, vec![3, 64, 65, 199]);
        assert_eq!(bv.next_set_bit(4), Some(64));
        assert_eq!(bv.next_set_bit(66), Some(199));
        assert_eq!(bv.next_set_bit(200), None);
    }

    #[test]
    fn test_complement_respects_capacity() {
        let bv = BitVector::from_indices(70, &[0, 69]);
        let comp = bv.complement();
        assert_eq!(comp.count_ones(), 68);
        assert_eq!(comp.complement(), bv);
        // The trailing bits of the last word must not leak into equality.
        assert!(BitVector::new(70).is_zero());
        assert!(BitVector::full(70).is_full());
    }

    #[test]
    fn test_rank() {
        let bv = BitVector::from_indices(130, &[0, 5, 64, 129]);
        assert_eq!(bv.rank(0), 0);
        assert_eq!(bv.rank(1), 1);
        assert_eq!(bv.rank(64), 2);
        assert_eq!(bv.rank(65), 3);
        assert_eq!(bv.rank(130), 4);
    }

    #[test]
    #[should_panic(expected = "different capacity")]
    fn test_capacity_mismatch_panics() {
        let a = BitVector::new(64);
        let b = BitVector::new(65);
        let _ = &a & &b;
    }

    #[test]
    fn test_display() {
        let bv = BitVector::from_indices(10, &[1, 4, 7]);
        assert_eq!(bv.to_string(), "{1, 4, 7}");
    }

    fn arb_pair() -> impl Strategy<Value = (BitVector, BitVector)> {
        (1usize..=256).prop_flat_map(|len| {
            let idx = proptest::collection::vec(0..len, 0..len.min(64));
            (idx.clone(), idx).prop_map(move |(a, b)| {
                (
                    BitVector::from_indices(len, &a),
                    BitVector::from_indices(len, &b),
                )
            })
        })
    }

    proptest! {
        #[test]
        fn prop_partition_law((a, b) in arb_pair()) {
            // (A & B) | (A & ~B) == A
            let left = &(&a & &b) | &(&a & &b.complement());
            prop_assert_eq!(left, a);
        }

        #[test]
        fn prop_double_complement((a, _b) in arb_pair()) {
            prop_assert_eq!(a.complement().complement(), a);
        }

        #[test]
        fn prop_inclusion_exclusion((a, b) in arb_pair()) {
            let union = (&a | &b).count_ones();
            let inter = (&a & &b).count_ones();
            prop_assert_eq!(union + inter, a.count_ones() + b.count_ones());
        }

        #[test]
        fn prop_rank_iter_agree((a, _b) in arb_pair()) {
            for (dense, bit) in a.iter().enumerate() {
                prop_assert_eq!(a.rank(bit), dense);
            }
        }
    }
}
