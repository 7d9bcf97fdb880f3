//! Hash map keyed by fixed-width bit patterns, using open addressing.
//!
//! Keys are `BitVector`s whose length is a fixed multiple of 64, uniform per
//! map. The map is used to assign canonical dense indices to state encodings
//! and to detect previously-seen keys in O(1) amortized time. It grows
//! monotonically and never shrinks; growth walks a static table of prime
//! capacities and rehashes every occupied bucket.

use std::hash::{BuildHasher, Hash, Hasher};

use thiserror::Error;

use crate::bitvec::BitVector;

/// The static growth table is exhausted. This is a configuration-level
/// failure: the current translation task cannot proceed.
#[derive(Debug, Error)]
#[error("bit vector hash map exhausted its growth table at capacity {capacity}")]
pub struct CapacityExhausted {
    pub capacity: usize,
}

/// Static table of prime capacities; growth always moves to the next entry.
const SIZES: [usize; 28] = [
    53,
    97,
    193,
    389,
    769,
    1543,
    3079,
    6151,
    12289,
    24593,
    49157,
    98317,
    196613,
    393241,
    786433,
    1572869,
    3145739,
    6291469,
    12582917,
    25165843,
    50331653,
    100663319,
    201326611,
    402653189,
    805306457,
    1610612741,
    3221225473,
    6442450939,
];

/// A hash map from fixed-width bit patterns to arbitrary payloads.
pub struct BitVectorHashMap<V> {
    /// Bits per key; a multiple of 64.
    bucket_size: usize,
    words_per_key: usize,
    /// Flat key storage: `words_per_key` words per bucket.
    buckets: Vec<u64>,
    /// Which buckets hold a key.
    occupied: BitVector,
    values: Vec<Option<V>>,
    len: usize,
    size_index: usize,
    load_factor: f64,
    hasher: ahash::RandomState,
}

impl<V: Clone> BitVectorHashMap<V> {
    /// Create a map for keys of `bucket_size` bits with the default load
    /// factor of 0.75. `bucket_size` must be a positive multiple of 64.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_load_factor(bucket_size, 0.75)
    }

    /// Create a map with an explicit load factor in (0, 1).
    pub fn with_load_factor(bucket_size: usize, load_factor: f64) -> Self {
        assert!(
            bucket_size > 0 && bucket_size % 64 == 0,
            "bucket size must be a positive multiple of 64, got {bucket_size}"
        );
        assert!(
            load_factor > 0.0 && load_factor < 1.0,
            "load factor must lie strictly between 0 and 1"
        );
        let size_index = 0;
        let capacity = SIZES[size_index];
        let words_per_key = bucket_size / 64;
        Self {
            bucket_size,
            words_per_key,
            buckets: vec![0; words_per_key * capacity],
            occupied: BitVector::new(capacity),
            values: vec![None; capacity],
            len: 0,
            size_index,
            load_factor,
            hasher: ahash::RandomState::new(),
        }
    }

    /// Number of key-value pairs stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True iff the map stores no pair.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current bucket count.
    #[inline]
    pub fn capacity(&self) -> usize {
        SIZES[self.size_index]
    }

    /// Width of the keys in bits.
    #[inline]
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// If `key` is present, return the value stored at first insertion.
    /// Otherwise insert `(key, value)` and return `value`. Idempotent:
    /// repeated calls with a different value never overwrite.
    pub fn find_or_add(&mut self, key: &BitVector, value: V) -> Result<V, CapacityExhausted> {
        self.check_key(key);
        self.grow_if_loaded()?;
        loop {
            match self.find_bucket_to_insert(key) {
                Some((true, bucket)) => {
                    return Ok(self.values[bucket].clone().expect("occupied bucket has value"));
                }
                Some((false, bucket)) => {
                    self.store(bucket, key, value.clone());
                    return Ok(value);
                }
                None => self.grow()?,
            }
        }
    }

    /// Insert or overwrite unconditionally.
    pub fn set_or_add(&mut self, key: &BitVector, value: V) -> Result<(), CapacityExhausted> {
        self.check_key(key);
        self.grow_if_loaded()?;
        loop {
            match self.find_bucket_to_insert(key) {
                Some((true, bucket)) => {
                    self.values[bucket] = Some(value);
                    return Ok(());
                }
                Some((false, bucket)) => {
                    self.store(bucket, key, value);
                    return Ok(());
                }
                None => self.grow()?,
            }
        }
    }

    /// Membership test. Read-only lookups never grow the table.
    pub fn contains(&self, key: &BitVector) -> bool {
        self.check_key(key);
        self.find_bucket(key).is_some()
    }

    /// Value stored for `key`.
    ///
    /// Precondition: `contains(key)`. Violations are a programming error and
    /// panic; callers must check first.
    pub fn get_value(&self, key: &BitVector) -> V {
        self.check_key(key);
        let bucket = self
            .find_bucket(key)
            .expect("get_value called for a key that is not present");
        self.values[bucket].clone().expect("occupied bucket has value")
    }

    /// Apply `f` to every stored value in place. Used to renumber all targets
    /// after a global index change, e.g. after states are removed.
    pub fn remap(&mut self, mut f: impl FnMut(&V) -> V) {
        for bucket in self.occupied.iter() {
            let old = self.values[bucket].as_ref().expect("occupied bucket has value");
            self.values[bucket] = Some(f(old));
        }
    }

    /// Iterate over stored (key, value) pairs in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (BitVector, &V)> + '_ {
        self.occupied.iter().map(move |bucket| {
            let key = self.key_at(bucket);
            let value = self.values[bucket].as_ref().expect("occupied bucket has value");
            (key, value)
        })
    }

    fn check_key(&self, key: &BitVector) {
        assert_eq!(
            key.len(),
            self.bucket_size,
            "key width {} does not match the map's bucket size {}",
            key.len(),
            self.bucket_size
        );
    }

    fn hash_key(&self, key: &BitVector) -> u64 {
        let mut hasher = self.hasher.build_hasher();
        key.words().hash(&mut hasher);
        hasher.finish()
    }

    #[inline]
    fn probe(&self, initial: usize, step: usize) -> usize {
        // Triangular-number probing; for prime capacities this visits enough
        // distinct buckets before the probe budget runs out.
        (initial + step * (step + 1) / 2) % self.capacity()
    }

    fn key_matches(&self, bucket: usize, key: &BitVector) -> bool {
        let start = bucket * self.words_per_key;
        &self.buckets[start..start + self.words_per_key] == key.words()
    }

    fn key_at(&self, bucket: usize) -> BitVector {
        let start = bucket * self.words_per_key;
        BitVector::from_words(
            self.bucket_size,
            self.buckets[start..start + self.words_per_key].to_vec(),
        )
    }

    /// Locate the bucket holding `key`, if present.
    fn find_bucket(&self, key: &BitVector) -> Option<usize> {
        let initial = (self.hash_key(key) % self.capacity() as u64) as usize;
        for step in 0..self.capacity() {
            let bucket = self.probe(initial, step);
            if !self.occupied.get(bucket) {
                return None;
            }
            if self.key_matches(bucket, key) {
                return Some(bucket);
            }
        }
        None
    }

    /// Locate the bucket where `key` lives or can be inserted. Returns
    /// `(already_present, bucket)`, or `None` if the probe budget was
    /// exhausted without finding a free bucket.
    fn find_bucket_to_insert(&self, key: &BitVector) -> Option<(bool, usize)> {
        let initial = (self.hash_key(key) % self.capacity() as u64) as usize;
        for step in 0..self.capacity() {
            let bucket = self.probe(initial, step);
            if !self.occupied.get(bucket) {
                return Some((false, bucket));
            }
            if self.key_matches(bucket, key) {
                return Some((true, bucket));
            }
        }
        None
    }

    fn store(&mut self, bucket: usize, key: &BitVector, value: V) {
        let start = bucket * self.words_per_key;
        self.buckets[start..start + self.words_per_key].copy_from_slice(key.words());
        self.occupied.set(bucket, true);
        self.values[bucket] = Some(value);
        self.len += 1;
    }

    fn grow_if_loaded(&mut self) -> Result<(), CapacityExhausted> {
        if (self.len + 1) as f64 > self.load_factor * self.capacity() as f64 {
            self.grow()?;
        }
        Ok(())
    }

    /// Stop-the-world rehash into the next capacity of the growth table.
    fn grow(&mut self) -> Result<(), CapacityExhausted> {
        if self.size_index + 1 >= SIZES.len() {
            return Err(CapacityExhausted {
                capacity: self.capacity(),
            });
        }
        let old_occupied = std::mem::replace(&mut self.occupied, BitVector::new(0));
        let old_buckets = std::mem::take(&mut self.buckets);
        let old_values = std::mem::take(&mut self.values);

        self.size_index += 1;
        let capacity = SIZES[self.size_index];
        self.buckets = vec![0; self.words_per_key * capacity];
        self.occupied = BitVector::new(capacity);
        self.values = vec![None; capacity];
        self.len = 0;

        for bucket in old_occupied.iter() {
            let start = bucket * self.words_per_key;
            let key = BitVector::from_words(
                self.bucket_size,
                old_buckets[start..start + self.words_per_key].to_vec(),
            );
            let value = old_values[bucket].clone().expect("occupied bucket has value");
            // The fresh table is strictly larger, so insertion terminates;
            // if probing still fails we keep growing.
            loop {
                match self.find_bucket_to_insert(&key) {
                    Some((false, b)) => {
                        self.store(b, &key, value);
                        break;
                    }
                    Some((true, _)) => unreachable!("duplicate key during rehash"),
                    None => self.grow()?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(bits: &[usize]) -> BitVector {
        BitVector::from_indices(64, bits)
    }

    #[test]
    fn test_find_or_add_is_idempotent() {
        let mut map: BitVectorHashMap<u32> = BitVectorHashMap::new(64);
        let k = key(&[1, 5, 9]);
        assert_eq!(map.find_or_add(&k, 17).unwrap(), 17);
        assert_eq!(map.len(), 1);
        // A different value for an existing key does not overwrite.
        assert_eq!(map.find_or_add(&k, 99).unwrap(), 17);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_value(&k), 17);
    }

    #[test]
    fn test_set_or_add_overwrites() {
        let mut map: BitVectorHashMap<u32> = BitVectorHashMap::new(64);
        let k = key(&[2]);
        map.set_or_add(&k, 1).unwrap();
        map.set_or_add(&k, 2).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_value(&k), 2);
    }

    #[test]
    fn test_growth_preserves_entries() {
        let mut map: BitVectorHashMap<usize> = BitVectorHashMap::new(128);
        let initial_capacity = map.capacity();
        for i in 0..500 {
            let k = BitVectorHashMap::<usize>::test_key_128(i);
            assert_eq!(map.find_or_add(&k, i).unwrap(), i);
        }
        assert!(map.capacity() > initial_capacity);
        assert_eq!(map.len(), 500);
        for i in 0..500 {
            let k = BitVectorHashMap::<usize>::test_key_128(i);
            assert!(map.contains(&k));
            assert_eq!(map.get_value(&k), i);
        }
    }

    #[test]
    fn test_remap_renumbers_every_value_once() {
        let mut map: BitVectorHashMap<usize> = BitVectorHashMap::new(64);
        for i in 0..40 {
            map.find_or_add(&BitVector::from_indices(64, &[i]), i).unwrap();
        }
        map.remap(|v| v + 100);
        for i in 0..40 {
            assert_eq!(map.get_value(&BitVector::from_indices(64, &[i])), i + 100);
        }
    }

    #[test]
    #[should_panic(expected = "not present")]
    fn test_get_value_missing_key_panics() {
        let map: BitVectorHashMap<u32> = BitVectorHashMap::new(64);
        map.get_value(&key(&[3]));
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_wrong_key_width_panics() {
        let mut map: BitVectorHashMap<u32> = BitVectorHashMap::new(64);
        let wide = BitVector::from_indices(128, &[1]);
        let _ = map.find_or_add(&wide, 0);
    }

    #[test]
    fn test_iteration_covers_all_pairs() {
        let mut map: BitVectorHashMap<usize> = BitVectorHashMap::new(64);
        for i in 0..10 {
            map.find_or_add(&BitVector::from_indices(64, &[i]), i).unwrap();
        }
        let mut seen: Vec<usize> = map.iter().map(|(_, v)| *v).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    impl<V: Clone> BitVectorHashMap<V> {
        /// Distinct 128-bit key derived from an integer.
        fn test_key_128(i: usize) -> BitVector {
            let mut k = BitVector::new(128);
            for bit in 0..64 {
                if (i >> bit) & 1 == 1 {
                    k.set(bit, true);
                }
            }
            k
        }
    }
}
