#![no_main]
use libfuzzer_sys::fuzz_target;
use pcheck_storage::{BitVector, BitVectorHashMap};
use std::collections::HashMap;

fn key(bucket_size: usize, id: u8) -> BitVector {
    BitVector::from_fn(bucket_size, |bit| (id >> (bit % 8)) & 1 == 1)
}

// Inserts a byte-driven key stream and checks that deduplication agrees
// with a std::collections::HashMap reference.
fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    // Key widths must be a positive multiple of 64.
    let bucket_size = 64 * (1 + usize::from(first) % 3);
    let mut map: BitVectorHashMap<u64> = BitVectorHashMap::new(bucket_size);
    let mut reference: HashMap<u8, u64> = HashMap::new();

    for (step, &id) in rest.iter().enumerate() {
        let fresh = step as u64;
        let stored = match map.find_or_add(&key(bucket_size, id), fresh) {
            Ok(value) => value,
            Err(_) => return,
        };
        let expected = *reference.entry(id).or_insert(fresh);
        assert_eq!(stored, expected);
    }

    assert_eq!(map.len(), reference.len());
    for (&id, &value) in &reference {
        let k = key(bucket_size, id);
        assert!(map.contains(&k));
        assert_eq!(map.get_value(&k), value);
    }
});
