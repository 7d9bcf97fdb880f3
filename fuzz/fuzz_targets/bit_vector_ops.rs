#![no_main]
use libfuzzer_sys::fuzz_target;
use pcheck_storage::BitVector;

// Drives a bit vector against a plain Vec<bool> model and checks that the
// derived views (rank, iteration, complement, counts) stay consistent.
fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let len = 1 + usize::from(first) % 200;
    let mut bits = BitVector::new(len);
    let mut model = vec![false; len];

    for &byte in rest {
        let index = usize::from(byte) % len;
        let value = !model[index];
        model[index] = value;
        bits.set(index, value);
    }

    let expected_ones = model.iter().filter(|b| **b).count();
    assert_eq!(bits.count_ones(), expected_ones);
    assert_eq!(bits.rank(len), expected_ones);
    assert_eq!(bits.is_zero(), expected_ones == 0);
    assert_eq!(bits.is_full(), expected_ones == len);

    let mut seen = 0;
    for index in bits.iter() {
        assert!(model[index]);
        assert_eq!(bits.rank(index), seen);
        seen += 1;
    }
    assert_eq!(seen, expected_ones);

    let complement = bits.complement();
    assert_eq!(complement.count_ones(), len - expected_ones);
    assert!(complement.is_disjoint_from(&bits));
    assert!((&complement | &bits).is_full());
});
