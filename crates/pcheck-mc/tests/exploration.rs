//! Exploration-to-checking round trips.

use pcheck_mc::builder::Choice;
use pcheck_mc::{
    compute_until_probabilities, explore, optimization_direction, satisfies, ComparisonType,
};
use pcheck_solver::{OptimizationDirection, ValueIterationFactory};
use pcheck_storage::BitVector;

// Encodings are hash map keys and must be word-sized; the gambler values
// occupy the low bits.
const WIDTH: usize = 64;

fn encode(value: usize) -> BitVector {
    BitVector::from_fn(WIDTH, |bit| (value >> bit) & 1 == 1)
}

/// Fair gambler's ruin on 0..=4: interior states move up or down with
/// probability one half, the boundaries are deadlocks.
fn gambler(state: &BitVector) -> Vec<Choice> {
    let value = (0..WIDTH).filter(|b| state.get(*b)).fold(0, |v, b| v | 1 << b);
    if value == 0 || value == 4 {
        return Vec::new();
    }
    vec![vec![(encode(value + 1), 0.5), (encode(value - 1), 0.5)]]
}

#[test]
fn test_explore_deduplicates_and_completes_deadlocks() {
    let explored = explore(WIDTH, &[encode(2)], gambler).unwrap();
    assert_eq!(explored.storage.len(), 5);
    assert_eq!(explored.model.state_count(), 5);
    assert!(explored.model.is_deterministic());
    assert_eq!(explored.initial_states.count_ones(), 1);
    assert!(explored.initial_states.get(0));
    // The deadlock boundaries were closed off with self loops.
    let zero = explored.storage.index_of(&encode(0)).unwrap();
    let matrix = explored.model.transition_matrix();
    let row = matrix.row(matrix.row_group_range(zero).start);
    assert_eq!(row.len(), 1);
    assert_eq!(row[0].column, zero);
    assert_eq!(row[0].value, 1.0);
}

#[test]
fn test_explored_model_checks_like_the_textbook() {
    let explored = explore(WIDTH, &[encode(2)], gambler).unwrap();
    let n = explored.model.state_count();
    let win = explored.storage.index_of(&encode(4)).unwrap();
    let result = compute_until_probabilities(
        OptimizationDirection::Maximize,
        &explored.model,
        &BitVector::full(n),
        &BitVector::from_indices(n, &[win]),
        false,
        &ValueIterationFactory::new().with_precision(1e-10),
    )
    .unwrap();
    let at = |value: usize| result.value(explored.storage.index_of(&encode(value)).unwrap());
    assert!((at(2) - 0.5).abs() < 1e-6);
    assert!((at(1) - 0.25).abs() < 1e-6);
    assert!((at(3) - 0.75).abs() < 1e-6);
}

#[test]
fn test_threshold_drives_the_direction() {
    let explored = explore(WIDTH, &[encode(2)], gambler).unwrap();
    let n = explored.model.state_count();
    let win = explored.storage.index_of(&encode(4)).unwrap();
    // P<=0.6 [F win]: a universal upper bound is checked against the
    // maximal probability.
    let comparison = ComparisonType::LessEqual;
    let direction = optimization_direction(comparison).unwrap();
    assert_eq!(direction, OptimizationDirection::Maximize);
    let result = compute_until_probabilities(
        direction,
        &explored.model,
        &BitVector::full(n),
        &BitVector::from_indices(n, &[win]),
        false,
        &ValueIterationFactory::new().with_precision(1e-10),
    )
    .unwrap();
    let initial = explored.initial_states.next_set_bit(0).unwrap();
    assert!(satisfies(result.value(initial), comparison, 0.6));
    assert!(!satisfies(result.value(initial), comparison, 0.4));
}
