//! Explicit model construction by breadth-first exploration.
//!
//! A successor callback describes the model implicitly: given a state
//! encoding it returns the available choices, each a distribution over
//! successor encodings. The builder explores from the initial encodings,
//! deduplicates states through `StateStorage`, and finalizes into a
//! `SparseModel`. On finalize the initial states are permuted to the front
//! of the index range; the storage is renumbered along.

use pcheck_storage::{BitVector, SparseMatrixBuilder};
use tracing::info;

use crate::error::CheckResult;
use crate::model::SparseModel;
use crate::state_storage::StateStorage;

/// One choice of a state under exploration: a distribution over successor
/// encodings.
pub type Choice = Vec<(BitVector, f64)>;

/// An explored model together with its state index.
pub struct ExploredModel {
    pub model: SparseModel,
    pub initial_states: BitVector,
    pub storage: StateStorage,
}

/// Explore the state space spanned by `initial` under `successors` and
/// build the model. Deadlocked encodings (no choices) are completed with a
/// self loop so every row stays a distribution.
pub fn explore(
    state_width: usize,
    initial: &[BitVector],
    mut successors: impl FnMut(&BitVector) -> Vec<Choice>,
) -> CheckResult<ExploredModel> {
    assert!(!initial.is_empty(), "exploration needs an initial state");
    let mut storage = StateStorage::new(state_width);
    let mut frontier: Vec<(usize, BitVector)> = Vec::new();
    let mut initial_indices = Vec::new();
    for encoding in initial {
        let index = storage.index_of_or_add(encoding)?;
        if index == frontier.len() {
            frontier.push((index, encoding.clone()));
        }
        initial_indices.push(index);
    }

    // Per state, per choice, the (successor index, probability) pairs.
    let mut transitions: Vec<Vec<Vec<(usize, f64)>>> = Vec::new();
    let mut cursor = 0;
    while cursor < frontier.len() {
        let (state, encoding) = frontier[cursor].clone();
        cursor += 1;
        debug_assert_eq!(state, cursor - 1);

        let mut choices = Vec::new();
        for choice in successors(&encoding) {
            let mut resolved = Vec::with_capacity(choice.len());
            for (successor, probability) in choice {
                let known = storage.len();
                let index = storage.index_of_or_add(&successor)?;
                if index == known {
                    frontier.push((index, successor));
                }
                resolved.push((index, probability));
            }
            choices.push(resolved);
        }
        if choices.is_empty() {
            // Deadlock: absorb in place.
            choices.push(vec![(state, 1.0)]);
        }
        transitions.push(choices);
    }

    let state_count = transitions.len();
    info!(states = state_count, "exploration finished");

    // Move the initial states to the front, preserving discovery order
    // within both halves.
    let is_initial = BitVector::from_indices(state_count, &initial_indices);
    let mut permutation = vec![0usize; state_count];
    let mut next = 0;
    for state in is_initial.iter() {
        permutation[state] = next;
        next += 1;
    }
    for state in 0..state_count {
        if !is_initial.get(state) {
            permutation[state] = next;
            next += 1;
        }
    }
    let mut inverse = vec![0usize; state_count];
    for (old, &new) in permutation.iter().enumerate() {
        inverse[new] = old;
    }
    storage.remap(&permutation);

    let mut builder = SparseMatrixBuilder::with_row_groups();
    let mut row = 0;
    for new_state in 0..state_count {
        builder.new_row_group(row);
        for choice in &transitions[inverse[new_state]] {
            let mut entries: Vec<(usize, f64)> = choice
                .iter()
                .map(|&(old, probability)| (permutation[old], probability))
                .collect();
            entries.sort_by_key(|&(column, _)| column);
            let mut last: Option<usize> = None;
            for (column, value) in entries {
                if last == Some(column) {
                    builder.add_to_last_value(value);
                } else {
                    builder.add_next_value(row, column, value);
                    last = Some(column);
                }
            }
            row += 1;
        }
    }
    let matrix = builder.build_with_dimensions(row, state_count);

    let initial_count = is_initial.count_ones();
    Ok(ExploredModel {
        model: SparseModel::new(matrix),
        initial_states: BitVector::from_fn(state_count, |state| state < initial_count),
        storage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoding(value: usize) -> BitVector {
        BitVector::from_fn(64, |i| (value >> i) & 1 == 1)
    }

    /// Random walk on 0..=limit: below the limit, step up or down with
    /// equal probability (two choices at 0: stay or step).
    fn walk(limit: usize) -> impl FnMut(&BitVector) -> Vec<Choice> {
        move |state: &BitVector| {
            let value = state.iter().fold(0usize, |acc, bit| acc | (1 << bit));
            if value >= limit {
                return vec![];
            }
            let down = value.saturating_sub(1);
            vec![vec![
                (encoding(value + 1), 0.5),
                (encoding(down), 0.5),
            ]]
        }
    }

    #[test]
    fn test_exploration_deduplicates() {
        let explored = explore(64, &[encoding(0)], walk(3)).unwrap();
        // States 0, 1, 2, 3: each encoding appears exactly once.
        assert_eq!(explored.model.state_count(), 4);
        assert_eq!(explored.storage.len(), 4);
    }

    #[test]
    fn test_initial_state_is_front() {
        // Explore from the middle; the initial encoding must end up at
        // index 0 after the finalize permutation.
        let explored = explore(64, &[encoding(2)], walk(3)).unwrap();
        assert_eq!(explored.storage.index_of(&encoding(2)), Some(0));
        assert!(explored.initial_states.get(0));
        assert_eq!(explored.initial_states.count_ones(), 1);
    }

    #[test]
    fn test_deadlock_gets_self_loop() {
        let explored = explore(64, &[encoding(0)], walk(2)).unwrap();
        let matrix = explored.model.transition_matrix();
        let deadlock = explored.storage.index_of(&encoding(2)).unwrap();
        let row = matrix.row_group_range(deadlock).start;
        assert_eq!(matrix.row(row).len(), 1);
        assert_eq!(matrix.row(row)[0].column, deadlock);
    }

    #[test]
    fn test_rows_are_distributions() {
        // 0 at the boundary: walk(3) from 0 steps down to 0 itself, which
        // merges the two half-probability edges into one self entry.
        let explored = explore(64, &[encoding(0)], walk(3)).unwrap();
        let matrix = explored.model.transition_matrix();
        for row in 0..matrix.row_count() {
            assert!((matrix.row_sum(row) - 1.0).abs() < 1e-12);
        }
    }
}
