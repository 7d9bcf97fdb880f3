//! State elimination for deterministic models.
//!
//! Computes until probabilities on a DTMC without an iterative solver:
//! maybe states are eliminated one by one from a mutable copy of the
//! system, folding each state's outgoing mass into every row that still
//! references it. When the last state falls, the accumulated one-step
//! vector holds the exact reachability probabilities (up to rounding).

use pcheck_graph::prob01;
use pcheck_storage::{BitVector, FlexibleSparseMatrix, MatrixEntry, SparseMatrix};
use tracing::debug;

/// Probability of `phi U psi` for every state of a deterministic model,
/// by state elimination. Panics on a matrix with nontrivial row groups.
pub fn eliminate_until_probabilities(
    matrix: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) -> Vec<f64> {
    assert!(
        matrix.has_trivial_row_grouping(),
        "state elimination works on deterministic models only"
    );
    let backward = matrix.transpose();
    let (prob0, prob1) = prob01(matrix, &backward, phi, psi);
    let maybe = (&prob0 | &prob1).complement();

    let mut result = vec![0.0; matrix.row_group_count()];
    for state in prob1.iter() {
        result[state] = 1.0;
    }
    if maybe.is_zero() {
        return result;
    }

    // Private mutable copy of the maybe subsystem.
    let submatrix = matrix.submatrix(&maybe, &maybe);
    let mut flexible = FlexibleSparseMatrix::from_sparse_matrix(&submatrix, false);
    let mut one_step = matrix.constrained_row_group_sum_vector(&maybe, &prob1);
    let state_count = flexible.row_count();

    for state in 0..state_count {
        // Divide out the self loop first.
        let row = flexible.get_row_mut(state);
        let loop_probability = row
            .iter()
            .find(|e| e.column == state)
            .map_or(0.0, |e| e.value);
        assert!(
            loop_probability < 1.0,
            "maybe state {state} cannot leave itself"
        );
        let scale = 1.0 / (1.0 - loop_probability);
        row.retain(|e| e.column != state);
        for entry in row.iter_mut() {
            entry.value *= scale;
        }
        one_step[state] *= scale;

        // Substitute the state into every row still referencing it.
        let eliminated_row = flexible.get_row(state).to_vec();
        let eliminated_value = one_step[state];
        for other in 0..state_count {
            if other == state {
                continue;
            }
            let row = flexible.get_row_mut(other);
            let Some(position) = row.iter().position(|e| e.column == state) else {
                continue;
            };
            let weight = row[position].value;
            row.swap_remove(position);
            for entry in &eliminated_row {
                match row.iter_mut().find(|e| e.column == entry.column) {
                    Some(existing) => existing.value += weight * entry.value,
                    None => row.push(MatrixEntry::new(entry.column, weight * entry.value)),
                }
            }
            one_step[other] += weight * eliminated_value;
        }
    }
    flexible.update_dimensions();
    debug_assert_eq!(flexible.nonzero_entry_count(), 0);
    debug!(states = state_count, "state elimination finished");

    for (dense, state) in maybe.iter().enumerate() {
        result[state] = one_step[dense];
    }
    result
}
