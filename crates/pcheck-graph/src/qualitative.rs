//! Qualitative probability-0 / probability-1 classification.
//!
//! All analyses run on the explicit transition matrix together with its
//! transposed (backward) relation. For nondeterministic models every
//! analysis comes in an existential flavor (some resolution of the choices)
//! and a universal flavor (every resolution); for deterministic models the
//! two coincide and the plain `prob01` entry point applies.
//!
//! Phi/psi follow the until-formula reading: `phi U psi` holds on paths
//! that stay in `phi` until they hit `psi`.

use pcheck_storage::{BitVector, SparseMatrix};
use tracing::debug;

/// How the choices of a state are resolved when a condition is checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceQuantifier {
    /// Some choice satisfies the condition (best-case scheduler).
    Exists,
    /// Every choice satisfies the condition (worst-case scheduler).
    Forall,
}

/// States reaching `psi` through `phi` with positive probability under some
/// scheduler. Least fixpoint by backward breadth-first search.
pub fn prob_greater0_e(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    prob_greater0(matrix, backward, phi, psi, ChoiceQuantifier::Exists)
}

/// States reaching `psi` through `phi` with positive probability under every
/// scheduler.
pub fn prob_greater0_a(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    prob_greater0(matrix, backward, phi, psi, ChoiceQuantifier::Forall)
}

fn prob_greater0(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
    quantifier: ChoiceQuantifier,
) -> BitVector {
    check_dimensions(matrix, backward, phi, psi);
    let mut result = psi.clone();
    let mut worklist: Vec<usize> = psi.iter().collect();
    while let Some(state) = worklist.pop() {
        for entry in backward.row(state) {
            let pred = entry.column;
            if !phi.get(pred) || result.get(pred) {
                continue;
            }
            // An edge into the reached set triggers a recheck of the
            // predecessor; the condition is monotone in `result`, so missed
            // early checks are repaired by later triggers.
            if choice_condition(matrix, pred, quantifier, |succ| result.get(succ)) {
                result.set(pred, true);
                worklist.push(pred);
            }
        }
    }
    debug!(
        quantifier = ?quantifier,
        states = result.count_ones(),
        "positive-probability classification"
    );
    result
}

/// States reaching `psi` through `phi` with probability one under some
/// scheduler. Greatest-least fixpoint: the outer set shrinks to the states
/// that can avoid ever leaking probability outside of it.
pub fn prob1_e(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    prob1(matrix, backward, phi, psi, ChoiceQuantifier::Exists)
}

/// States reaching `psi` through `phi` with probability one under every
/// scheduler.
pub fn prob1_a(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    prob1(matrix, backward, phi, psi, ChoiceQuantifier::Forall)
}

fn prob1(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
    quantifier: ChoiceQuantifier,
) -> BitVector {
    check_dimensions(matrix, backward, phi, psi);
    let mut outer = BitVector::full(matrix.row_group_count());
    loop {
        // Inner least fixpoint relative to the current outer candidate: a
        // state joins when the quantified choices both stay inside `outer`
        // and make progress into the inner set.
        let mut inner = psi.clone();
        let mut worklist: Vec<usize> = psi.iter().collect();
        while let Some(state) = worklist.pop() {
            for entry in backward.row(state) {
                let pred = entry.column;
                if !phi.get(pred) || inner.get(pred) {
                    continue;
                }
                let satisfied = quantified_rows(matrix, pred, quantifier, |row| {
                    let entries = matrix.row(row);
                    entries.iter().all(|e| outer.get(e.column))
                        && entries.iter().any(|e| inner.get(e.column))
                });
                if satisfied {
                    inner.set(pred, true);
                    worklist.push(pred);
                }
            }
        }
        if inner == outer {
            debug!(
                quantifier = ?quantifier,
                states = outer.count_ones(),
                "probability-one classification"
            );
            return outer;
        }
        outer = inner;
    }
}

/// Probability-0 and probability-1 state sets of a deterministic model.
pub fn prob01(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) -> (BitVector, BitVector) {
    assert!(
        matrix.has_trivial_row_grouping(),
        "deterministic classification on a nondeterministic matrix"
    );
    let prob0 = prob_greater0_e(matrix, backward, phi, psi).complement();
    let prob1 = prob1_e(matrix, backward, phi, psi);
    (prob0, prob1)
}

/// Probability-0 and probability-1 state sets under maximizing resolution:
/// probability 0 even under the best scheduler, probability 1 under some
/// scheduler.
pub fn prob01_max(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) -> (BitVector, BitVector) {
    let prob0 = prob_greater0_e(matrix, backward, phi, psi).complement();
    let prob1 = prob1_e(matrix, backward, phi, psi);
    (prob0, prob1)
}

/// Probability-0 and probability-1 state sets under minimizing resolution:
/// probability 0 under some scheduler, probability 1 under every scheduler.
pub fn prob01_min(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) -> (BitVector, BitVector) {
    let prob0 = prob_greater0_a(matrix, backward, phi, psi).complement();
    let prob1 = prob1_a(matrix, backward, phi, psi);
    (prob0, prob1)
}

/// For every state that reaches `psi` through `phi` under some scheduler,
/// the offset (within its row group) of a choice that moves strictly closer
/// to `psi`. States outside the reaching set keep offset 0. Following the
/// returned choices from any reaching state arrives at `psi` with positive
/// probability, which makes the selection a valid initial scheduler for the
/// solvers that demand one.
pub fn scheduler_prob_greater0_e(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) -> Vec<usize> {
    check_dimensions(matrix, backward, phi, psi);
    let mut choices = vec![0usize; matrix.row_group_count()];
    let mut reached = psi.clone();
    let mut worklist: Vec<usize> = psi.iter().collect();
    while let Some(state) = worklist.pop() {
        for entry in backward.row(state) {
            let pred = entry.column;
            if !phi.get(pred) || reached.get(pred) {
                continue;
            }
            let group_start = matrix.row_group_indices()[pred];
            let picked = matrix
                .row_group_range(pred)
                .find(|&row| matrix.row(row).iter().any(|e| reached.get(e.column)));
            if let Some(row) = picked {
                choices[pred] = row - group_start;
                reached.set(pred, true);
                worklist.push(pred);
            }
        }
    }
    choices
}

/// Evaluate the quantified per-choice condition "some successor satisfies
/// `pred`" for one state.
fn choice_condition(
    matrix: &SparseMatrix,
    state: usize,
    quantifier: ChoiceQuantifier,
    pred: impl Fn(usize) -> bool,
) -> bool {
    quantified_rows(matrix, state, quantifier, |row| {
        matrix.row(row).iter().any(|e| pred(e.column))
    })
}

fn quantified_rows(
    matrix: &SparseMatrix,
    state: usize,
    quantifier: ChoiceQuantifier,
    mut condition: impl FnMut(usize) -> bool,
) -> bool {
    let mut rows = matrix.row_group_range(state);
    match quantifier {
        ChoiceQuantifier::Exists => rows.any(|row| condition(row)),
        ChoiceQuantifier::Forall => rows.all(|row| condition(row)),
    }
}

fn check_dimensions(
    matrix: &SparseMatrix,
    backward: &SparseMatrix,
    phi: &BitVector,
    psi: &BitVector,
) {
    let n = matrix.row_group_count();
    assert_eq!(backward.row_count(), n, "backward relation has wrong shape");
    assert_eq!(phi.len(), n, "phi has wrong capacity");
    assert_eq!(psi.len(), n, "psi has wrong capacity");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcheck_storage::SparseMatrixBuilder;

    /// Four-state MDP. State 0 chooses between moving to 1 and moving to
    /// the sink 3; state 1 flips a coin between the target 2 and back to 0;
    /// 2 and 3 are absorbing.
    pub(crate) fn coin_mdp() -> (SparseMatrix, SparseMatrix) {
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0);
        builder.add_next_value(0, 1, 1.0);
        builder.add_next_value(1, 3, 1.0);
        builder.new_row_group(2);
        builder.add_next_value(2, 0, 0.5);
        builder.add_next_value(2, 2, 0.5);
        builder.new_row_group(3);
        builder.add_next_value(3, 2, 1.0);
        builder.new_row_group(4);
        builder.add_next_value(4, 3, 1.0);
        let matrix = builder.build_with_dimensions(5, 4);
        let backward = matrix.transpose();
        (matrix, backward)
    }

    fn all(n: usize) -> BitVector {
        BitVector::full(n)
    }

    #[test]
    fn test_prob_greater0_existential() {
        let (m, b) = coin_mdp();
        let psi = BitVector::from_indices(4, &[2]);
        let result = prob_greater0_e(&m, &b, &all(4), &psi);
        assert_eq!(result, BitVector::from_indices(4, &[0, 1, 2]));
    }

    #[test]
    fn test_prob_greater0_universal() {
        let (m, b) = coin_mdp();
        let psi = BitVector::from_indices(4, &[2]);
        // State 0 can pick the sink choice, so it is not included.
        let result = prob_greater0_a(&m, &b, &all(4), &psi);
        assert_eq!(result, BitVector::from_indices(4, &[1, 2]));
    }

    #[test]
    fn test_prob01_max() {
        let (m, b) = coin_mdp();
        let psi = BitVector::from_indices(4, &[2]);
        let (prob0, prob1) = prob01_max(&m, &b, &all(4), &psi);
        assert_eq!(prob0, BitVector::from_indices(4, &[3]));
        // Always retrying the coin reaches the target almost surely.
        assert_eq!(prob1, BitVector::from_indices(4, &[0, 1, 2]));
    }

    #[test]
    fn test_prob01_min() {
        let (m, b) = coin_mdp();
        let psi = BitVector::from_indices(4, &[2]);
        let (prob0, prob1) = prob01_min(&m, &b, &all(4), &psi);
        assert_eq!(prob0, BitVector::from_indices(4, &[0, 3]));
        assert_eq!(prob1, BitVector::from_indices(4, &[2]));
    }

    #[test]
    fn test_phi_constrains_the_path() {
        let (m, b) = coin_mdp();
        let psi = BitVector::from_indices(4, &[2]);
        // Forbidding state 1 cuts every path from 0 to the target.
        let phi = BitVector::from_indices(4, &[0, 2, 3]);
        let result = prob_greater0_e(&m, &b, &phi, &psi);
        assert_eq!(result, BitVector::from_indices(4, &[2]));
    }

    #[test]
    fn test_deterministic_prob01() {
        // 0 -> {1: 0.5, 2: 0.5}, 1 and 2 absorbing.
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 1, 0.5);
        builder.add_next_value(0, 2, 0.5);
        builder.add_next_value(1, 1, 1.0);
        builder.add_next_value(2, 2, 1.0);
        let m = builder.build_with_dimensions(3, 3);
        let b = m.transpose();
        let psi = BitVector::from_indices(3, &[1]);
        let (prob0, prob1) = prob01(&m, &b, &all(3), &psi);
        assert_eq!(prob0, BitVector::from_indices(3, &[2]));
        assert_eq!(prob1, BitVector::from_indices(3, &[1]));
    }

    #[test]
    #[should_panic(expected = "nondeterministic")]
    fn test_prob01_rejects_row_groups() {
        let (m, b) = coin_mdp();
        let psi = BitVector::from_indices(4, &[2]);
        prob01(&m, &b, &all(4), &psi);
    }

    #[test]
    fn test_scheduler_moves_toward_target() {
        let (m, b) = coin_mdp();
        let psi = BitVector::from_indices(4, &[2]);
        let choices = scheduler_prob_greater0_e(&m, &b, &all(4), &psi);
        // State 0 must pick the first choice (toward 1), not the sink.
        assert_eq!(choices[0], 0);
        assert_eq!(choices[1], 0);
    }
}
