//! Maximal end component decomposition.
//!
//! An end component is a set of states together with, for every member, a
//! nonempty set of choices that never leave the component. Under any
//! scheduler that stays inside, the component is visited forever; the
//! quantitative pipeline must collapse or otherwise neutralize them before
//! handing an equation system to a solver that assumes contraction.

use pcheck_storage::{BitVector, SparseMatrix};
use tracing::debug;

use crate::scc::strongly_connected_components;

/// One maximal end component: member states in ascending order, each with
/// the global row indices of its staying choices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaximalEndComponent {
    state_choices: Vec<(usize, Vec<usize>)>,
}

impl MaximalEndComponent {
    /// Number of member states.
    pub fn len(&self) -> usize {
        self.state_choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_choices.is_empty()
    }

    /// Member states in ascending order.
    pub fn states(&self) -> impl Iterator<Item = usize> + '_ {
        self.state_choices.iter().map(|(s, _)| *s)
    }

    /// Iterate over `(state, staying choice rows)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.state_choices.iter().map(|(s, c)| (*s, c.as_slice()))
    }

    pub fn contains_state(&self, state: usize) -> bool {
        self.state_choices
            .binary_search_by_key(&state, |(s, _)| *s)
            .is_ok()
    }

    /// The staying choice rows of a member state.
    ///
    /// Precondition: `contains_state(state)`.
    pub fn choices_of(&self, state: usize) -> &[usize] {
        let pos = self
            .state_choices
            .binary_search_by_key(&state, |(s, _)| *s)
            .unwrap_or_else(|_| panic!("state {state} is not a member of the end component"));
        &self.state_choices[pos].1
    }
}

/// Decompose the subsystem spanned by `candidates` into maximal end
/// components. `choice_filter` (over rows) restricts which choices may
/// participate at all; passing the zero-reward rows, for example, yields
/// exactly the end components a reward accumulation can hide in.
///
/// Iterated SCC refinement: components are repeatedly split until every
/// remaining member keeps at least one choice that is fully contained.
/// Trivial components without a staying choice are dropped.
pub fn maximal_end_components(
    matrix: &SparseMatrix,
    candidates: &BitVector,
    choice_filter: Option<&BitVector>,
) -> Vec<MaximalEndComponent> {
    assert_eq!(candidates.len(), matrix.row_group_count());
    if let Some(filter) = choice_filter {
        assert_eq!(filter.len(), matrix.row_count());
    }

    let mut result = Vec::new();
    let mut worklist: Vec<BitVector> = vec![candidates.clone()];

    while let Some(subsystem) = worklist.pop() {
        for component in strongly_connected_components(matrix, &subsystem, choice_filter) {
            let members = BitVector::from_indices(matrix.row_group_count(), &component);
            let mut state_choices = Vec::with_capacity(component.len());
            let mut removed_any = false;
            for &state in &component {
                let staying: Vec<usize> = matrix
                    .row_group_range(state)
                    .filter(|&row| {
                        choice_filter.map_or(true, |f| f.get(row))
                            && matrix.row(row).iter().all(|e| members.get(e.column))
                    })
                    .collect();
                if staying.is_empty() {
                    removed_any = true;
                } else {
                    state_choices.push((state, staying));
                }
            }
            if !removed_any {
                // Every member can stay; a strongly connected set with only
                // staying choices is a maximal end component.
                result.push(MaximalEndComponent { state_choices });
            } else if !state_choices.is_empty() {
                // Some members were forced out; the survivors may split
                // further, so they go back for another round.
                let survivors =
                    BitVector::from_fn(matrix.row_group_count(), |s| {
                        state_choices.binary_search_by_key(&s, |(m, _)| *m).is_ok()
                    });
                worklist.push(survivors);
            }
        }
    }
    result.sort_by_key(|mec| mec.state_choices[0].0);
    debug!(components = result.len(), "end component decomposition");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcheck_storage::SparseMatrixBuilder;

    /// States 0 and 1 cycle through each other; state 1 can also defect to
    /// the absorbing state 2.
    fn cycle_with_exit() -> SparseMatrix {
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0);
        builder.add_next_value(0, 1, 1.0);
        builder.new_row_group(1);
        builder.add_next_value(1, 0, 1.0);
        builder.add_next_value(2, 2, 1.0);
        builder.new_row_group(3);
        builder.add_next_value(3, 2, 1.0);
        builder.build_with_dimensions(4, 3)
    }

    #[test]
    fn test_cycle_and_sink_are_mecs() {
        let m = cycle_with_exit();
        let mecs = maximal_end_components(&m, &BitVector::full(3), None);
        assert_eq!(mecs.len(), 2);

        let cycle = &mecs[0];
        assert_eq!(cycle.states().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(cycle.choices_of(0), &[0]);
        // Only state 1's first row stays inside; the exit row is excluded.
        assert_eq!(cycle.choices_of(1), &[1]);

        let sink = &mecs[1];
        assert_eq!(sink.states().collect::<Vec<_>>(), vec![2]);
        assert_eq!(sink.choices_of(2), &[3]);
    }

    #[test]
    fn test_probabilistic_exit_breaks_component() {
        // 0 -> 1; 1 -> {0: 0.5, 2: 0.5}; 2 absorbing. The coin row leaves
        // with positive probability, so {0, 1} is no end component.
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 1, 1.0);
        builder.add_next_value(1, 0, 0.5);
        builder.add_next_value(1, 2, 0.5);
        builder.add_next_value(2, 2, 1.0);
        let m = builder.build_with_dimensions(3, 3);
        let mecs = maximal_end_components(&m, &BitVector::full(3), None);
        assert_eq!(mecs.len(), 1);
        assert_eq!(mecs[0].states().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_candidates_restrict_the_search() {
        let m = cycle_with_exit();
        let candidates = BitVector::from_indices(3, &[0, 1]);
        let mecs = maximal_end_components(&m, &candidates, None);
        assert_eq!(mecs.len(), 1);
        assert_eq!(mecs[0].states().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_choice_filter_restricts_staying_choices() {
        let m = cycle_with_exit();
        // Forbid state 1's row back to 0: the cycle cannot be closed.
        let filter = BitVector::from_indices(4, &[0, 2, 3]);
        let mecs = maximal_end_components(&m, &BitVector::full(3), Some(&filter));
        assert_eq!(mecs.len(), 1);
        assert_eq!(mecs[0].states().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_membership_queries() {
        let m = cycle_with_exit();
        let mecs = maximal_end_components(&m, &BitVector::full(3), None);
        assert!(mecs[0].contains_state(1));
        assert!(!mecs[0].contains_state(2));
        assert_eq!(mecs[0].len(), 2);
    }

    #[test]
    #[should_panic(expected = "not a member")]
    fn test_choices_of_non_member_panics() {
        let m = cycle_with_exit();
        let mecs = maximal_end_components(&m, &BitVector::full(3), None);
        mecs[0].choices_of(2);
    }
}
