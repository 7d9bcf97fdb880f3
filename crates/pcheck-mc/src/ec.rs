//! End component elimination.
//!
//! Value iteration over a system containing end components can stall below
//! the true fixed point. Before such a system is handed to a solver that
//! demands their absence, every maximal end component inside the maybe
//! states is collapsed into a single state that keeps only the exit
//! choices of its members. The folding map survives the solve so the
//! reduced solution can be expanded back to the original states (all
//! members of a component share its value).

use pcheck_graph::maximal_end_components;
use pcheck_storage::{BitVector, SparseMatrix, SparseMatrixBuilder};
use tracing::debug;

/// Sentinel for states that do not participate in the reduced system.
pub const NOT_IN_SYSTEM: usize = usize::MAX;

/// The folding map of one elimination.
#[derive(Clone, Debug)]
pub struct EndComponentInformation {
    state_to_reduced: Vec<usize>,
    reduced_state_count: usize,
    first_ec_state: usize,
}

impl EndComponentInformation {
    /// Reduced index of an original state, if it participates.
    pub fn reduced_index(&self, state: usize) -> Option<usize> {
        let index = self.state_to_reduced[state];
        (index != NOT_IN_SYSTEM).then_some(index)
    }

    #[inline]
    pub fn reduced_state_count(&self) -> usize {
        self.reduced_state_count
    }

    /// Number of collapsed components.
    pub fn ec_count(&self) -> usize {
        self.reduced_state_count - self.first_ec_state
    }

    /// Whether a reduced state stands for a collapsed component.
    pub fn is_ec_state(&self, reduced_state: usize) -> bool {
        reduced_state >= self.first_ec_state
    }

    /// Expand the reduced solution to one value per maybe state, ascending.
    /// Members of a collapsed component all receive the component's value.
    pub fn set_values(&self, maybe_states: &BitVector, reduced_values: &[f64]) -> Vec<f64> {
        assert_eq!(reduced_values.len(), self.reduced_state_count);
        maybe_states
            .iter()
            .map(|state| {
                let reduced = self.state_to_reduced[state];
                assert_ne!(reduced, NOT_IN_SYSTEM, "maybe state lost by the folding map");
                reduced_values[reduced]
            })
            .collect()
    }
}

/// Result of collapsing the end components of a subsystem.
pub struct EcElimination {
    /// The reduced transition matrix over the reduced states.
    pub matrix: SparseMatrix,
    /// Per reduced row, the one-step probability mass into `target_states`.
    pub target_probabilities: Vec<f64>,
    /// Per reduced row, the carried-over value of its original row.
    pub row_values: Option<Vec<f64>>,
    pub info: EndComponentInformation,
}

/// Collapse the maximal end components of the subsystem spanned by
/// `maybe_states`.
///
/// Reduced states are the maybe states outside any component (ascending),
/// followed by one state per component. Component states keep the member
/// rows that are not staying choices. Entries into `target_states` are
/// folded into `target_probabilities`; entries leaving the subsystem
/// elsewhere are dropped. `ec_choice_filter` restricts which rows may form
/// a component (e.g. only zero-reward choices); `row_values` is carried
/// row-by-row into the reduced system.
///
/// Precondition: the subsystem can reach `target_states`, i.e. at least
/// one reduced row exists.
pub fn eliminate_end_components(
    matrix: &SparseMatrix,
    maybe_states: &BitVector,
    target_states: &BitVector,
    ec_choice_filter: Option<&BitVector>,
    row_values: Option<&[f64]>,
) -> EcElimination {
    assert_eq!(maybe_states.len(), matrix.row_group_count());
    assert_eq!(target_states.len(), matrix.column_count());
    if let Some(values) = row_values {
        assert_eq!(values.len(), matrix.row_count());
    }

    let mecs = maximal_end_components(matrix, maybe_states, ec_choice_filter);

    // Non-component maybe states first, components after.
    let mut state_to_reduced = vec![NOT_IN_SYSTEM; matrix.row_group_count()];
    let mut membership = vec![NOT_IN_SYSTEM; matrix.row_group_count()];
    for (mec_index, mec) in mecs.iter().enumerate() {
        for state in mec.states() {
            membership[state] = mec_index;
        }
    }
    let mut first_ec_state = 0;
    for state in maybe_states.iter() {
        if membership[state] == NOT_IN_SYSTEM {
            state_to_reduced[state] = first_ec_state;
            first_ec_state += 1;
        }
    }
    for (mec_index, mec) in mecs.iter().enumerate() {
        for state in mec.states() {
            state_to_reduced[state] = first_ec_state + mec_index;
        }
    }
    let reduced_state_count = first_ec_state + mecs.len();

    let mut builder = SparseMatrixBuilder::with_row_groups();
    let mut target_probabilities = Vec::new();
    let mut reduced_row_values = row_values.map(|_| Vec::new());
    let mut next_row = 0;

    let mut add_row = |builder: &mut SparseMatrixBuilder,
                       next_row: &mut usize,
                       original_row: usize| {
        let mut entries: Vec<(usize, f64)> = Vec::new();
        let mut target_mass = 0.0;
        for entry in matrix.row(original_row) {
            if maybe_states.get(entry.column) {
                entries.push((state_to_reduced[entry.column], entry.value));
            } else if target_states.get(entry.column) {
                target_mass += entry.value;
            }
            // Mass into other removed states is dropped.
        }
        entries.sort_by_key(|(column, _)| *column);
        let mut last: Option<usize> = None;
        for (column, value) in entries {
            // Several members of one component show up as one column.
            if last == Some(column) {
                builder.add_to_last_value(value);
            } else {
                builder.add_next_value(*next_row, column, value);
                last = Some(column);
            }
        }
        target_probabilities.push(target_mass);
        if let (Some(reduced), Some(values)) = (&mut reduced_row_values, row_values) {
            reduced.push(values[original_row]);
        }
        *next_row += 1;
    };

    for state in maybe_states.iter() {
        if membership[state] != NOT_IN_SYSTEM {
            continue;
        }
        builder.new_row_group(next_row);
        for row in matrix.row_group_range(state) {
            add_row(&mut builder, &mut next_row, row);
        }
    }
    for mec in &mecs {
        builder.new_row_group(next_row);
        for (state, staying) in mec.iter() {
            for row in matrix.row_group_range(state) {
                if staying.contains(&row) {
                    continue;
                }
                add_row(&mut builder, &mut next_row, row);
            }
        }
    }

    assert!(next_row > 0, "subsystem has no choices left after folding");
    let reduced_matrix = builder.build_with_dimensions(next_row, reduced_state_count);
    debug!(
        original_states = maybe_states.count_ones(),
        reduced_states = reduced_state_count,
        components = mecs.len(),
        "end components eliminated"
    );

    EcElimination {
        matrix: reduced_matrix,
        target_probabilities,
        row_values: reduced_row_values,
        info: EndComponentInformation {
            state_to_reduced,
            reduced_state_count,
            first_ec_state,
        },
    }
}
