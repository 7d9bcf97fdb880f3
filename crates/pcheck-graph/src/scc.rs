//! Strongly connected components of a restricted transition graph.
//!
//! Tarjan's algorithm with an explicit stack; recursion depth would scale
//! with the longest path of the model, which easily overflows the call
//! stack on chain-shaped state spaces.

use pcheck_storage::{BitVector, SparseMatrix};

/// Compute the strongly connected components of the graph induced by
/// `subsystem`. Only choices whose row is allowed by `choice_filter` (all
/// rows if `None`) and whose successors all stay inside `subsystem`
/// contribute edges; a choice that can leave the subsystem is no longer a
/// choice of the sub-model at all.
///
/// Components are returned in reverse topological order (successors first),
/// each as an ascending list of states.
pub fn strongly_connected_components(
    matrix: &SparseMatrix,
    subsystem: &BitVector,
    choice_filter: Option<&BitVector>,
) -> Vec<Vec<usize>> {
    assert_eq!(subsystem.len(), matrix.row_group_count());
    if let Some(filter) = choice_filter {
        assert_eq!(filter.len(), matrix.row_count());
    }

    let n = matrix.row_group_count();
    const UNVISITED: usize = usize::MAX;
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = BitVector::new(n);
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    let successors = |state: usize| -> Vec<usize> {
        let mut result = Vec::new();
        for row in matrix.row_group_range(state) {
            if choice_filter.map_or(false, |f| !f.get(row)) {
                continue;
            }
            let entries = matrix.row(row);
            if entries.iter().all(|e| subsystem.get(e.column)) {
                result.extend(entries.iter().map(|e| e.column));
            }
        }
        result.sort_unstable();
        result.dedup();
        result
    };

    // DFS frames: (state, successor list, position of the next successor).
    let mut frames: Vec<(usize, Vec<usize>, usize)> = Vec::new();
    for root in subsystem.iter() {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack.set(root, true);
        frames.push((root, successors(root), 0));

        while let Some(frame) = frames.last_mut() {
            let (state, succs, pos) = (frame.0, &frame.1, frame.2);
            if pos < succs.len() {
                let succ = succs[pos];
                frame.2 += 1;
                if index[succ] == UNVISITED {
                    index[succ] = next_index;
                    lowlink[succ] = next_index;
                    next_index += 1;
                    stack.push(succ);
                    on_stack.set(succ, true);
                    frames.push((succ, successors(succ), 0));
                } else if on_stack.get(succ) {
                    lowlink[state] = lowlink[state].min(index[succ]);
                }
            } else {
                frames.pop();
                if let Some(parent) = frames.last() {
                    lowlink[parent.0] = lowlink[parent.0].min(lowlink[state]);
                }
                if lowlink[state] == index[state] {
                    let mut component = Vec::new();
                    loop {
                        let member = stack
                            .pop()
                            .expect("component root is always on the Tarjan stack");
                        on_stack.set(member, false);
                        component.push(member);
                        if member == state {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcheck_storage::SparseMatrixBuilder;

    /// 0 <-> 1, 1 -> 2, 2 -> 3, 3 -> 2. Two nontrivial components.
    fn two_loops() -> SparseMatrix {
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 1, 1.0);
        builder.add_next_value(1, 0, 0.5);
        builder.add_next_value(1, 2, 0.5);
        builder.add_next_value(2, 3, 1.0);
        builder.add_next_value(3, 2, 1.0);
        builder.build_with_dimensions(4, 4)
    }

    #[test]
    fn test_components_found() {
        let m = two_loops();
        let all = BitVector::full(4);
        let mut sccs = strongly_connected_components(&m, &all, None);
        sccs.sort();
        assert_eq!(sccs, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_reverse_topological_order() {
        let m = two_loops();
        let all = BitVector::full(4);
        let sccs = strongly_connected_components(&m, &all, None);
        // {2, 3} has no outgoing edges, so it must be emitted first.
        assert_eq!(sccs[0], vec![2, 3]);
    }

    #[test]
    fn test_subsystem_cuts_edges() {
        let m = two_loops();
        // Without state 0 the loop 0 <-> 1 is gone; state 1's remaining
        // choice leaves for state 2.
        let sub = BitVector::from_indices(4, &[1, 2, 3]);
        let mut sccs = strongly_connected_components(&m, &sub, None);
        sccs.sort();
        assert_eq!(sccs, vec![vec![1], vec![2, 3]]);
    }

    #[test]
    fn test_partially_contained_choice_contributes_no_edge() {
        let m = two_loops();
        // State 1's single row targets both 0 and 2; excluding 2 removes
        // the whole choice, so 0 and 1 fall into singleton components.
        let sub = BitVector::from_indices(4, &[0, 1]);
        let mut sccs = strongly_connected_components(&m, &sub, None);
        sccs.sort();
        assert_eq!(sccs, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_choice_filter() {
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0);
        builder.add_next_value(0, 1, 1.0);
        builder.add_next_value(1, 0, 1.0); // second choice: self loop
        builder.new_row_group(2);
        builder.add_next_value(2, 0, 1.0);
        let m = builder.build_with_dimensions(3, 2);
        let all = BitVector::full(2);

        let unfiltered = strongly_connected_components(&m, &all, None);
        assert!(unfiltered.iter().any(|c| c == &vec![0, 1]));

        // Dropping state 0's first row removes the 0 -> 1 edge.
        let filter = BitVector::from_indices(3, &[1, 2]);
        let mut sccs = strongly_connected_components(&m, &all, Some(&filter));
        sccs.sort();
        assert_eq!(sccs, vec![vec![0], vec![1]]);
    }
}
