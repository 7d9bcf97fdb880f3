//! Row-mutable sparse matrix used as scratch space during elimination.
//!
//! Unlike the CSR `SparseMatrix`, rows are individually owned vectors so
//! that elimination steps can merge a state's outgoing weight into its
//! predecessors and drop rows one at a time. Column indices within a row
//! need not be sorted but must be unique. The `column_count` and
//! `nonzero_entry_count` caches are only valid after `update_dimensions`.

use crate::bitvec::BitVector;
use crate::sparse_matrix::{MatrixEntry, SparseMatrix, SparseMatrixBuilder};

/// A sparse matrix whose rows can be structurally edited in place.
#[derive(Clone, Debug)]
pub struct FlexibleSparseMatrix {
    data: Vec<Vec<MatrixEntry>>,
    /// Group boundaries in terms of rows; length `group_count + 1`.
    row_group_indices: Vec<usize>,
    column_count: usize,
    nonzero_entry_count: usize,
    nontrivial_row_grouping: bool,
}

impl FlexibleSparseMatrix {
    /// An empty matrix with `rows` rows and trivial row grouping.
    pub fn with_rows(rows: usize) -> Self {
        Self {
            data: vec![Vec::new(); rows],
            row_group_indices: (0..=rows).collect(),
            column_count: 0,
            nonzero_entry_count: 0,
            nontrivial_row_grouping: false,
        }
    }

    /// An empty matrix with explicit row grouping. The boundary table must
    /// have one entry per group plus a closing boundary and be monotone.
    pub fn with_row_groups(row_group_indices: Vec<usize>) -> Self {
        assert!(!row_group_indices.is_empty(), "missing closing boundary");
        assert!(
            row_group_indices.windows(2).all(|w| w[0] <= w[1]),
            "row group boundaries must be monotonically increasing"
        );
        let rows = row_group_indices[row_group_indices.len() - 1];
        Self {
            data: vec![Vec::new(); rows],
            row_group_indices,
            column_count: 0,
            nonzero_entry_count: 0,
            nontrivial_row_grouping: true,
        }
    }

    /// Copy an immutable matrix into the mutable representation. With
    /// `set_all_values_to_one` the structure is kept but every entry value
    /// becomes 1.0 (used when only the transition relation matters).
    pub fn from_sparse_matrix(matrix: &SparseMatrix, set_all_values_to_one: bool) -> Self {
        let mut data = Vec::with_capacity(matrix.row_count());
        for row in 0..matrix.row_count() {
            let entries = matrix
                .row(row)
                .iter()
                .map(|e| {
                    if set_all_values_to_one {
                        MatrixEntry::new(e.column, 1.0)
                    } else {
                        *e
                    }
                })
                .collect();
            data.push(entries);
        }
        Self {
            data,
            row_group_indices: matrix.row_group_indices().to_vec(),
            column_count: matrix.column_count(),
            nonzero_entry_count: matrix.entry_count(),
            nontrivial_row_grouping: !matrix.has_trivial_row_grouping(),
        }
    }

    /// Number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    /// Cached column count; stale until `update_dimensions` after edits.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Cached nonzero entry count; stale until `update_dimensions`.
    #[inline]
    pub fn nonzero_entry_count(&self) -> usize {
        self.nonzero_entry_count
    }

    /// Number of row groups.
    #[inline]
    pub fn row_group_count(&self) -> usize {
        self.row_group_indices.len() - 1
    }

    /// Number of rows in the given group.
    pub fn row_group_size(&self, group: usize) -> usize {
        self.row_group_indices[group + 1] - self.row_group_indices[group]
    }

    /// Whether the matrix (possibly) has more than one row per group.
    #[inline]
    pub fn has_nontrivial_row_grouping(&self) -> bool {
        self.nontrivial_row_grouping
    }

    /// The row-group boundary table.
    pub fn row_group_indices(&self) -> &[usize] {
        &self.row_group_indices
    }

    /// True iff the matrix holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|row| row.is_empty())
    }

    /// Read-only view of a row.
    #[inline]
    pub fn get_row(&self, row: usize) -> &[MatrixEntry] {
        &self.data[row]
    }

    /// Mutable view of a row.
    #[inline]
    pub fn get_row_mut(&mut self, row: usize) -> &mut Vec<MatrixEntry> {
        &mut self.data[row]
    }

    /// Read-only view of the `offset`th row in the given group. Requires a
    /// nontrivial row grouping.
    pub fn get_row_in_group(&self, group: usize, offset: usize) -> &[MatrixEntry] {
        assert!(
            self.nontrivial_row_grouping,
            "row-group access on a matrix with trivial row grouping"
        );
        assert!(offset < self.row_group_size(group), "row offset out of group");
        &self.data[self.row_group_indices[group] + offset]
    }

    /// Mutable view of the `offset`th row in the given group.
    pub fn get_row_in_group_mut(&mut self, group: usize, offset: usize) -> &mut Vec<MatrixEntry> {
        assert!(
            self.nontrivial_row_grouping,
            "row-group access on a matrix with trivial row grouping"
        );
        assert!(offset < self.row_group_size(group), "row offset out of group");
        &mut self.data[self.row_group_indices[group] + offset]
    }

    /// Reserve space for additional entries in a row.
    pub fn reserve_in_row(&mut self, row: usize, number_of_entries: usize) {
        self.data[row].reserve(number_of_entries);
    }

    /// Recompute the column and nonzero-entry caches. Callers must invoke
    /// this after structural edits before relying on the derived queries.
    pub fn update_dimensions(&mut self) {
        self.nonzero_entry_count = 0;
        self.column_count = 0;
        for row in &self.data {
            for entry in row {
                if entry.value != 0.0 {
                    self.nonzero_entry_count += 1;
                    self.column_count = self.column_count.max(entry.column + 1);
                }
            }
        }
    }

    /// Whether the row group of `state` has an entry on the diagonal, i.e.
    /// the state has a self-loop of arbitrary weight.
    pub fn row_has_diagonal_element(&self, state: usize) -> bool {
        let range = self.row_group_indices[state]..self.row_group_indices[state + 1];
        self.data[range]
            .iter()
            .any(|row| row.iter().any(|e| e.column == state))
    }

    /// In place, drop all rows of groups not in `row_constraint` and all
    /// entries with columns not in `column_constraint`, renumbering the
    /// remaining rows, groups and columns densely.
    pub fn create_submatrix(&mut self, row_constraint: &BitVector, column_constraint: &BitVector) {
        assert_eq!(row_constraint.len(), self.row_group_count());
        let mut column_map = vec![usize::MAX; column_constraint.len()];
        for (dense, bit) in column_constraint.iter().enumerate() {
            column_map[bit] = dense;
        }

        let mut new_data = Vec::new();
        let mut new_group_indices = vec![0];
        for group in row_constraint.iter() {
            for row in self.row_group_indices[group]..self.row_group_indices[group + 1] {
                let entries = std::mem::take(&mut self.data[row]);
                new_data.push(
                    entries
                        .into_iter()
                        .filter_map(|e| {
                            let new_column = column_map[e.column];
                            (new_column != usize::MAX)
                                .then(|| MatrixEntry::new(new_column, e.value))
                        })
                        .collect(),
                );
            }
            new_group_indices.push(new_data.len());
        }
        self.data = new_data;
        self.row_group_indices = new_group_indices;
        self.update_dimensions();
    }

    /// Convert back to the immutable CSR representation. Row entries are
    /// sorted by column on the way out.
    pub fn create_sparse_matrix(&self) -> SparseMatrix {
        let mut builder = if self.nontrivial_row_grouping {
            SparseMatrixBuilder::with_row_groups()
        } else {
            SparseMatrixBuilder::new()
        };
        let mut next_group = 0;
        let mut column_count = 0;
        for (row, entries) in self.data.iter().enumerate() {
            if self.nontrivial_row_grouping {
                while next_group < self.row_group_count()
                    && self.row_group_indices[next_group] == row
                {
                    builder.new_row_group(row);
                    next_group += 1;
                }
            }
            let mut sorted: Vec<MatrixEntry> = entries.clone();
            sorted.sort_by_key(|e| e.column);
            for entry in sorted {
                builder.add_next_value(row, entry.column, entry.value);
                column_count = column_count.max(entry.column + 1);
            }
        }
        if self.nontrivial_row_grouping {
            while next_group < self.row_group_count() {
                builder.new_row_group(self.data.len());
                next_group += 1;
            }
        }
        builder.build_with_dimensions(self.data.len().max(1), column_count.max(self.column_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouped_matrix() -> SparseMatrix {
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0);
        builder.add_next_value(0, 0, 0.2);
        builder.add_next_value(0, 1, 0.8);
        builder.add_next_value(1, 2, 1.0);
        builder.new_row_group(2);
        builder.add_next_value(2, 2, 1.0);
        builder.new_row_group(3);
        builder.add_next_value(3, 0, 0.5);
        builder.add_next_value(3, 2, 0.5);
        builder.build_with_dimensions(4, 3)
    }

    #[test]
    fn test_round_trip_preserves_rows_and_groups() {
        let original = grouped_matrix();
        let flexible = FlexibleSparseMatrix::from_sparse_matrix(&original, false);
        let back = flexible.create_sparse_matrix();
        assert_eq!(back, original);
    }

    #[test]
    fn test_set_all_values_to_one() {
        let flexible = FlexibleSparseMatrix::from_sparse_matrix(&grouped_matrix(), true);
        assert!(flexible.get_row(0).iter().all(|e| e.value == 1.0));
    }

    #[test]
    fn test_row_group_access() {
        let flexible = FlexibleSparseMatrix::from_sparse_matrix(&grouped_matrix(), false);
        assert!(flexible.has_nontrivial_row_grouping());
        assert_eq!(flexible.row_group_count(), 3);
        assert_eq!(flexible.get_row_in_group(0, 1), flexible.get_row(1));
        assert_eq!(flexible.row_group_size(0), 2);
    }

    #[test]
    #[should_panic(expected = "trivial row grouping")]
    fn test_group_access_requires_nontrivial_grouping() {
        let flexible = FlexibleSparseMatrix::with_rows(3);
        flexible.get_row_in_group(0, 0);
    }

    #[test]
    fn test_diagonal_detection() {
        let flexible = FlexibleSparseMatrix::from_sparse_matrix(&grouped_matrix(), false);
        // State 0 has a 0.2 self loop in its first row.
        assert!(flexible.row_has_diagonal_element(0));
        // State 1 owns row 2, which only targets column 2.
        assert!(!flexible.row_has_diagonal_element(1));
        // State 2 owns row 3, which has an entry in column 2.
        assert!(flexible.row_has_diagonal_element(2));
    }

    #[test]
    fn test_update_dimensions_after_edit() {
        let mut flexible = FlexibleSparseMatrix::with_rows(2);
        flexible.get_row_mut(0).push(MatrixEntry::new(5, 0.3));
        flexible.get_row_mut(1).push(MatrixEntry::new(1, 0.7));
        flexible.update_dimensions();
        assert_eq!(flexible.column_count(), 6);
        assert_eq!(flexible.nonzero_entry_count(), 2);

        flexible.get_row_mut(0).clear();
        flexible.update_dimensions();
        assert_eq!(flexible.column_count(), 2);
        assert_eq!(flexible.nonzero_entry_count(), 1);
    }

    #[test]
    fn test_create_submatrix_in_place() {
        let mut flexible = FlexibleSparseMatrix::from_sparse_matrix(&grouped_matrix(), false);
        let keep_rows = BitVector::from_indices(3, &[0, 2]);
        let keep_cols = BitVector::from_indices(3, &[0, 2]);
        flexible.create_submatrix(&keep_rows, &keep_cols);
        assert_eq!(flexible.row_count(), 3); // group 0 (2 rows) + group 2 (1 row)
        assert_eq!(flexible.row_group_count(), 2);
        // Old column 2 renumbered to 1.
        assert_eq!(flexible.get_row(1), &[MatrixEntry::new(1, 1.0)]);
        assert_eq!(
            flexible.get_row(2),
            &[MatrixEntry::new(0, 0.5), MatrixEntry::new(1, 0.5)]
        );
    }
}
