//! Immutable CSR sparse matrix with row groups.
//!
//! In a nondeterministic model, row group `i` holds one row per choice
//! available in state `i`; for a deterministic model every group has exactly
//! one row and the grouping is trivial. The matrix is read-only once built;
//! all structural editing happens on a `FlexibleSparseMatrix` copy.

use crate::bitvec::BitVector;

/// A single (column, value) pair of a matrix row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixEntry {
    pub column: usize,
    pub value: f64,
}

impl MatrixEntry {
    pub fn new(column: usize, value: f64) -> Self {
        Self { column, value }
    }
}

/// Immutable sparse matrix in CSR layout with a row-group boundary table.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    entries: Vec<MatrixEntry>,
    /// Row boundaries; length `row_count + 1`, monotonically increasing.
    row_indices: Vec<usize>,
    /// Group boundaries in terms of rows; length `group_count + 1`.
    row_group_indices: Vec<usize>,
    column_count: usize,
    nontrivial_row_grouping: bool,
}

impl SparseMatrix {
    /// Number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_indices.len() - 1
    }

    /// Number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Number of stored entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of row groups (states).
    #[inline]
    pub fn row_group_count(&self) -> usize {
        self.row_group_indices.len() - 1
    }

    /// The row-group boundary table.
    #[inline]
    pub fn row_group_indices(&self) -> &[usize] {
        &self.row_group_indices
    }

    /// Rows belonging to the given group.
    #[inline]
    pub fn row_group_range(&self, group: usize) -> std::ops::Range<usize> {
        self.row_group_indices[group]..self.row_group_indices[group + 1]
    }

    /// Number of rows in the given group.
    #[inline]
    pub fn row_group_size(&self, group: usize) -> usize {
        self.row_group_indices[group + 1] - self.row_group_indices[group]
    }

    /// Whether the matrix (possibly) has more than one row per group.
    #[inline]
    pub fn has_trivial_row_grouping(&self) -> bool {
        !self.nontrivial_row_grouping
    }

    /// The entries of one row, sorted by column.
    #[inline]
    pub fn row(&self, row: usize) -> &[MatrixEntry] {
        &self.entries[self.row_indices[row]..self.row_indices[row + 1]]
    }

    /// The group owning the given row.
    pub fn group_of_row(&self, row: usize) -> usize {
        match self.row_group_indices.binary_search(&row) {
            Ok(mut g) => {
                // Boundary values repeat when groups are empty; take the
                // last group starting at this row.
                while g + 1 < self.row_group_indices.len() - 1
                    && self.row_group_indices[g + 1] == row
                {
                    g += 1;
                }
                g
            }
            Err(g) => g - 1,
        }
    }

    /// Sum of the entry values of one row.
    pub fn row_sum(&self, row: usize) -> f64 {
        self.row(row).iter().map(|e| e.value).sum()
    }

    /// Multiply every row with `x`, writing one value per row into `result`.
    pub fn multiply_with_vector(&self, x: &[f64], result: &mut [f64]) {
        assert_eq!(result.len(), self.row_count());
        for row in 0..self.row_count() {
            result[row] = self.row(row).iter().map(|e| e.value * x[e.column]).sum();
        }
    }

    /// Transpose with row groups joined: the result has one row per column
    /// of this matrix, and an entry `(column = group)` for every entry of a
    /// row in that group. Parallel edges from different choices of the same
    /// state are merged by summing. This is the backward transition relation
    /// used by the graph algorithms.
    pub fn transpose(&self) -> SparseMatrix {
        let n = self.column_count;
        let mut rows: Vec<Vec<MatrixEntry>> = vec![Vec::new(); n];
        for group in 0..self.row_group_count() {
            for row in self.row_group_range(group) {
                for entry in self.row(row) {
                    rows[entry.column].push(MatrixEntry::new(group, entry.value));
                }
            }
        }
        let mut builder = SparseMatrixBuilder::new();
        for (row, mut entries) in rows.into_iter().enumerate() {
            entries.sort_by_key(|e| e.column);
            let mut last: Option<usize> = None;
            for entry in entries {
                if last == Some(entry.column) {
                    builder.add_to_last_value(entry.value);
                } else {
                    builder.add_next_value(row, entry.column, entry.value);
                    last = Some(entry.column);
                }
            }
        }
        builder.build_with_dimensions(n, self.row_group_count())
    }

    /// Restrict the matrix to the row groups of `row_group_constraint` and
    /// the columns of `column_constraint`, renumbering the remaining columns
    /// to a dense range.
    pub fn submatrix(
        &self,
        row_group_constraint: &BitVector,
        column_constraint: &BitVector,
    ) -> SparseMatrix {
        assert_eq!(row_group_constraint.len(), self.row_group_count());
        assert_eq!(column_constraint.len(), self.column_count);
        let column_map = dense_index_map(column_constraint);
        let mut builder = SparseMatrixBuilder::with_row_groups();
        let mut new_row = 0;
        for group in row_group_constraint.iter() {
            builder.new_row_group(new_row);
            for row in self.row_group_range(group) {
                for entry in self.row(row) {
                    if let Some(new_column) = column_map[entry.column] {
                        builder.add_next_value(new_row, new_column, entry.value);
                    }
                }
                new_row += 1;
            }
        }
        builder.build_with_dimensions(new_row, column_constraint.count_ones())
    }

    /// For every row of every group in `row_group_constraint`, the summed
    /// weight of the entries whose column lies in `column_constraint`. This
    /// is the one-step exit vector of the reduced system.
    pub fn constrained_row_group_sum_vector(
        &self,
        row_group_constraint: &BitVector,
        column_constraint: &BitVector,
    ) -> Vec<f64> {
        assert_eq!(row_group_constraint.len(), self.row_group_count());
        assert_eq!(column_constraint.len(), self.column_count);
        let mut result = Vec::new();
        for group in row_group_constraint.iter() {
            for row in self.row_group_range(group) {
                result.push(
                    self.row(row)
                        .iter()
                        .filter(|e| column_constraint.get(e.column))
                        .map(|e| e.value)
                        .sum(),
                );
            }
        }
        result
    }

    pub(crate) fn from_parts(
        entries: Vec<MatrixEntry>,
        row_indices: Vec<usize>,
        row_group_indices: Vec<usize>,
        column_count: usize,
        nontrivial_row_grouping: bool,
    ) -> Self {
        Self {
            entries,
            row_indices,
            row_group_indices,
            column_count,
            nontrivial_row_grouping,
        }
    }
}

/// Translation table from old column index to new dense index for the set
/// bits of `keep`.
fn dense_index_map(keep: &BitVector) -> Vec<Option<usize>> {
    let mut map = vec![None; keep.len()];
    for (dense, bit) in keep.iter().enumerate() {
        map[bit] = Some(dense);
    }
    map
}

/// Incremental builder. Values must be added with non-decreasing row indices
/// and strictly increasing columns within a row; with custom row grouping,
/// `new_row_group` must be called before the rows of each group (empty
/// groups are allowed).
pub struct SparseMatrixBuilder {
    entries: Vec<MatrixEntry>,
    row_indices: Vec<usize>,
    row_group_indices: Vec<usize>,
    custom_row_grouping: bool,
    current_row: usize,
    highest_column: usize,
    has_entries: bool,
}

impl SparseMatrixBuilder {
    /// Builder for a matrix with trivial row grouping (one row per group).
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            row_indices: vec![0],
            row_group_indices: vec![0],
            custom_row_grouping: false,
            current_row: 0,
            highest_column: 0,
            has_entries: false,
        }
    }

    /// Builder for a matrix with explicit row groups.
    pub fn with_row_groups() -> Self {
        let mut builder = Self::new();
        builder.custom_row_grouping = true;
        builder.row_group_indices.clear();
        builder
    }

    /// Start a new row group at the given row. Consecutive calls with the
    /// same row create empty groups.
    pub fn new_row_group(&mut self, starting_row: usize) {
        assert!(self.custom_row_grouping, "builder has trivial row grouping");
        assert!(
            self.row_group_indices.last().map_or(true, |&last| starting_row >= last),
            "row groups must start at non-decreasing rows"
        );
        self.row_group_indices.push(starting_row);
    }

    /// Append a value. Rows must be visited in order; within a row, columns
    /// must strictly increase.
    pub fn add_next_value(&mut self, row: usize, column: usize, value: f64) {
        assert!(
            row >= self.current_row,
            "rows must be added in non-decreasing order ({} after {})",
            row,
            self.current_row
        );
        while self.current_row < row {
            self.row_indices.push(self.entries.len());
            self.current_row += 1;
        }
        let row_start = self.row_indices[self.current_row];
        if self.entries.len() > row_start {
            let last = self.entries.last().expect("non-empty row has a last entry");
            assert!(
                column > last.column,
                "columns within a row must strictly increase"
            );
        }
        self.entries.push(MatrixEntry::new(column, value));
        self.highest_column = self.highest_column.max(column);
        self.has_entries = true;
    }

    /// Add to the most recently appended entry (used when merging parallel
    /// edges during transposition).
    pub fn add_to_last_value(&mut self, value: f64) {
        let entry = self.entries.last_mut().expect("no entry to add to");
        entry.value += value;
    }

    /// Finish with dimensions inferred from the added values.
    pub fn build(self) -> SparseMatrix {
        let rows = self.current_row + 1;
        let columns = if self.has_entries {
            self.highest_column + 1
        } else {
            0
        };
        self.build_with_dimensions(rows, columns)
    }

    /// Finish, forcing at least the given dimensions. Trailing empty rows
    /// and groups are materialized.
    pub fn build_with_dimensions(mut self, row_count: usize, column_count: usize) -> SparseMatrix {
        assert!(row_count > 0, "cannot build a matrix without rows");
        assert!(
            column_count > self.highest_column || !self.has_entries,
            "column count {column_count} too small for added entries"
        );
        while self.current_row + 1 < row_count {
            self.row_indices.push(self.entries.len());
            self.current_row += 1;
        }
        // Closing boundary.
        self.row_indices.push(self.entries.len());
        debug_assert_eq!(self.row_indices.len(), row_count + 1);

        let nontrivial = self.custom_row_grouping;
        let mut row_group_indices = self.row_group_indices;
        if self.custom_row_grouping {
            row_group_indices.push(row_count);
        } else {
            row_group_indices = (0..=row_count).collect();
        }
        SparseMatrix::from_parts(
            self.entries,
            self.row_indices,
            row_group_indices,
            column_count,
            nontrivial,
        )
    }
}

impl Default for SparseMatrixBuilder {
    fn default() -> Self {
        Self::new()
    }
}
