//! Storage primitives for the pcheck engine.
//!
//! Everything in this crate is a container, not an algorithm: fixed-capacity
//! bit vectors denoting state sets, a hash map keyed by fixed-width bit
//! patterns, and the two sparse matrix representations (immutable CSR and
//! the row-mutable "flexible" form used during elimination).

pub mod bitvec;
pub mod flexible_matrix;
pub mod hash_map;
pub mod sparse_matrix;

pub use bitvec::BitVector;
pub use flexible_matrix::FlexibleSparseMatrix;
pub use hash_map::{BitVectorHashMap, CapacityExhausted};
pub use sparse_matrix::{MatrixEntry, SparseMatrix, SparseMatrixBuilder};
