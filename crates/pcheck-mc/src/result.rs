//! Hybrid query results.
//!
//! A quantitative query decides most states structurally and solves
//! equations only for the rest. The result keeps that split: one set of
//! states pinned at a shared fixed value (probability-1 states, or the
//! infinite-reward states), a set of maybe states with individually solved
//! values, and an implicit default of 0 for everything else. Per-state
//! lookup translates a state index to its dense position among the maybe
//! states by rank.

use pcheck_storage::BitVector;

/// Result of one quantitative query over all states of a model.
#[derive(Clone, Debug)]
pub struct HybridResult {
    num_states: usize,
    fixed_states: BitVector,
    fixed_value: f64,
    maybe_states: BitVector,
    maybe_values: Vec<f64>,
}

impl HybridResult {
    /// Assemble a result. The fixed and maybe sets must be disjoint subsets
    /// of the state space, and `maybe_values` must carry one value per
    /// maybe state, in ascending state order.
    pub fn new(
        num_states: usize,
        fixed_states: BitVector,
        fixed_value: f64,
        maybe_states: BitVector,
        maybe_values: Vec<f64>,
    ) -> Self {
        assert_eq!(fixed_states.len(), num_states);
        assert_eq!(maybe_states.len(), num_states);
        assert!(
            fixed_states.is_disjoint_from(&maybe_states),
            "fixed and maybe states overlap"
        );
        assert_eq!(
            maybe_values.len(),
            maybe_states.count_ones(),
            "one value per maybe state required"
        );
        Self {
            num_states,
            fixed_states,
            fixed_value,
            maybe_states,
            maybe_values,
        }
    }

    /// A result with no maybe part: the fixed states at the fixed value,
    /// every other state at 0.
    pub fn fixed_only(num_states: usize, fixed_states: BitVector, fixed_value: f64) -> Self {
        Self::new(
            num_states,
            fixed_states,
            fixed_value,
            BitVector::new(num_states),
            Vec::new(),
        )
    }

    /// A result where every state carries an individually solved value.
    pub fn dense(values: Vec<f64>) -> Self {
        let num_states = values.len();
        Self::new(
            num_states,
            BitVector::new(num_states),
            0.0,
            BitVector::full(num_states),
            values,
        )
    }

    #[inline]
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn fixed_states(&self) -> &BitVector {
        &self.fixed_states
    }

    pub fn fixed_value(&self) -> f64 {
        self.fixed_value
    }

    pub fn maybe_states(&self) -> &BitVector {
        &self.maybe_states
    }

    pub fn maybe_values(&self) -> &[f64] {
        &self.maybe_values
    }

    /// The value of one state.
    pub fn value(&self, state: usize) -> f64 {
        assert!(state < self.num_states, "state index out of bounds");
        if self.fixed_states.get(state) {
            self.fixed_value
        } else if self.maybe_states.get(state) {
            self.maybe_values[self.maybe_states.rank(state)]
        } else {
            0.0
        }
    }

    /// Expand into one value per state.
    pub fn into_full_vector(self) -> Vec<f64> {
        let mut result = vec![0.0; self.num_states];
        for state in self.fixed_states.iter() {
            result[state] = self.fixed_value;
        }
        for (dense, state) in self.maybe_states.iter().enumerate() {
            result[state] = self.maybe_values[dense];
        }
        result
    }
}
