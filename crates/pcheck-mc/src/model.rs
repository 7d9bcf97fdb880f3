//! Sparse models and their reward annotations.

use ahash::AHashMap;
use pcheck_storage::SparseMatrix;

/// Tolerance when validating that transition rows are distributions.
const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// An explicit-state probabilistic model: a transition matrix whose row
/// groups are states and rows are choices, plus named reward models. The
/// backward relation is computed once at construction; every analysis needs
/// it.
pub struct SparseModel {
    transition_matrix: SparseMatrix,
    backward_transitions: SparseMatrix,
    reward_models: AHashMap<String, StandardRewardModel>,
}

impl SparseModel {
    /// Wrap a transition matrix. Every row must be a probability
    /// distribution; a violated row is a modeling error and panics.
    pub fn new(transition_matrix: SparseMatrix) -> Self {
        for row in 0..transition_matrix.row_count() {
            let sum = transition_matrix.row_sum(row);
            assert!(
                (sum - 1.0).abs() <= ROW_SUM_TOLERANCE,
                "transition row {row} sums to {sum}, not 1"
            );
        }
        assert_eq!(
            transition_matrix.column_count(),
            transition_matrix.row_group_count(),
            "transition matrix must be square over states"
        );
        let backward_transitions = transition_matrix.transpose();
        Self {
            transition_matrix,
            backward_transitions,
            reward_models: AHashMap::new(),
        }
    }

    /// Attach a named reward model. Component lengths are checked against
    /// the transition matrix here, once, so the pipeline can index freely.
    pub fn with_reward_model(mut self, name: &str, reward_model: StandardRewardModel) -> Self {
        if let Some(state_rewards) = reward_model.state_rewards() {
            assert_eq!(
                state_rewards.len(),
                self.state_count(),
                "state reward vector has wrong length"
            );
        }
        if let Some(state_action_rewards) = reward_model.state_action_rewards() {
            assert_eq!(
                state_action_rewards.len(),
                self.choice_count(),
                "state-action reward vector has wrong length"
            );
        }
        if let Some(transition_rewards) = reward_model.transition_rewards() {
            assert_eq!(
                transition_rewards.row_count(),
                self.choice_count(),
                "transition reward matrix has wrong row count"
            );
        }
        self.reward_models.insert(name.to_owned(), reward_model);
        self
    }

    /// Number of states.
    #[inline]
    pub fn state_count(&self) -> usize {
        self.transition_matrix.row_group_count()
    }

    /// Number of choices (matrix rows) over all states.
    #[inline]
    pub fn choice_count(&self) -> usize {
        self.transition_matrix.row_count()
    }

    #[inline]
    pub fn transition_matrix(&self) -> &SparseMatrix {
        &self.transition_matrix
    }

    #[inline]
    pub fn backward_transitions(&self) -> &SparseMatrix {
        &self.backward_transitions
    }

    /// True iff every state has exactly one choice.
    pub fn is_deterministic(&self) -> bool {
        self.transition_matrix.has_trivial_row_grouping()
            || (0..self.state_count()).all(|s| self.transition_matrix.row_group_size(s) == 1)
    }

    pub fn reward_model(&self, name: &str) -> Option<&StandardRewardModel> {
        self.reward_models.get(name)
    }

    pub fn reward_model_names(&self) -> impl Iterator<Item = &str> {
        self.reward_models.keys().map(String::as_str)
    }
}

/// A reward model with up to three components: per-state, per-choice and
/// per-transition rewards. Any component may be absent.
#[derive(Clone, Debug, Default)]
pub struct StandardRewardModel {
    state_rewards: Option<Vec<f64>>,
    state_action_rewards: Option<Vec<f64>>,
    transition_rewards: Option<SparseMatrix>,
}

impl StandardRewardModel {
    pub fn new(
        state_rewards: Option<Vec<f64>>,
        state_action_rewards: Option<Vec<f64>>,
        transition_rewards: Option<SparseMatrix>,
    ) -> Self {
        Self {
            state_rewards,
            state_action_rewards,
            transition_rewards,
        }
    }

    pub fn from_state_rewards(state_rewards: Vec<f64>) -> Self {
        Self::new(Some(state_rewards), None, None)
    }

    pub fn from_state_action_rewards(state_action_rewards: Vec<f64>) -> Self {
        Self::new(None, Some(state_action_rewards), None)
    }

    #[inline]
    pub fn has_state_rewards(&self) -> bool {
        self.state_rewards.is_some()
    }

    #[inline]
    pub fn has_state_action_rewards(&self) -> bool {
        self.state_action_rewards.is_some()
    }

    #[inline]
    pub fn has_transition_rewards(&self) -> bool {
        self.transition_rewards.is_some()
    }

    /// True iff no component is present.
    pub fn is_empty(&self) -> bool {
        !self.has_state_rewards()
            && !self.has_state_action_rewards()
            && !self.has_transition_rewards()
    }

    pub fn state_rewards(&self) -> Option<&[f64]> {
        self.state_rewards.as_deref()
    }

    pub fn state_action_rewards(&self) -> Option<&[f64]> {
        self.state_action_rewards.as_deref()
    }

    pub fn transition_rewards(&self) -> Option<&SparseMatrix> {
        self.transition_rewards.as_ref()
    }

    /// The expected reward collected by taking each choice once: the state
    /// reward of the owning state, plus the choice's own reward, plus the
    /// probability-weighted transition rewards. One entry per matrix row.
    pub fn total_reward_vector(&self, transition_matrix: &SparseMatrix) -> Vec<f64> {
        let mut result = vec![0.0; transition_matrix.row_count()];
        if let Some(state_action_rewards) = &self.state_action_rewards {
            for (value, reward) in result.iter_mut().zip(state_action_rewards) {
                *value += reward;
            }
        }
        if let Some(transition_rewards) = &self.transition_rewards {
            for row in 0..transition_matrix.row_count() {
                result[row] += expected_transition_reward(
                    transition_matrix.row(row),
                    transition_rewards.row(row),
                );
            }
        }
        if let Some(state_rewards) = &self.state_rewards {
            for group in 0..transition_matrix.row_group_count() {
                for row in transition_matrix.row_group_range(group) {
                    result[row] += state_rewards[group];
                }
            }
        }
        result
    }
}

/// Merge-join of a probability row and a reward row, both sorted by column.
fn expected_transition_reward(
    probabilities: &[pcheck_storage::MatrixEntry],
    rewards: &[pcheck_storage::MatrixEntry],
) -> f64 {
    let mut result = 0.0;
    let mut reward_iter = rewards.iter().peekable();
    for probability in probabilities {
        while reward_iter
            .peek()
            .map_or(false, |r| r.column < probability.column)
        {
            reward_iter.next();
        }
        if let Some(reward) = reward_iter.peek() {
            if reward.column == probability.column {
                result += probability.value * reward.value;
            }
        }
    }
    result
}
