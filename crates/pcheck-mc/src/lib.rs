//! Probabilistic model checking by reduction and solving.
//!
//! The crate turns quantitative queries over explicit-state models into
//! small equation systems: graph analysis decides as many states as
//! possible outright, end components are folded away when the solver
//! demands it, and only the remaining maybe states are solved numerically.
//! Results come back as [`HybridResult`]s that keep the structural and the
//! numeric part separate.
//!
//! Models are built either directly from a [`pcheck_storage::SparseMatrix`]
//! or by breadth-first exploration of an implicit successor relation
//! ([`builder::explore`]).

pub mod builder;
pub mod ec;
pub mod eliminator;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod result;
pub mod state_storage;
pub mod threshold;

pub use builder::{explore, ExploredModel};
pub use ec::{eliminate_end_components, EndComponentInformation};
pub use eliminator::eliminate_until_probabilities;
pub use error::{CheckError, CheckResult};
pub use model::{SparseModel, StandardRewardModel};
pub use pipeline::{
    compute_bounded_until_probabilities, compute_cumulative_rewards,
    compute_globally_probabilities, compute_instantaneous_rewards, compute_next_probabilities,
    compute_reachability_rewards, compute_until_probabilities, negotiate, ReductionPlan,
};
pub use result::HybridResult;
pub use state_storage::StateStorage;
pub use threshold::{optimization_direction, satisfies, ComparisonType};
