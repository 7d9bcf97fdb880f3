//! Error taxonomy of the checking pipeline.
//!
//! Configuration problems (a query that cannot be answered as posed) are
//! `CheckError`s and fail only the query at hand. Programming errors such
//! as mismatched vector capacities panic at the offending call site.
//! Solver failures pass through unchanged.

use pcheck_solver::{SolverError, SolverRequirements};
use pcheck_storage::CapacityExhausted;
use thiserror::Error;

use crate::threshold::ComparisonType;

/// A query-level failure.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The solver demands guarantees that could not be discharged by any
    /// reduction the engine knows. Raised before any numeric work starts.
    #[error("solver requirements left unmet: {requirements}")]
    UnmetRequirements { requirements: SolverRequirements },

    /// The query needs a reward component the given reward model lacks.
    #[error("query needs a reward model with {component} rewards")]
    MissingRewardComponent { component: &'static str },

    /// The threshold comparator does not induce an optimization direction.
    #[error("comparator {comparator:?} does not induce an optimization direction")]
    UnusableComparator { comparator: ComparisonType },

    /// State-space exploration overflowed the deduplication map.
    #[error("state space exceeds the deduplication map: {0}")]
    StateSpace(#[from] CapacityExhausted),

    /// Opaque solver failure, reported unchanged.
    #[error(transparent)]
    Solver(#[from] SolverError),
}

pub type CheckResult<T> = Result<T, CheckError>;
