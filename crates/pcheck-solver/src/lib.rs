//! Equation solving for nondeterministic models.
//!
//! The quantitative pipeline reduces a query to a min/max fixed-point
//! equation system `x = opt(A x + b)` over the maybe states and hands it to
//! a solver obtained from a factory. Solvers advertise requirements (what
//! the system must guarantee for the method to be correct); the caller
//! either discharges them or aborts. This crate defines the interface and
//! ships a value-iteration implementation.

pub mod requirements;
pub mod solver;
pub mod value_iteration;

pub use requirements::SolverRequirements;
pub use solver::{MinMaxEquationSolver, MinMaxSolverFactory, SolverError};
pub use value_iteration::ValueIterationFactory;

/// Direction in which the nondeterminism is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizationDirection {
    Minimize,
    Maximize,
}

impl OptimizationDirection {
    /// The opposite direction, used when a query is rephrased through its
    /// complement.
    pub fn invert(self) -> Self {
        match self {
            Self::Minimize => Self::Maximize,
            Self::Maximize => Self::Minimize,
        }
    }
}

/// The shape of the equation system being solved. Solvers may have
/// different requirements for the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EquationSystemType {
    UntilProbabilities,
    ReachabilityRewards,
}
