//! The min/max equation solver interface.

use pcheck_storage::SparseMatrix;
use thiserror::Error;

use crate::{EquationSystemType, OptimizationDirection, SolverRequirements};

/// Failure inside a solver. The caller treats this as opaque and reports it
/// unchanged.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(
        "iterative solver did not converge within {iterations} iterations (precision {precision})"
    )]
    NonConvergence { iterations: usize, precision: f64 },
}

/// A solver for `x = opt(A x + b)` over the row groups of a fixed matrix.
///
/// `x` has one entry per row group, `b` one entry per row. Empty row groups
/// take the value 0 (they mark states whose value is fixed by construction).
pub trait MinMaxEquationSolver {
    /// Solve the fixed-point system in the given direction. `x` carries the
    /// initial iterate on entry and the solution on exit.
    fn solve_equations(
        &mut self,
        direction: OptimizationDirection,
        x: &mut Vec<f64>,
        b: &[f64],
    ) -> Result<(), SolverError>;

    /// Perform `count` optimized multiply-and-add steps
    /// `x <- opt(A x + b)`. With `count == 0` the vector is untouched; no
    /// multiplication is performed.
    fn repeated_multiply(
        &mut self,
        direction: OptimizationDirection,
        x: &mut Vec<f64>,
        b: Option<&[f64]>,
        count: usize,
    ) -> Result<(), SolverError>;

    /// Provide a scheduler (choice offset per row group) whose induced
    /// system has the sought solution as a fixed point. Solvers that
    /// required one start from its induced values.
    fn set_initial_scheduler(&mut self, scheduler: Vec<usize>);

    /// Provide uniform lower and upper bounds on every solution entry.
    fn set_bounds(&mut self, lower: f64, upper: f64);

    /// Provide only a uniform lower bound.
    fn set_lower_bound(&mut self, lower: f64);

    /// Record that the caller has inspected and discharged the advertised
    /// requirements. Solving without this acknowledgement panics: silently
    /// running an unsound method is worse than crashing.
    fn set_requirements_checked(&mut self);
}

/// Creates solvers and advertises their requirements up front, before any
/// matrix is built. The pipeline consults `requirements` first so it can
/// plan the reductions that discharge them.
pub trait MinMaxSolverFactory {
    fn requirements(
        &self,
        system_type: EquationSystemType,
        direction: OptimizationDirection,
    ) -> SolverRequirements;

    fn create(&self, matrix: &SparseMatrix) -> Box<dyn MinMaxEquationSolver>;
}
