//! Value iteration for min/max fixed-point systems.
//!
//! Plain value iteration needs nothing from its input but may converge to a
//! wrong value in the presence of end components. The `sound` configuration
//! refuses to run until the caller certifies the absence of end components
//! and provides value bounds (and, for minimizing reward systems, a valid
//! starting scheduler); with those in place the iteration is started inside
//! the bounded region and the result is trustworthy.

use pcheck_storage::SparseMatrix;
use tracing::{debug, trace};

use crate::solver::{MinMaxEquationSolver, MinMaxSolverFactory, SolverError};
use crate::{EquationSystemType, OptimizationDirection, SolverRequirements};

/// Factory for value-iteration solvers.
#[derive(Clone, Debug)]
pub struct ValueIterationFactory {
    sound: bool,
    precision: f64,
    relative: bool,
    max_iterations: usize,
}

impl ValueIterationFactory {
    pub fn new() -> Self {
        Self {
            sound: false,
            precision: 1e-6,
            relative: false,
            max_iterations: 1_000_000,
        }
    }

    /// Demand the guarantees that make value iteration sound.
    pub fn sound(mut self) -> Self {
        self.sound = true;
        self
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        assert!(precision > 0.0, "precision must be positive");
        self.precision = precision;
        self
    }

    /// Use the relative convergence criterion.
    pub fn relative(mut self) -> Self {
        self.relative = true;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for ValueIterationFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MinMaxSolverFactory for ValueIterationFactory {
    fn requirements(
        &self,
        system_type: EquationSystemType,
        direction: OptimizationDirection,
    ) -> SolverRequirements {
        if !self.sound {
            return SolverRequirements::none();
        }
        let mut requirements = SolverRequirements::none().require_no_end_components();
        match system_type {
            EquationSystemType::UntilProbabilities => {
                requirements = requirements.require_bounds();
            }
            EquationSystemType::ReachabilityRewards => {
                // Reward solutions are unbounded above; only the trivial
                // lower bound is demanded.
                requirements = requirements.require_lower_bounds();
                if direction == OptimizationDirection::Minimize {
                    requirements = requirements.require_valid_initial_scheduler();
                }
            }
        }
        requirements
    }

    fn create(&self, matrix: &SparseMatrix) -> Box<dyn MinMaxEquationSolver> {
        Box::new(ValueIterationSolver {
            matrix: matrix.clone(),
            precision: self.precision,
            relative: self.relative,
            max_iterations: self.max_iterations,
            needs_requirements_check: self.sound,
            requirements_checked: false,
            initial_scheduler: None,
            lower_bound: None,
            upper_bound: None,
        })
    }
}

struct ValueIterationSolver {
    matrix: SparseMatrix,
    precision: f64,
    relative: bool,
    max_iterations: usize,
    needs_requirements_check: bool,
    requirements_checked: bool,
    initial_scheduler: Option<Vec<usize>>,
    lower_bound: Option<f64>,
    upper_bound: Option<f64>,
}

impl ValueIterationSolver {
    /// One optimized step `x -> opt(A x + b)` into `target`.
    fn step(
        &self,
        direction: OptimizationDirection,
        x: &[f64],
        b: Option<&[f64]>,
        target: &mut [f64],
    ) {
        for group in 0..self.matrix.row_group_count() {
            let mut best: Option<f64> = None;
            for row in self.matrix.row_group_range(group) {
                let mut value: f64 = self
                    .matrix
                    .row(row)
                    .iter()
                    .map(|e| e.value * x[e.column])
                    .sum();
                if let Some(b) = b {
                    value += b[row];
                }
                best = Some(match (best, direction) {
                    (None, _) => value,
                    (Some(current), OptimizationDirection::Minimize) => current.min(value),
                    (Some(current), OptimizationDirection::Maximize) => current.max(value),
                });
            }
            // An empty row group marks a state whose value is fixed to 0 by
            // the surrounding reduction.
            target[group] = self.clamp(best.unwrap_or(0.0));
        }
    }

    /// One step of the system induced by the initial scheduler: each group
    /// is evaluated only at its scheduled row.
    fn scheduled_step(&self, scheduler: &[usize], x: &[f64], b: &[f64], target: &mut [f64]) {
        for group in 0..self.matrix.row_group_count() {
            if self.matrix.row_group_size(group) == 0 {
                target[group] = 0.0;
                continue;
            }
            let row = self.matrix.row_group_indices()[group] + scheduler[group];
            assert!(
                row < self.matrix.row_group_indices()[group + 1],
                "scheduler picks a choice outside of the row group"
            );
            let value: f64 = self
                .matrix
                .row(row)
                .iter()
                .map(|e| e.value * x[e.column])
                .sum::<f64>()
                + b[row];
            target[group] = self.clamp(value);
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        let mut value = value;
        if let Some(lower) = self.lower_bound {
            value = value.max(lower);
        }
        if let Some(upper) = self.upper_bound {
            value = value.min(upper);
        }
        value
    }

    fn converged(&self, old: &[f64], new: &[f64]) -> bool {
        old.iter().zip(new).all(|(&o, &n)| {
            let diff = (o - n).abs();
            if self.relative {
                diff <= self.precision * n.abs().max(f64::MIN_POSITIVE)
            } else {
                diff <= self.precision
            }
        })
    }

    /// Iterate `step_fn` until convergence, charging against the remaining
    /// iteration budget.
    fn iterate_to_convergence(
        &self,
        budget: &mut usize,
        x: &mut Vec<f64>,
        mut step_fn: impl FnMut(&[f64], &mut [f64]),
    ) -> Result<usize, SolverError> {
        let mut swap = vec![0.0; x.len()];
        let mut performed = 0;
        loop {
            if *budget == 0 {
                return Err(SolverError::NonConvergence {
                    iterations: self.max_iterations,
                    precision: self.precision,
                });
            }
            *budget -= 1;
            performed += 1;
            step_fn(x, &mut swap);
            let done = self.converged(x, &swap);
            std::mem::swap(x, &mut swap);
            if done {
                return Ok(performed);
            }
        }
    }
}

impl MinMaxEquationSolver for ValueIterationSolver {
    fn solve_equations(
        &mut self,
        direction: OptimizationDirection,
        x: &mut Vec<f64>,
        b: &[f64],
    ) -> Result<(), SolverError> {
        assert_eq!(x.len(), self.matrix.row_group_count(), "x has wrong length");
        assert_eq!(b.len(), self.matrix.row_count(), "b has wrong length");
        assert!(
            !self.needs_requirements_check || self.requirements_checked,
            "solving with unchecked solver requirements"
        );

        let mut budget = self.max_iterations;

        // Warm start: converge on the system induced by the scheduler
        // first. Its fixed point is an admissible starting point for the
        // optimizing iteration.
        if let Some(scheduler) = self.initial_scheduler.take() {
            let warmup =
                self.iterate_to_convergence(&mut budget, x, |x, target| {
                    self.scheduled_step(&scheduler, x, b, target)
                })?;
            trace!(iterations = warmup, "initial scheduler warm start");
            self.initial_scheduler = Some(scheduler);
        } else if let Some(lower) = self.lower_bound {
            for value in x.iter_mut() {
                *value = lower;
            }
        }

        let iterations = self.iterate_to_convergence(&mut budget, x, |x, target| {
            self.step(direction, x, Some(b), target)
        })?;
        debug!(iterations, direction = ?direction, "value iteration converged");
        Ok(())
    }

    fn repeated_multiply(
        &mut self,
        direction: OptimizationDirection,
        x: &mut Vec<f64>,
        b: Option<&[f64]>,
        count: usize,
    ) -> Result<(), SolverError> {
        assert_eq!(x.len(), self.matrix.row_group_count(), "x has wrong length");
        if let Some(b) = b {
            assert_eq!(b.len(), self.matrix.row_count(), "b has wrong length");
        }
        let mut swap = vec![0.0; x.len()];
        for _ in 0..count {
            self.step(direction, x, b, &mut swap);
            std::mem::swap(x, &mut swap);
        }
        Ok(())
    }

    fn set_initial_scheduler(&mut self, scheduler: Vec<usize>) {
        assert_eq!(
            scheduler.len(),
            self.matrix.row_group_count(),
            "scheduler has wrong length"
        );
        self.initial_scheduler = Some(scheduler);
    }

    fn set_bounds(&mut self, lower: f64, upper: f64) {
        assert!(lower <= upper, "crossed solution bounds");
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
    }

    fn set_lower_bound(&mut self, lower: f64) {
        self.lower_bound = Some(lower);
    }

    fn set_requirements_checked(&mut self) {
        self.requirements_checked = true;
    }
}
