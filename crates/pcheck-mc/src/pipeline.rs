//! The reduction-and-solve pipeline.
//!
//! Every quantitative query follows the same arc: classify states by graph
//! structure, shortcut if the classification already answers the query,
//! negotiate the solver's requirements into concrete reductions, build the
//! reduced equation system, solve, and expand the solution back over the
//! full state space. The step-bounded and single-step queries skip the
//! classification and drive the solver's multiply primitive directly.

use pcheck_graph::{prob01_max, prob01_min, prob1_a, prob1_e, prob_greater0_a, prob_greater0_e};
use pcheck_solver::{
    EquationSystemType, MinMaxEquationSolver, MinMaxSolverFactory, OptimizationDirection,
    SolverRequirements,
};
use pcheck_storage::{BitVector, SparseMatrix};
use tracing::{debug, info};

use crate::ec::eliminate_end_components;
use crate::error::{CheckError, CheckResult};
use crate::model::{SparseModel, StandardRewardModel};
use crate::result::HybridResult;

/// Sentinel value reported for maybe states when a query is answered
/// qualitatively: strictly between 0 and 1, carrying no quantitative
/// meaning beyond "neither 0 nor 1".
const QUALITATIVE_PROBABILITY: f64 = 0.5;

/// Sentinel for maybe states of a qualitative reward query: finite and
/// positive, nothing more.
const QUALITATIVE_REWARD: f64 = 1.0;

/// The reductions a query will perform to discharge solver requirements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReductionPlan {
    pub eliminate_end_components: bool,
    pub compute_initial_scheduler: bool,
}

/// Turn the solver's requirements into a reduction plan, clearing every
/// flag the engine knows how to discharge. Bounds are dischargeable for
/// both system shapes: probabilities live in [0, 1] and rewards are
/// nonnegative, which covers every bound the engine can promise. Anything
/// left over fails the query before numeric work starts.
pub fn negotiate(
    mut requirements: SolverRequirements,
    system_type: EquationSystemType,
) -> CheckResult<ReductionPlan> {
    let mut plan = ReductionPlan::default();
    if requirements.no_end_components() {
        plan.eliminate_end_components = true;
        requirements.clear_no_end_components();
    }
    if requirements.valid_initial_scheduler() {
        plan.compute_initial_scheduler = true;
        requirements.clear_valid_initial_scheduler();
    }
    match system_type {
        EquationSystemType::UntilProbabilities => requirements.clear_bounds(),
        EquationSystemType::ReachabilityRewards => requirements.clear_lower_bounds(),
    }
    if !requirements.is_empty() {
        return Err(CheckError::UnmetRequirements { requirements });
    }
    debug!(?plan, "requirements negotiated");
    Ok(plan)
}

/// Probability of `phi U psi` for every state, optimized in the given
/// direction.
///
/// With `qualitative` set, only the 0/1 classification is computed and
/// every maybe state reports the sentinel 0.5.
pub fn compute_until_probabilities(
    direction: OptimizationDirection,
    model: &SparseModel,
    phi: &BitVector,
    psi: &BitVector,
    qualitative: bool,
    factory: &dyn MinMaxSolverFactory,
) -> CheckResult<HybridResult> {
    let matrix = model.transition_matrix();
    let backward = model.backward_transitions();
    let num_states = model.state_count();
    assert_eq!(phi.len(), num_states, "phi has wrong capacity");
    assert_eq!(psi.len(), num_states, "psi has wrong capacity");

    let (prob0, prob1) = match direction {
        OptimizationDirection::Maximize => prob01_max(matrix, backward, phi, psi),
        OptimizationDirection::Minimize => prob01_min(matrix, backward, phi, psi),
    };
    let maybe = (&prob0 | &prob1).complement();
    info!(
        prob0 = prob0.count_ones(),
        prob1 = prob1.count_ones(),
        maybe = maybe.count_ones(),
        "until classification"
    );

    if qualitative || maybe.is_zero() {
        let values = vec![QUALITATIVE_PROBABILITY; maybe.count_ones()];
        return Ok(HybridResult::new(num_states, prob1, 1.0, maybe, values));
    }

    let requirements = factory.requirements(EquationSystemType::UntilProbabilities, direction);
    let plan = negotiate(requirements, EquationSystemType::UntilProbabilities)?;

    let maybe_values = if plan.eliminate_end_components {
        let elimination = eliminate_end_components(matrix, &maybe, &prob1, None, None);
        let mut solver = factory.create(&elimination.matrix);
        solver.set_bounds(0.0, 1.0);
        if plan.compute_initial_scheduler {
            solver.set_initial_scheduler(valid_initial_scheduler(
                &elimination.matrix,
                &elimination.target_probabilities,
            ));
        }
        solver.set_requirements_checked();
        let mut x = vec![0.0; elimination.matrix.row_group_count()];
        solver.solve_equations(direction, &mut x, &elimination.target_probabilities)?;
        elimination.info.set_values(&maybe, &x)
    } else {
        let submatrix = matrix.submatrix(&maybe, &maybe);
        let b = matrix.constrained_row_group_sum_vector(&maybe, &prob1);
        let mut solver = factory.create(&submatrix);
        solver.set_bounds(0.0, 1.0);
        if plan.compute_initial_scheduler {
            solver.set_initial_scheduler(valid_initial_scheduler(&submatrix, &b));
        }
        solver.set_requirements_checked();
        let mut x = vec![0.0; submatrix.row_group_count()];
        solver.solve_equations(direction, &mut x, &b)?;
        x
    };

    Ok(HybridResult::new(num_states, prob1, 1.0, maybe, maybe_values))
}

/// Probability of `phi U<=bound psi`. At bound 0 the result is the target
/// indicator and no multiplication is performed.
pub fn compute_bounded_until_probabilities(
    direction: OptimizationDirection,
    model: &SparseModel,
    phi: &BitVector,
    psi: &BitVector,
    bound: usize,
    factory: &dyn MinMaxSolverFactory,
) -> CheckResult<HybridResult> {
    let matrix = model.transition_matrix();
    let backward = model.backward_transitions();
    let num_states = model.state_count();
    assert_eq!(phi.len(), num_states, "phi has wrong capacity");
    assert_eq!(psi.len(), num_states, "psi has wrong capacity");

    let mut maybe = phi.and_not(psi);
    if bound == 0 || maybe.is_zero() {
        let values = vec![0.0; maybe.count_ones()];
        return Ok(HybridResult::new(num_states, psi.clone(), 1.0, maybe, values));
    }

    // States that cannot reach psi through phi at all stay at 0 and are
    // dropped from the iterated system.
    let reaching = match direction {
        OptimizationDirection::Maximize => prob_greater0_e(matrix, backward, phi, psi),
        OptimizationDirection::Minimize => prob_greater0_a(matrix, backward, phi, psi),
    };
    maybe.intersect_with(&reaching);
    debug!(maybe = maybe.count_ones(), bound, "bounded until classification");
    if maybe.is_zero() {
        return Ok(HybridResult::new(num_states, psi.clone(), 1.0, maybe, Vec::new()));
    }

    let submatrix = matrix.submatrix(&maybe, &maybe);
    let b = matrix.constrained_row_group_sum_vector(&maybe, psi);
    let mut solver = factory.create(&submatrix);
    let mut x = vec![0.0; submatrix.row_group_count()];
    solver.repeated_multiply(direction, &mut x, Some(&b), bound)?;
    Ok(HybridResult::new(num_states, psi.clone(), 1.0, maybe, x))
}

/// Probability that the next step lands in `psi`: one optimized
/// multiplication of the target indicator.
pub fn compute_next_probabilities(
    direction: OptimizationDirection,
    model: &SparseModel,
    psi: &BitVector,
    factory: &dyn MinMaxSolverFactory,
) -> CheckResult<HybridResult> {
    let num_states = model.state_count();
    assert_eq!(psi.len(), num_states, "psi has wrong capacity");
    let mut x: Vec<f64> = (0..num_states)
        .map(|state| if psi.get(state) { 1.0 } else { 0.0 })
        .collect();
    let mut solver = factory.create(model.transition_matrix());
    solver.repeated_multiply(direction, &mut x, None, 1)?;
    Ok(HybridResult::dense(x))
}

/// Probability of `G psi`, rephrased as the complement of reaching `!psi`
/// with flipped direction.
pub fn compute_globally_probabilities(
    direction: OptimizationDirection,
    model: &SparseModel,
    psi: &BitVector,
    qualitative: bool,
    factory: &dyn MinMaxSolverFactory,
) -> CheckResult<HybridResult> {
    let complement_result = compute_until_probabilities(
        direction.invert(),
        model,
        &BitVector::full(model.state_count()),
        &psi.complement(),
        qualitative,
        factory,
    )?;
    let mut values = complement_result.into_full_vector();
    for value in &mut values {
        *value = 1.0 - *value;
    }
    Ok(HybridResult::dense(values))
}

/// Expected state reward exactly `bound` steps from now. Requires the
/// state reward component; at bound 0 the state rewards themselves are
/// returned.
pub fn compute_instantaneous_rewards(
    direction: OptimizationDirection,
    model: &SparseModel,
    reward_model: &StandardRewardModel,
    bound: usize,
    factory: &dyn MinMaxSolverFactory,
) -> CheckResult<HybridResult> {
    let state_rewards = reward_model
        .state_rewards()
        .ok_or(CheckError::MissingRewardComponent { component: "state" })?;
    let mut x = state_rewards.to_vec();
    let mut solver = factory.create(model.transition_matrix());
    solver.repeated_multiply(direction, &mut x, None, bound)?;
    Ok(HybridResult::dense(x))
}

/// Expected reward accumulated over the next `bound` steps. Requires a
/// reward model with at least one component.
pub fn compute_cumulative_rewards(
    direction: OptimizationDirection,
    model: &SparseModel,
    reward_model: &StandardRewardModel,
    bound: usize,
    factory: &dyn MinMaxSolverFactory,
) -> CheckResult<HybridResult> {
    if reward_model.is_empty() {
        return Err(CheckError::MissingRewardComponent { component: "at least one" });
    }
    let b = reward_model.total_reward_vector(model.transition_matrix());
    let mut x = vec![0.0; model.state_count()];
    let mut solver = factory.create(model.transition_matrix());
    solver.repeated_multiply(direction, &mut x, Some(&b), bound)?;
    Ok(HybridResult::dense(x))
}

/// Expected total reward until reaching `target`. States that miss the
/// target with positive probability under the relevant quantifier collect
/// reward forever and are pinned at infinity.
pub fn compute_reachability_rewards(
    direction: OptimizationDirection,
    model: &SparseModel,
    reward_model: &StandardRewardModel,
    target: &BitVector,
    qualitative: bool,
    factory: &dyn MinMaxSolverFactory,
) -> CheckResult<HybridResult> {
    let matrix = model.transition_matrix();
    let backward = model.backward_transitions();
    let num_states = model.state_count();
    assert_eq!(target.len(), num_states, "target has wrong capacity");
    if reward_model.is_empty() {
        return Err(CheckError::MissingRewardComponent { component: "at least one" });
    }

    // Infinite expected reward: the maximum misses the target whenever some
    // scheduler can; the minimum only when every scheduler does.
    let all_states = BitVector::full(num_states);
    let reaching = match direction {
        OptimizationDirection::Maximize => prob1_a(matrix, backward, &all_states, target),
        OptimizationDirection::Minimize => prob1_e(matrix, backward, &all_states, target),
    };
    let infinity = reaching.complement();
    let maybe = infinity.complement().and_not(target);
    info!(
        infinity = infinity.count_ones(),
        target = target.count_ones(),
        maybe = maybe.count_ones(),
        "reachability reward classification"
    );

    if qualitative || maybe.is_zero() {
        let values = vec![QUALITATIVE_REWARD; maybe.count_ones()];
        return Ok(HybridResult::new(
            num_states,
            infinity,
            f64::INFINITY,
            maybe,
            values,
        ));
    }

    let requirements = factory.requirements(EquationSystemType::ReachabilityRewards, direction);
    let plan = negotiate(requirements, EquationSystemType::ReachabilityRewards)?;
    let total_rewards = reward_model.total_reward_vector(matrix);

    let maybe_values = if plan.eliminate_end_components {
        // Only zero-reward choices can hide an accumulation inside an end
        // component; rows with reward are legitimate exits.
        let zero_reward_rows =
            BitVector::from_fn(matrix.row_count(), |row| total_rewards[row] == 0.0);
        let elimination = eliminate_end_components(
            matrix,
            &maybe,
            target,
            Some(&zero_reward_rows),
            Some(&total_rewards),
        );
        let b = elimination
            .row_values
            .clone()
            .expect("row values were carried through the elimination");
        let mut solver = factory.create(&elimination.matrix);
        solver.set_lower_bound(0.0);
        if plan.compute_initial_scheduler {
            solver.set_initial_scheduler(valid_initial_scheduler(
                &elimination.matrix,
                &elimination.target_probabilities,
            ));
        }
        solver.set_requirements_checked();
        let mut x = vec![0.0; elimination.matrix.row_group_count()];
        solver.solve_equations(direction, &mut x, &b)?;
        elimination.info.set_values(&maybe, &x)
    } else {
        let submatrix = matrix.submatrix(&maybe, &maybe);
        let b = select_row_values(matrix, &maybe, &total_rewards);
        let mut solver = factory.create(&submatrix);
        solver.set_lower_bound(0.0);
        if plan.compute_initial_scheduler {
            let exit_mass = matrix.constrained_row_group_sum_vector(&maybe, target);
            solver.set_initial_scheduler(valid_initial_scheduler(&submatrix, &exit_mass));
        }
        solver.set_requirements_checked();
        let mut x = vec![0.0; submatrix.row_group_count()];
        solver.solve_equations(direction, &mut x, &b)?;
        x
    };

    Ok(HybridResult::new(
        num_states,
        infinity,
        f64::INFINITY,
        maybe,
        maybe_values,
    ))
}

/// Restrict a per-row vector to the rows of the given row groups.
fn select_row_values(matrix: &SparseMatrix, groups: &BitVector, values: &[f64]) -> Vec<f64> {
    let mut result = Vec::new();
    for group in groups.iter() {
        for row in matrix.row_group_range(group) {
            result.push(values[row]);
        }
    }
    result
}

/// A scheduler (choice offset per row group) that reaches an exit row with
/// probability one: states owning a row with direct exit mass take it, and
/// every other state takes a choice with a successor strictly closer to an
/// exit. Panics if some state cannot reach any exit; such a state sits in
/// an end component that should have been eliminated.
fn valid_initial_scheduler(matrix: &SparseMatrix, exit_mass: &[f64]) -> Vec<usize> {
    assert_eq!(exit_mass.len(), matrix.row_count());
    let num_states = matrix.row_group_count();
    let backward = matrix.transpose();
    let mut choices = vec![0usize; num_states];
    let mut reached = BitVector::new(num_states);
    let mut worklist = Vec::new();

    for state in 0..num_states {
        let group_start = matrix.row_group_indices()[state];
        if let Some(row) = matrix.row_group_range(state).find(|&row| exit_mass[row] > 0.0) {
            choices[state] = row - group_start;
            reached.set(state, true);
            worklist.push(state);
        }
    }
    while let Some(state) = worklist.pop() {
        for entry in backward.row(state) {
            let pred = entry.column;
            if reached.get(pred) {
                continue;
            }
            let group_start = matrix.row_group_indices()[pred];
            let picked = matrix
                .row_group_range(pred)
                .find(|&row| matrix.row(row).iter().any(|e| reached.get(e.column)));
            if let Some(row) = picked {
                choices[pred] = row - group_start;
                reached.set(pred, true);
                worklist.push(pred);
            }
        }
    }
    assert!(
        reached.is_full(),
        "a state cannot reach any exit; end components were not eliminated"
    );
    choices
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcheck_solver::ValueIterationFactory;
    use pcheck_storage::SparseMatrixBuilder;

    fn coin_model() -> SparseModel {
        // State 0 chooses between approaching the target via 1 and giving
        // up into the sink 3; state 1 flips a coin between target 2 and 0.
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0);
        builder.add_next_value(0, 1, 1.0);
        builder.add_next_value(1, 3, 1.0);
        builder.new_row_group(2);
        builder.add_next_value(2, 0, 0.5);
        builder.add_next_value(2, 2, 0.5);
        builder.new_row_group(3);
        builder.add_next_value(3, 2, 1.0);
        builder.new_row_group(4);
        builder.add_next_value(4, 3, 1.0);
        SparseModel::new(builder.build_with_dimensions(5, 4))
    }

    #[test]
    fn test_negotiate_discharges_known_requirements() {
        let requirements = SolverRequirements::none()
            .require_no_end_components()
            .require_bounds()
            .require_valid_initial_scheduler();
        let plan = negotiate(requirements, EquationSystemType::UntilProbabilities).unwrap();
        assert!(plan.eliminate_end_components);
        assert!(plan.compute_initial_scheduler);
    }

    #[test]
    fn test_negotiate_rejects_upper_bounds_for_rewards() {
        let requirements = SolverRequirements::none().require_upper_bounds();
        let result = negotiate(requirements, EquationSystemType::ReachabilityRewards);
        assert!(matches!(
            result,
            Err(CheckError::UnmetRequirements { .. })
        ));
    }

    #[test]
    fn test_valid_initial_scheduler_avoids_dead_choice() {
        let model = coin_model();
        let psi = BitVector::from_indices(4, &[2]);
        let maybe = BitVector::from_indices(4, &[0, 1]);
        let submatrix = model.transition_matrix().submatrix(&maybe, &maybe);
        let b = model
            .transition_matrix()
            .constrained_row_group_sum_vector(&maybe, &psi);
        let scheduler = valid_initial_scheduler(&submatrix, &b);
        // State 1 exits directly; state 0 must pick the row toward 1.
        assert_eq!(scheduler, vec![0, 0]);
    }
}
