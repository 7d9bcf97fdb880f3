//! Threshold queries over nondeterministic models.
//!
//! A bound like `P <= 0.1 [phi U psi]` on a nondeterministic model is
//! checked against the worst offender: upper-bound comparators must hold
//! for the maximizing resolution, lower-bound comparators for the
//! minimizing one. Equality comparators single out no direction and are
//! rejected up front.

use pcheck_solver::OptimizationDirection;

use crate::error::{CheckError, CheckResult};

/// Comparison operator of a threshold query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonType {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

/// The optimization direction a threshold comparator has to be checked
/// against. The table is the same for probability and reward operators.
pub fn optimization_direction(comparison: ComparisonType) -> CheckResult<OptimizationDirection> {
    match comparison {
        ComparisonType::Less | ComparisonType::LessEqual => Ok(OptimizationDirection::Maximize),
        ComparisonType::Greater | ComparisonType::GreaterEqual => {
            Ok(OptimizationDirection::Minimize)
        }
        ComparisonType::Equal | ComparisonType::NotEqual => {
            Err(CheckError::UnusableComparator { comparator: comparison })
        }
    }
}

/// Whether `value` satisfies the comparison against `threshold`.
pub fn satisfies(value: f64, comparison: ComparisonType, threshold: f64) -> bool {
    match comparison {
        ComparisonType::Less => value < threshold,
        ComparisonType::LessEqual => value <= threshold,
        ComparisonType::Greater => value > threshold,
        ComparisonType::GreaterEqual => value >= threshold,
        ComparisonType::Equal => value == threshold,
        ComparisonType::NotEqual => value != threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_table() {
        assert_eq!(
            optimization_direction(ComparisonType::Less).unwrap(),
            OptimizationDirection::Maximize
        );
        assert_eq!(
            optimization_direction(ComparisonType::LessEqual).unwrap(),
            OptimizationDirection::Maximize
        );
        assert_eq!(
            optimization_direction(ComparisonType::Greater).unwrap(),
            OptimizationDirection::Minimize
        );
        assert_eq!(
            optimization_direction(ComparisonType::GreaterEqual).unwrap(),
            OptimizationDirection::Minimize
        );
    }

    #[test]
    fn test_equality_comparators_rejected() {
        assert!(matches!(
            optimization_direction(ComparisonType::Equal),
            Err(CheckError::UnusableComparator { .. })
        ));
        assert!(matches!(
            optimization_direction(ComparisonType::NotEqual),
            Err(CheckError::UnusableComparator { .. })
        ));
    }

    #[test]
    fn test_satisfaction() {
        assert!(satisfies(0.3, ComparisonType::Less, 0.5));
        assert!(!satisfies(0.5, ComparisonType::Less, 0.5));
        assert!(satisfies(0.5, ComparisonType::GreaterEqual, 0.5));
    }
}
