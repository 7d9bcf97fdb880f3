//! Solver capability requirements.
//!
//! A solver may only be correct on restricted inputs (no end components, a
//! known valid starting scheduler, value bounds). It states those needs as
//! a requirement set; the caller clears every flag it can discharge and
//! must refuse to run the solver if anything remains.

use std::fmt;

/// Set of guarantees a solver demands from its input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverRequirements {
    no_end_components: bool,
    valid_initial_scheduler: bool,
    lower_bounds: bool,
    upper_bounds: bool,
}

impl SolverRequirements {
    /// The empty requirement set.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn require_no_end_components(mut self) -> Self {
        self.no_end_components = true;
        self
    }

    pub fn require_valid_initial_scheduler(mut self) -> Self {
        self.valid_initial_scheduler = true;
        self
    }

    pub fn require_bounds(mut self) -> Self {
        self.lower_bounds = true;
        self.upper_bounds = true;
        self
    }

    pub fn require_lower_bounds(mut self) -> Self {
        self.lower_bounds = true;
        self
    }

    pub fn require_upper_bounds(mut self) -> Self {
        self.upper_bounds = true;
        self
    }

    #[inline]
    pub fn no_end_components(&self) -> bool {
        self.no_end_components
    }

    #[inline]
    pub fn valid_initial_scheduler(&self) -> bool {
        self.valid_initial_scheduler
    }

    #[inline]
    pub fn lower_bounds(&self) -> bool {
        self.lower_bounds
    }

    #[inline]
    pub fn upper_bounds(&self) -> bool {
        self.upper_bounds
    }

    pub fn clear_no_end_components(&mut self) {
        self.no_end_components = false;
    }

    pub fn clear_valid_initial_scheduler(&mut self) {
        self.valid_initial_scheduler = false;
    }

    pub fn clear_lower_bounds(&mut self) {
        self.lower_bounds = false;
    }

    pub fn clear_upper_bounds(&mut self) {
        self.upper_bounds = false;
    }

    pub fn clear_bounds(&mut self) {
        self.lower_bounds = false;
        self.upper_bounds = false;
    }

    /// True iff no requirement is left.
    pub fn is_empty(&self) -> bool {
        !self.no_end_components
            && !self.valid_initial_scheduler
            && !self.lower_bounds
            && !self.upper_bounds
    }
}

impl fmt::Display for SolverRequirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.no_end_components {
            names.push("no end components");
        }
        if self.valid_initial_scheduler {
            names.push("valid initial scheduler");
        }
        if self.lower_bounds {
            names.push("lower bounds");
        }
        if self.upper_bounds {
            names.push("upper bounds");
        }
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clearing_empties_the_set() {
        let mut req = SolverRequirements::none()
            .require_no_end_components()
            .require_bounds();
        assert!(!req.is_empty());
        req.clear_no_end_components();
        assert!(!req.is_empty());
        req.clear_bounds();
        assert!(req.is_empty());
    }

    #[test]
    fn test_display_lists_remaining_flags() {
        let req = SolverRequirements::none()
            .require_valid_initial_scheduler()
            .require_upper_bounds();
        assert_eq!(req.to_string(), "valid initial scheduler, upper bounds");
        assert_eq!(SolverRequirements::none().to_string(), "none");
    }
}
