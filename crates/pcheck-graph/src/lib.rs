//! Qualitative graph analysis over sparse transition matrices.
//!
//! The quantitative pipeline never solves equations for states whose value
//! is already decided by the graph structure alone. This crate answers the
//! structural questions: which states reach a target with positive
//! probability or with certainty (under the best or the worst resolution of
//! nondeterminism), and where the maximal end components lie.

pub mod mec;
pub mod qualitative;
pub mod scc;

pub use mec::{maximal_end_components, MaximalEndComponent};
pub use qualitative::{
    prob01, prob01_max, prob01_min, prob1_a, prob1_e, prob_greater0_a, prob_greater0_e,
    scheduler_prob_greater0_e, ChoiceQuantifier,
};
pub use scc::strongly_connected_components;
