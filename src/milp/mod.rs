
/// Backend trait, solutions, and solver errors
pub mod backend;
/// Polynomial expressions over model variables
pub mod expression;
/// `good_lp` implementation of the backend trait
pub mod good_lp_backend;
/// Backend-independent model: variables and constraints
pub mod model;
