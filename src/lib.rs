
/// Expands minor alleles of the called major alleles into copy-slot candidates
pub mod candidates;
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Generic MILP modeling layer and the solver backends behind it
pub mod milp;
/// Encodes one refinement problem as a MILP
pub mod minor_model;
/// Entry point for refining major solutions into minor solutions
pub mod minor_solver;
/// Coverage filters that decide which observations reach the model
pub mod mutation_filter;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
