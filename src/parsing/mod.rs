/*!
# Parsing module
Contains the logic for parsing input files into meaningful structs / data.
*/
/// Loads the refinement input bundle (gene, coverage, major solutions)
pub mod problem;
