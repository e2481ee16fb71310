/*!
# Writers module
Contains the logic for writing the tabular outputs of the refine command.
*/
/// Generates the per-allele summary file (CSV/TSV)
pub mod minor_summary;
