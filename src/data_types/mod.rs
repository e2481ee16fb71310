
/// Copy-number call of one sample, expanded to per-region copy numbers
pub mod cn_solution;
/// Read counts per position and operation, with the relevance filters
pub mod coverage;
/// Gene catalog: regions, copy-number configurations, and the major/minor allele database
pub mod gene;
/// Major star-allele call that the refinement starts from
pub mod major_solution;
/// Refined minor star-allele call
pub mod minor_solution;
/// Debug snapshot of one refinement model
pub mod model_audit;
/// Mutation definition and parsing
pub mod mutation;
/// An allele call with its added and missing mutations
pub mod solved_allele;
