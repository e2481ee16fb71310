
use serde::Serialize;

use crate::data_types::mutation::Mutation;
use crate::data_types::solved_allele::SolvedAllele;

/// Observed coverage fraction one coverage-consistency constraint was built against
#[derive(Clone, Debug, Serialize)]
pub struct ObservedFraction {
    /// Mutation or reference marker
    pub mutation: Mutation,
    /// Read count in the filtered coverage
    pub count: u64,
    /// `count / single_copy(position)`
    pub fraction: f64,
}

/// Copy-number bounds on the total expression of one mutation.
/// These are only enforced if explicitly requested.
#[derive(Clone, Debug, Serialize)]
pub struct CnBound {
    pub mutation: Mutation,
    /// Total copy number at the mutation position
    pub position_cn: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Snapshot of one refinement model, written to the debug folder
#[derive(Clone, Debug, Default, Serialize)]
pub struct ModelAudit {
    /// Copy-number configurations, one per copy
    pub cn_solution: Vec<String>,
    /// Major-level keys and their copy counts
    pub major: Vec<(SolvedAllele, u32)>,
    /// Right-hand sides of every coverage-consistency constraint
    pub observed: Vec<ObservedFraction>,
    pub cn_bounds: Vec<CnBound>,
    pub num_variables: usize,
    pub num_constraints: usize,
    /// Score and alleles if the model was solved
    pub score: Option<f64>,
    pub solution: Option<Vec<SolvedAllele>>,
}
