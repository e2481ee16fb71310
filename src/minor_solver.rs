/*!
# Minor Solver
Refines major star-allele calls into minor star-alleles.
Each major solution is refined independently: candidates are expanded into copy slots, the coverage is filtered for the relevant mutations, and the resulting model is solved by a MILP backend.
Solver settings and penalty weights are controlled via the `MinorConfig` struct.

## Example usage
```rust
use minorstar::data_types::coverage::{Coverage, CoverageRecord};
use minorstar::data_types::gene::{Gene, GeneRecord};
use minorstar::data_types::major_solution::MajorSolutionRecord;
use minorstar::minor_solver::{estimate_minor, MinorConfig};

// a gene with one region and two minor alleles of *1 that differ by one mutation each
let gene_record: GeneRecord = serde_json::from_str(r#"{
    "name": "DEMO",
    "regions": [{"name": "e1", "start": 100, "end": 300}],
    "cn_configs": {"1": {"cn": [{"e1": 1}]}},
    "alleles": {
        "1": {
            "cn_config": "1",
            "minors": {
                "1.001": {"neutral_muts": ["150:C>T"]},
                "1.002": {"neutral_muts": ["250:A>G"]}
            }
        }
    }
}"#).unwrap();
let gene = Gene::try_from(gene_record).unwrap();

// the reads support 150:C>T and the reference base at 250
let coverage_record: CoverageRecord = serde_json::from_str(r#"{
    "counts": {"150": {"C>T": 20}, "250": {"_": 20}}
}"#).unwrap();
let coverage = Coverage::try_from(coverage_record).unwrap();

// a single copy of *1 from the major-allele stage
let major_record: MajorSolutionRecord = serde_json::from_str(r#"{
    "cn_solution": ["1"],
    "alleles": [{"major": "1", "copies": 1}]
}"#).unwrap();
let major_solution = major_record.into_major_solution(&gene).unwrap();

let minor_solutions = estimate_minor(&gene, &coverage, &[major_solution], &MinorConfig::default(), None).unwrap();
assert_eq!(minor_solutions.len(), 1);
assert_eq!(minor_solutions[0].solution()[0].to_string(), "*1.001");
assert!(minor_solutions[0].score() < 1e-6);
```
*/
use derive_builder::Builder;
use itertools::Itertools;
use log::{debug, error, trace};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::candidates::{Candidate, CandidateSpace};
use crate::data_types::coverage::Coverage;
use crate::data_types::gene::Gene;
use crate::data_types::major_solution::MajorSolution;
use crate::data_types::minor_solution::MinorSolution;
use crate::data_types::model_audit::ModelAudit;
use crate::data_types::mutation::Mutation;
use crate::milp::backend::MilpBackend;
use crate::milp::good_lp_backend::{GoodLpBackend, SolverEngine};
use crate::minor_model::{MinorModel, ModelError};
use crate::mutation_filter::{filter_coverage, CoverageFilter};

/// Default penalty for each defining mutation that is missing from a selected allele
pub const MISS_PENALTY_FACTOR: f64 = 2.0;
/// Default penalty for each mutation added to a selected allele
pub const ADD_PENALTY_FACTOR: f64 = 1.0;

/// Controls the refinement model and the solver that runs it
#[derive(Builder, Clone, Debug, Serialize)]
#[builder(default)]
pub struct MinorConfig {
    /// Penalty per missing defining mutation, 0 disables it
    miss_penalty: f64,
    /// Penalty per added mutation, 0 disables it
    add_penalty: f64,
    /// If true, the copy-number bounds per locus and per mutation become hard constraints
    enforce_cn_bounds: bool,
    /// Major solutions are refined in parallel if this is greater than 1
    threads: usize,
    /// Solver wall-clock limit in seconds per model
    time_limit: Option<f64>,
    /// MILP engine
    solver: SolverEngine,
    /// If true, binary products in the objective are linearized by the backend instead of the epigraph encoding
    linearize_objective: bool,
}

impl Default for MinorConfig {
    fn default() -> Self {
        Self {
            miss_penalty: MISS_PENALTY_FACTOR,
            add_penalty: ADD_PENALTY_FACTOR,
            enforce_cn_bounds: false,
            threads: 1,
            time_limit: None,
            solver: SolverEngine::default(),
            linearize_objective: false
        }
    }
}

impl MinorConfig {
    /// Backend described by this configuration
    pub fn backend(&self) -> GoodLpBackend {
        GoodLpBackend::new(self.solver, self.linearize_objective, self.time_limit)
    }

    // mostly getters
    pub fn miss_penalty(&self) -> f64 {
        self.miss_penalty
    }

    pub fn add_penalty(&self) -> f64 {
        self.add_penalty
    }

    pub fn enforce_cn_bounds(&self) -> bool {
        self.enforce_cn_bounds
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn time_limit(&self) -> Option<f64> {
        self.time_limit
    }

    pub fn solver(&self) -> SolverEngine {
        self.solver
    }

    pub fn linearize_objective(&self) -> bool {
        self.linearize_objective
    }
}

/// Outcome of refining one major solution
#[derive(Clone, Debug)]
pub struct RefinedModel {
    major_solution: MajorSolution,
    /// None if the model had no solution
    solution: Option<MinorSolution>,
    audit: ModelAudit,
}

impl RefinedModel {
    // getters
    pub fn major_solution(&self) -> &MajorSolution {
        &self.major_solution
    }

    pub fn solution(&self) -> Option<&MinorSolution> {
        self.solution.as_ref()
    }

    pub fn audit(&self) -> &ModelAudit {
        &self.audit
    }
}

/// Entry point for minor star-allele calling.
/// Returns one `MinorSolution` per major solution that could be refined, ordered by the major solutions' allele lists.
/// # Arguments
/// * `gene` - the gene catalog
/// * `coverage` - unfiltered sample coverage
/// * `major_solutions` - all major solutions to refine; their candidates are considered together
/// * `config` - penalty weights and solver settings
/// * `filter_fn` - optional replacement for the default coverage filter
/// # Errors
/// * if a major solution references an allele that is not in `gene`
pub fn estimate_minor(
    gene: &Gene, coverage: &Coverage, major_solutions: &[MajorSolution], config: &MinorConfig,
    filter_fn: Option<&CoverageFilter>
) -> Result<Vec<MinorSolution>, ModelError> {
    let refined = refine_major_solutions(gene, coverage, major_solutions, config, filter_fn)?;
    Ok(refined.into_iter()
        .filter_map(|r| r.solution)
        .collect())
}

/// Same as `estimate_minor`, but keeps the audit and the empty outcomes for every major solution.
/// Major solutions that fail with an error are logged and left out.
/// # Errors
/// * if a major solution references an allele that is not in `gene`
/// * if `config.threads() > 1` and the thread pool cannot be created
pub fn refine_major_solutions(
    gene: &Gene, coverage: &Coverage, major_solutions: &[MajorSolution], config: &MinorConfig,
    filter_fn: Option<&CoverageFilter>
) -> Result<Vec<RefinedModel>, ModelError> {
    let refiner = MinorRefiner::new(gene, coverage, major_solutions, config, filter_fn)?;
    let ordered = MinorRefiner::ordered(major_solutions);

    let refine = |major_solution: &MajorSolution| -> Option<RefinedModel> {
        match refiner.refine(major_solution) {
            Ok(refined) => Some(refined),
            Err(e) => {
                error!("Error while refining {major_solution}: {e:#}");
                None
            }
        }
    };

    let refined: Vec<RefinedModel> = if config.threads() > 1 {
        let pool = thread_pool(config)?;
        pool.install(|| {
            ordered.into_par_iter()
                .map(refine)
                .collect::<Vec<Option<RefinedModel>>>()
        })
        .into_iter()
        .flatten()
        .collect()
    } else {
        ordered.into_iter()
            .filter_map(refine)
            .collect()
    };
    Ok(refined)
}

/// Dedicated pool sized by `config.threads()`
/// # Errors
/// * if the pool cannot be created
pub fn thread_pool(config: &MinorConfig) -> Result<rayon::ThreadPool, ModelError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads())
        .build()?;
    Ok(pool)
}

/// Shared state for refining every major solution of one sample.
/// Useful when the caller wants to drive the iteration, e.g. with a progress bar.
pub struct MinorRefiner<'a> {
    gene: &'a Gene,
    coverage: &'a Coverage,
    config: &'a MinorConfig,
    filter_fn: Option<&'a CoverageFilter>,
    /// Candidates from all major solutions are considered together
    space: CandidateSpace,
    backend: GoodLpBackend,
}

impl<'a> MinorRefiner<'a> {
    /// Builds the shared candidate space.
    /// # Errors
    /// * if a major solution references an allele that is not in `gene`
    pub fn new(
        gene: &'a Gene, coverage: &'a Coverage, major_solutions: &[MajorSolution], config: &'a MinorConfig,
        filter_fn: Option<&'a CoverageFilter>
    ) -> Result<Self, ModelError> {
        let space = CandidateSpace::new(gene, major_solutions)?;
        Ok(Self {
            gene,
            coverage,
            config,
            filter_fn,
            space,
            backend: config.backend()
        })
    }

    /// The order results are reported in, by the `(key, count)` lists of each major solution
    pub fn ordered(major_solutions: &[MajorSolution]) -> Vec<&MajorSolution> {
        major_solutions.iter()
            .sorted_by(|a, b| a.sort_key().cmp(&b.sort_key()))
            .collect()
    }

    /// Filters the coverage for one major solution and solves its model.
    /// # Errors
    /// * see `solve_minor_model`
    pub fn refine(&self, major_solution: &MajorSolution) -> anyhow::Result<RefinedModel> {
        let filtered = filter_coverage(self.coverage, self.space.mutations(), major_solution, self.filter_fn);
        let candidates = self.space.instantiate(major_solution);
        solve_minor_model(
            self.gene, candidates, &filtered, major_solution, self.space.mutations(), self.config, &self.backend
        )
    }

    // getters
    pub fn space(&self) -> &CandidateSpace {
        &self.space
    }

    pub fn backend(&self) -> &GoodLpBackend {
        &self.backend
    }
}

/// Builds and solves the model for one major solution.
/// A model without a solution (infeasible or out of time) is not an error; it yields `RefinedModel::solution() == None`.
/// # Arguments
/// * `gene` - the gene catalog
/// * `candidates` - candidate instances for `major_solution`
/// * `coverage` - coverage already filtered for this major solution
/// * `major_solution` - the major solution to refine
/// * `mutations` - the relevant mutations across all major solutions
/// * `config` - penalty weights
/// * `backend` - the solver
/// # Errors
/// * if the model cannot be built, see `ModelError`
/// * if the backend fails for any reason other than a missing solution
pub fn solve_minor_model(
    gene: &Gene, candidates: Vec<Candidate>, coverage: &Coverage, major_solution: &MajorSolution,
    mutations: &BTreeSet<Mutation>, config: &MinorConfig, backend: &dyn MilpBackend
) -> anyhow::Result<RefinedModel> {
    let mut minor_model = MinorModel::encode(gene, candidates, coverage, major_solution, mutations, config)?;
    let objective = minor_model.objective(backend.supports_nonlinear_objective());
    trace!("Objective: {objective}");

    let solution = match minor_model.model().minimize(backend, &objective) {
        Ok(solution) => solution,
        Err(e) if e.is_no_solution() => {
            debug!("No minor solution for {major_solution}: {e}");
            return Ok(RefinedModel {
                major_solution: major_solution.clone(),
                solution: None,
                audit: minor_model.into_audit()
            });
        },
        Err(e) => return Err(e.into())
    };

    let alleles = minor_model.reconstruct(&solution);
    let score = solution.evaluate_rounded(minor_model.model(), &minor_model.score_expr());
    let minor_solution = MinorSolution::new(score, alleles.clone(), major_solution.clone());
    debug!("Minor solution: {minor_solution}");

    let mut audit = minor_model.into_audit();
    audit.score = Some(score);
    audit.solution = Some(alleles);
    Ok(RefinedModel {
        major_solution: major_solution.clone(),
        solution: Some(minor_solution),
        audit
    })
}
