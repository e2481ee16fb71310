
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::data_types::gene::Gene;
use crate::data_types::major_solution::MajorSolution;
use crate::data_types::mutation::Mutation;
use crate::data_types::solved_allele::SolvedAllele;
use crate::minor_model::ModelError;

/// Identity of one candidate instance: a minor allele hypothesis at a copy slot
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CandidateId {
    /// Minor allele with the force-added mutations of its major key, never any missing
    base: SolvedAllele,
    /// 0-based copy slot
    copy: u32,
}

impl CandidateId {
    /// Constructor
    pub fn new(base: SolvedAllele, copy: u32) -> Self {
        Self { base, copy }
    }

    // getters
    pub fn base(&self) -> &SolvedAllele {
        &self.base
    }

    pub fn copy(&self) -> u32 {
        self.copy
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.base, self.copy)
    }
}

/// One candidate instance and the mutations that define it
#[derive(Clone, Debug)]
pub struct Candidate {
    id: CandidateId,
    /// Functional mutations of the major, neutral mutations of the minor, and force-added mutations
    mutations: BTreeSet<Mutation>,
}

impl Candidate {
    /// Returns true if `mutation` is part of this candidate's definition
    pub fn defines(&self, mutation: &Mutation) -> bool {
        self.mutations.contains(mutation)
    }

    /// The major allele this candidate belongs to
    pub fn major(&self) -> &str {
        self.id.base.major()
    }

    // getters
    pub fn id(&self) -> &CandidateId {
        &self.id
    }

    pub fn mutations(&self) -> &BTreeSet<Mutation> {
        &self.mutations
    }
}

/// Candidate bases shared by every major solution of one sample, plus the relevant mutation universe
#[derive(Clone, Debug, Default)]
pub struct CandidateSpace {
    /// Base allele -> defining mutations
    bases: BTreeMap<SolvedAllele, BTreeSet<Mutation>>,
    /// Union of all defining mutations over every base
    mutations: BTreeSet<Mutation>,
}

impl CandidateSpace {
    /// Collects every (major, minor) pair reachable from any of the `major_solutions`.
    /// # Errors
    /// * if a major solution references an allele that is not in `gene`
    pub fn new(gene: &Gene, major_solutions: &[MajorSolution]) -> Result<Self, ModelError> {
        let mut bases: BTreeMap<SolvedAllele, BTreeSet<Mutation>> = Default::default();
        let mut mutations: BTreeSet<Mutation> = Default::default();
        for major_solution in major_solutions.iter() {
            for key in major_solution.solution().keys() {
                let major = gene.allele(key.major())
                    .ok_or_else(|| ModelError::UnknownAllele { allele: key.major().to_string() })?;
                for minor in major.minors().values() {
                    let base = SolvedAllele::new(
                        key.major().to_string(), Some(minor.name().to_string()),
                        key.added().to_vec(), vec![]
                    );
                    let defining: BTreeSet<Mutation> = major.func_muts().iter()
                        .chain(minor.neutral_muts().iter())
                        .chain(key.added().iter())
                        .cloned()
                        .collect();
                    mutations.extend(defining.iter().cloned());
                    bases.insert(base, defining);
                }
            }
        }

        debug!("Candidate space: {} bases over {} mutations", bases.len(), mutations.len());
        Ok(Self { bases, mutations })
    }

    /// Expands the bases into copy slots using the counts of `major_solution`.
    /// Bases whose major key is absent from this solution get no instance.
    pub fn instantiate(&self, major_solution: &MajorSolution) -> Vec<Candidate> {
        self.bases.iter()
            .flat_map(|(base, mutations)| {
                let count = major_solution.count(&base.major_key());
                (0..count).map(move |copy| Candidate {
                    id: CandidateId::new(base.clone(), copy),
                    mutations: mutations.clone()
                })
            })
            .collect()
    }

    // getters
    pub fn bases(&self) -> &BTreeMap<SolvedAllele, BTreeSet<Mutation>> {
        &self.bases
    }

    pub fn mutations(&self) -> &BTreeSet<Mutation> {
        &self.mutations
    }
}
