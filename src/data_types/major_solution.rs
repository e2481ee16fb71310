
use itertools::Itertools;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::data_types::cn_solution::{CnSolution, CnSolutionError};
use crate::data_types::gene::Gene;
use crate::data_types::mutation::{Mutation, MutationError};
use crate::data_types::solved_allele::SolvedAllele;

#[derive(thiserror::Error, Debug)]
pub enum MajorSolutionError {
    #[error("major solution keys must not name a minor allele or missing mutations: {allele}")]
    NotMajorKey { allele: SolvedAllele },
    #[error("unknown major allele {major:?}")]
    UnknownAllele { major: String },
    #[error("allele copies ({allele_copies}) do not match the copy-number solution ({cn_copies})")]
    CopyCountMismatch { allele_copies: u64, cn_copies: usize },
    #[error(transparent)]
    CnSolution(#[from] CnSolutionError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// Copy-number aware major star-allele call produced upstream.
#[derive(Clone, Debug)]
pub struct MajorSolution {
    /// Score from the major-allele stage
    score: f64,
    /// Major-level allele key -> number of copies
    solution: BTreeMap<SolvedAllele, u32>,
    /// The copy-number call these alleles were derived from
    cn_solution: CnSolution,
}

impl MajorSolution {
    /// Constructor with invariant checks
    /// # Errors
    /// * if a key names a minor allele or missing mutations
    /// * if the copy counts do not sum to the number of copies in `cn_solution`
    pub fn new(score: f64, solution: BTreeMap<SolvedAllele, u32>, cn_solution: CnSolution) -> Result<Self, MajorSolutionError> {
        if let Some(allele) = solution.keys().find(|a| a.minor().is_some() || !a.missing().is_empty()) {
            return Err(MajorSolutionError::NotMajorKey { allele: allele.clone() });
        }
        let allele_copies: u64 = solution.values().map(|&c| c as u64).sum();
        if allele_copies != cn_solution.total_copies() as u64 {
            return Err(MajorSolutionError::CopyCountMismatch {
                allele_copies,
                cn_copies: cn_solution.total_copies()
            });
        }

        Ok(Self {
            score,
            solution,
            cn_solution
        })
    }

    /// Copies assigned to a major-level key, 0 if absent
    pub fn count(&self, key: &SolvedAllele) -> u32 {
        self.solution.get(key).copied().unwrap_or(0)
    }

    /// Stable ordering key used to enumerate major solutions deterministically
    pub fn sort_key(&self) -> Vec<(&SolvedAllele, u32)> {
        self.solution.iter().map(|(a, &c)| (a, c)).collect()
    }

    // getters
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn solution(&self) -> &BTreeMap<SolvedAllele, u32> {
        &self.solution
    }

    pub fn cn_solution(&self) -> &CnSolution {
        &self.cn_solution
    }
}

impl fmt::Display for MajorSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alleles = self.solution.iter()
            .map(|(a, c)| format!("{c}x{a}"))
            .join(", ");
        write!(f, "MajorSol[{:.2}; sol=({alleles}); cn={}]", self.score, self.cn_solution)
    }
}

/// Serialized form of one (allele, copies) entry
#[derive(Serialize)]
struct MajorEntry<'a> {
    allele: &'a SolvedAllele,
    copies: u32,
}

/// Borrowed view used for serialization, since JSON keys must be strings
#[derive(Serialize)]
struct MajorSolutionView<'a> {
    score: f64,
    cn_solution: &'a CnSolution,
    solution: Vec<MajorEntry<'a>>,
}

impl Serialize for MajorSolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MajorSolutionView {
            score: self.score,
            cn_solution: &self.cn_solution,
            solution: self.solution.iter()
                .map(|(allele, &copies)| MajorEntry { allele, copies })
                .collect()
        }.serialize(serializer)
    }
}

/// Serialized major allele entry
#[derive(Clone, Debug, Deserialize)]
pub struct MajorAlleleCountRecord {
    pub major: String,
    #[serde(default)]
    pub added: Vec<String>,
    pub copies: u32,
}

/// Serialized major solution, e.g. `{"cn_solution": ["1", "1"], "alleles": [{"major": "1", "copies": 2}]}`
#[derive(Clone, Debug, Deserialize)]
pub struct MajorSolutionRecord {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub cn_score: f64,
    pub cn_solution: Vec<String>,
    pub alleles: Vec<MajorAlleleCountRecord>,
}

impl MajorSolutionRecord {
    /// Converts into a `MajorSolution` against a loaded gene.
    /// Repeated keys have their copies summed, and every added mutation is marked functional.
    /// # Errors
    /// * if an allele or CN configuration is not in the gene
    /// * if any `MajorSolution` invariant fails
    pub fn into_major_solution(self, gene: &Gene) -> Result<MajorSolution, MajorSolutionError> {
        let cn_solution = CnSolution::new(gene, self.cn_score, self.cn_solution)?;
        let mut solution: BTreeMap<SolvedAllele, u32> = Default::default();
        for entry in self.alleles.into_iter() {
            if gene.allele(&entry.major).is_none() {
                return Err(MajorSolutionError::UnknownAllele { major: entry.major });
            }
            // additions at the major level always come from functional calls
            let mut added: Vec<Mutation> = entry.added.iter()
                .map(|m| Mutation::parse(m, true))
                .collect::<Result<_, _>>()?;
            added.sort();
            let key = SolvedAllele::new(entry.major, None, added, vec![]);
            *solution.entry(key).or_default() += entry.copies;
        }
        MajorSolution::new(self.score, solution, cn_solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::gene::tests::mock_gene_record;

    #[test]
    fn test_record_conversion() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let record: MajorSolutionRecord = serde_json::from_str(r#"{
            "score": 1.5,
            "cn_solution": ["1", "5"],
            "alleles": [{"major": "1", "copies": 1}, {"major": "5", "copies": 1}]
        }"#).unwrap();
        let major = record.into_major_solution(&gene).unwrap();
        assert_eq!(major.count(&SolvedAllele::major_only("1")), 1);
        assert_eq!(major.count(&SolvedAllele::major_only("5")), 1);
        assert_eq!(major.count(&SolvedAllele::major_only("4")), 0);
        assert_eq!(major.to_string(), "MajorSol[1.50; sol=(1x*1, 1x*5); cn=CNSol[0.00; sol=(1x*1, 1x*5)]]");

        let json = serde_json::to_value(&major).unwrap();
        assert_eq!(json["solution"][0]["copies"], 1);
        assert_eq!(json["solution"][0]["allele"]["major"], "1");
        assert_eq!(json["cn_solution"]["configs"][1], "5");
    }

    #[test]
    fn test_added_are_functional() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let record: MajorSolutionRecord = serde_json::from_str(r#"{
            "cn_solution": ["1", "1"],
            "alleles": [{"major": "1", "added": ["120:G>A"], "copies": 1}, {"major": "1", "copies": 1}]
        }"#).unwrap();
        let major = record.into_major_solution(&gene).unwrap();
        let forced = major.solution().keys()
            .find(|k| !k.added().is_empty())
            .unwrap();
        assert_eq!(forced.added().len(), 1);
        assert!(forced.added()[0].is_functional());
        assert_eq!(major.count(&SolvedAllele::major_only("1")), 1);
    }

    #[test]
    fn test_invariants() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let cn = CnSolution::new(&gene, 0.0, vec!["1".to_string(), "1".to_string()]).unwrap();

        let solution: BTreeMap<SolvedAllele, u32> = [(SolvedAllele::major_only("1"), 1)].into_iter().collect();
        assert!(matches!(
            MajorSolution::new(0.0, solution, cn.clone()),
            Err(MajorSolutionError::CopyCountMismatch { allele_copies: 1, cn_copies: 2 })
        ));

        let minor_key = SolvedAllele::new("1".to_string(), Some("1.001".to_string()), vec![], vec![]);
        let solution: BTreeMap<SolvedAllele, u32> = [(minor_key, 2)].into_iter().collect();
        assert!(matches!(
            MajorSolution::new(0.0, solution, cn.clone()),
            Err(MajorSolutionError::NotMajorKey { .. })
        ));

        let record: MajorSolutionRecord = serde_json::from_str(r#"{
            "cn_solution": ["1"],
            "alleles": [{"major": "9", "copies": 1}]
        }"#).unwrap();
        assert!(matches!(record.into_major_solution(&gene), Err(MajorSolutionError::UnknownAllele { .. })));
    }
}
