
use itertools::Itertools;
use serde::Serialize;
use std::fmt;

use crate::data_types::major_solution::MajorSolution;
use crate::data_types::solved_allele::SolvedAllele;
use crate::util::allele_names::allele_sort_key;

/// A minor star-allele assignment refining one major solution.
#[derive(Clone, Debug, Serialize)]
pub struct MinorSolution {
    /// Total penalized model error, 0 only for an exact unmodified match
    score: f64,
    /// One entry per selected gene copy
    solution: Vec<SolvedAllele>,
    /// The major solution this assignment refines
    major_solution: MajorSolution,
}

impl MinorSolution {
    /// Constructor
    pub fn new(score: f64, solution: Vec<SolvedAllele>, major_solution: MajorSolution) -> Self {
        Self {
            score,
            solution,
            major_solution
        }
    }

    /// Alleles ordered by their names, e.g. for reporting
    pub fn sorted_alleles(&self) -> Vec<&SolvedAllele> {
        self.solution.iter()
            .sorted_by_key(|a| allele_sort_key(a.display_name()))
            .collect()
    }

    // getters
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn solution(&self) -> &[SolvedAllele] {
        &self.solution
    }

    pub fn major_solution(&self) -> &MajorSolution {
        &self.major_solution
    }
}

impl fmt::Display for MinorSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alleles = self.sorted_alleles().iter().join(", ");
        write!(f, "MinorSol[{:.2}; sol=({alleles}); major={}]", self.score, self.major_solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::data_types::cn_solution::CnSolution;
    use crate::data_types::gene::Gene;
    use crate::data_types::gene::tests::mock_gene_record;

    #[test]
    fn test_display_sorted() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let cn = CnSolution::new(&gene, 0.0, vec!["1".to_string(), "1".to_string()]).unwrap();
        let major = MajorSolution::new(
            0.0, [(SolvedAllele::major_only("1"), 2)].into_iter().collect::<BTreeMap<_, _>>(), cn
        ).unwrap();

        let solution = vec![
            SolvedAllele::new("1".to_string(), Some("1.002".to_string()), vec![], vec![]),
            SolvedAllele::new("1".to_string(), Some("1.001".to_string()), vec![], vec!["150:C>T".parse().unwrap()]),
        ];
        let minor = MinorSolution::new(2.0, solution, major);
        assert_eq!(
            minor.to_string(),
            "MinorSol[2.00; sol=(*1.001 -150:C>T, *1.002); major=MajorSol[0.00; sol=(2x*1); cn=CNSol[0.00; sol=(2x*1)]]]"
        );
        // construction order is preserved in the raw solution
        assert_eq!(minor.solution()[0].minor(), Some("1.002"));
    }
}
