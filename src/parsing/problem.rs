
use anyhow::Context;
use log::debug;
use serde::Deserialize;
use std::path::Path;

use crate::data_types::coverage::{Coverage, CoverageRecord};
use crate::data_types::gene::{Gene, GeneRecord};
use crate::data_types::major_solution::{MajorSolution, MajorSolutionRecord};
use crate::util::json_io::load_json;

/// Serialized refinement input: the gene catalog, one sample's coverage, and the major solutions to refine.
/// Accepts plain or gzip-compressed JSON.
#[derive(Clone, Debug, Deserialize)]
pub struct RefineProblemRecord {
    pub gene: GeneRecord,
    pub coverage: CoverageRecord,
    pub major_solutions: Vec<MajorSolutionRecord>,
}

/// A fully validated refinement input
#[derive(Clone, Debug)]
pub struct RefineProblem {
    gene: Gene,
    coverage: Coverage,
    major_solutions: Vec<MajorSolution>,
}

impl RefineProblem {
    /// Loads and validates a problem bundle from a JSON file.
    /// # Arguments
    /// * `filename` - path to the JSON (or JSON.gz) bundle
    /// # Errors
    /// * if the file cannot be opened or parsed
    /// * if the gene catalog, coverage, or any major solution is inconsistent
    pub fn from_json(filename: &Path) -> anyhow::Result<Self> {
        let record: RefineProblemRecord = load_json(filename)?;
        Self::try_from(record)
            .with_context(|| format!("Error while validating problem in {filename:?}:"))
    }

    // getters
    pub fn gene(&self) -> &Gene {
        &self.gene
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    pub fn major_solutions(&self) -> &[MajorSolution] {
        &self.major_solutions
    }
}

impl TryFrom<RefineProblemRecord> for RefineProblem {
    type Error = anyhow::Error;

    fn try_from(record: RefineProblemRecord) -> Result<Self, Self::Error> {
        let gene = Gene::try_from(record.gene)
            .context("Error while loading gene catalog:")?;
        let coverage = Coverage::try_from(record.coverage)
            .context("Error while loading coverage:")?;
        let major_solutions = record.major_solutions.into_iter()
            .enumerate()
            .map(|(i, major)| {
                major.into_major_solution(&gene)
                    .with_context(|| format!("Error while loading major solution #{i}:"))
            })
            .collect::<anyhow::Result<Vec<MajorSolution>>>()?;
        debug!("Loaded {} with {} positions and {} major solutions", gene.name(), coverage.positions().count(), major_solutions.len());

        Ok(Self {
            gene,
            coverage,
            major_solutions
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::solved_allele::SolvedAllele;

    fn mock_problem_json(allele: &str) -> String {
        format!(r#"{{
            "gene": {{
                "name": "DEMO",
                "regions": [{{"name": "e1", "start": 100, "end": 300}}],
                "cn_configs": {{"1": {{"cn": [{{"e1": 1}}]}}}},
                "alleles": {{"1": {{"cn_config": "1", "minors": {{"1.001": {{"neutral_muts": ["150:C>T"]}}}}}}}}
            }},
            "coverage": {{"counts": {{"150": {{"C>T": 20}}}}}},
            "major_solutions": [{{"cn_solution": ["1"], "alleles": [{{"major": "{allele}", "copies": 1}}]}}]
        }}"#)
    }

    #[test]
    fn test_problem_conversion() {
        let record: RefineProblemRecord = serde_json::from_str(&mock_problem_json("1")).unwrap();
        let problem = RefineProblem::try_from(record).unwrap();
        assert_eq!(problem.gene().name(), "DEMO");
        assert_eq!(problem.coverage().get(&"150:C>T".parse().unwrap()), 20);
        assert_eq!(problem.major_solutions().len(), 1);
        assert_eq!(problem.major_solutions()[0].count(&SolvedAllele::major_only("1")), 1);
    }

    #[test]
    fn test_unknown_major() {
        let record: RefineProblemRecord = serde_json::from_str(&mock_problem_json("9")).unwrap();
        let error = RefineProblem::try_from(record).unwrap_err();
        assert!(format!("{error:#}").contains("major solution #0"));
    }
}
