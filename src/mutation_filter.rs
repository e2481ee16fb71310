
use log::debug;
use std::collections::BTreeSet;

use crate::data_types::cn_solution::{CnSolution, MAX_CN};
use crate::data_types::coverage::Coverage;
use crate::data_types::major_solution::MajorSolution;
use crate::data_types::mutation::Mutation;

/// Caller-provided coverage predicate over `(mutation, count, total, threshold)`
pub type CoverageFilter = dyn Fn(&Mutation, u64, u64, f64) -> bool + Send + Sync;

/// The default relevance predicate for one copy-number solution.
/// Keeps reference markers and relevant mutations that pass both the magnitude filter (scaled by `MAX_CN`) and the copy-number filter.
pub fn default_filter<'a>(relevant: &'a BTreeSet<Mutation>, cn_solution: &'a CnSolution) -> impl Fn(&Mutation, u64, u64, f64) -> bool + 'a {
    move |mutation, count, total, threshold| {
        if !mutation.is_reference() && !relevant.contains(mutation) {
            return false;
        }
        Coverage::basic_filter(mutation, count, total, threshold / MAX_CN) &&
            Coverage::cn_filter(mutation, count, total, threshold, cn_solution)
    }
}

/// Produces the coverage snapshot one model is built from.
/// A `custom` filter replaces the default one entirely.
pub fn filter_coverage(
    coverage: &Coverage, relevant: &BTreeSet<Mutation>, major_solution: &MajorSolution,
    custom: Option<&CoverageFilter>
) -> Coverage {
    let filtered = match custom {
        Some(filter_fn) => coverage.filtered(filter_fn),
        None => coverage.filtered(default_filter(relevant, major_solution.cn_solution()))
    };
    debug!("Coverage filtered from {} to {} positions", coverage.positions().count(), filtered.positions().count());
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::data_types::coverage::CoverageRecord;
    use crate::data_types::gene::Gene;
    use crate::data_types::gene::tests::mock_gene_record;
    use crate::data_types::solved_allele::SolvedAllele;

    fn mock_inputs() -> (Coverage, MajorSolution) {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let cn = CnSolution::new(&gene, 0.0, vec!["1".to_string()]).unwrap();
        let major = MajorSolution::new(
            0.0, [(SolvedAllele::major_only("1"), 1)].into_iter().collect::<BTreeMap<_, _>>(), cn
        ).unwrap();
        let record: CoverageRecord = serde_json::from_str(r#"{
            "counts": {
                "150": {"C>T": 15, "_": 5},
                "160": {"G>A": 20},
                "250": {"A>G": 2, "_": 18}
            }
        }"#).unwrap();
        (Coverage::try_from(record).unwrap(), major)
    }

    #[test]
    fn test_default_filter() {
        let (coverage, major) = mock_inputs();
        let relevant: BTreeSet<Mutation> = ["150:C>T", "250:A>G"].iter().map(|m| m.parse().unwrap()).collect();
        let filtered = filter_coverage(&coverage, &relevant, &major, None);

        assert_eq!(filtered.get(&"150:C>T".parse().unwrap()), 15);
        assert_eq!(filtered.get(&Mutation::reference_at(150)), 5);
        // not relevant to any candidate
        assert_eq!(filtered.get(&"160:G>A".parse().unwrap()), 0);
        // relevant, but below half of a single copy
        assert_eq!(filtered.get(&"250:A>G".parse().unwrap()), 0);
        assert_eq!(filtered.get(&Mutation::reference_at(250)), 18);
    }

    #[test]
    fn test_custom_filter() {
        let (coverage, major) = mock_inputs();
        let keep_all: &CoverageFilter = &|_, _, _, _| true;
        let filtered = filter_coverage(&coverage, &BTreeSet::new(), &major, Some(keep_all));
        assert_eq!(filtered.get(&"160:G>A".parse().unwrap()), 20);
        assert_eq!(filtered.get(&"250:A>G".parse().unwrap()), 2);
    }
}
