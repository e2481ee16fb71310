
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::data_types::cn_solution::CnSolution;
use crate::data_types::mutation::{Mutation, MutationError, Operation};

/// Default fraction of a single copy's coverage a mutation needs to be kept
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Read support for every observed operation at every position of a sample.
/// Immutable; filtering always produces a new snapshot.
#[derive(Clone, Debug, Default)]
pub struct Coverage {
    /// position -> operation -> read count
    coverage: BTreeMap<u64, BTreeMap<Operation, u64>>,
    /// Fraction used by the built-in filters
    threshold: f64,
}

impl Coverage {
    /// Constructor
    pub fn new(coverage: BTreeMap<u64, BTreeMap<Operation, u64>>, threshold: f64) -> Self {
        Self { coverage, threshold }
    }

    /// Read count supporting a mutation, 0 if never observed
    pub fn get(&self, mutation: &Mutation) -> u64 {
        self.coverage.get(&mutation.position())
            .and_then(|ops| ops.get(mutation.op()))
            .copied()
            .unwrap_or(0)
    }

    /// Total read count over all operations at a position
    pub fn total(&self, position: u64) -> u64 {
        self.coverage.get(&position)
            .map(|ops| ops.values().sum())
            .unwrap_or(0)
    }

    /// Share of the reads at the mutation locus that support it, in [0, 100]
    pub fn percentage(&self, mutation: &Mutation) -> f64 {
        let total = self.total(mutation.position());
        if total == 0 {
            0.0
        } else {
            100.0 * self.get(mutation) as f64 / total as f64
        }
    }

    /// Expected coverage of one gene copy at a position under a copy-number solution.
    /// Positions without copy number are treated as a single copy.
    pub fn single_copy(&self, position: u64, cn_solution: &CnSolution) -> f64 {
        let total = self.total(position).max(1) as f64;
        let cn = cn_solution.position_cn(position);
        if cn > 0.0 {
            total / cn
        } else {
            total
        }
    }

    /// Returns a new snapshot containing only the entries accepted by `filter_fn`.
    /// The filter receives `(mutation, count, total count at the locus, threshold)`; totals are computed before filtering.
    pub fn filtered<F>(&self, filter_fn: F) -> Coverage
    where
        F: Fn(&Mutation, u64, u64, f64) -> bool
    {
        let coverage = self.coverage.iter()
            .filter_map(|(&position, ops)| {
                let total = self.total(position);
                let kept: BTreeMap<Operation, u64> = ops.iter()
                    .filter(|&(op, &count)| {
                        let mutation = Mutation::new(position, op.clone(), false);
                        filter_fn(&mutation, count, total, self.threshold)
                    })
                    .map(|(op, &count)| (op.clone(), count))
                    .collect();
                if kept.is_empty() { None } else { Some((position, kept)) }
            })
            .collect();

        Coverage {
            coverage,
            threshold: self.threshold
        }
    }

    /// Keeps mutations with at least `max(1, total * threshold)` reads
    pub fn basic_filter(_mutation: &Mutation, count: u64, total: u64, threshold: f64) -> bool {
        count as f64 >= (total as f64 * threshold).max(1.0)
    }

    /// Keeps reference markers, and mutations above `threshold` of a single copy's share of the locus
    pub fn cn_filter(mutation: &Mutation, count: u64, total: u64, threshold: f64, cn_solution: &CnSolution) -> bool {
        if mutation.is_reference() {
            return true;
        }
        let cn = cn_solution.position_cn(mutation.position());
        let single = if cn > 0.0 { total as f64 / cn } else { total as f64 };
        count as f64 > threshold * single
    }

    /// All positions with any coverage
    pub fn positions(&self) -> impl Iterator<Item = u64> + '_ {
        self.coverage.keys().copied()
    }

    // getters
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// Serialized coverage: `{"threshold": 0.5, "counts": {"100": {"C>T": 12, "_": 10}}}`
#[derive(Clone, Debug, Deserialize)]
pub struct CoverageRecord {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    pub counts: BTreeMap<u64, BTreeMap<String, u64>>,
}

impl TryFrom<CoverageRecord> for Coverage {
    type Error = MutationError;

    fn try_from(record: CoverageRecord) -> Result<Self, Self::Error> {
        let coverage = record.counts.into_iter()
            .map(|(position, ops)| {
                let ops = ops.into_iter()
                    .map(|(op, count)| Ok((op.parse::<Operation>()?, count)))
                    .collect::<Result<BTreeMap<Operation, u64>, MutationError>>()?;
                Ok((position, ops))
            })
            .collect::<Result<_, MutationError>>()?;
        Ok(Coverage::new(coverage, record.threshold))
    }
}
