
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::data_types::gene::{Gene, GeneRegion, RegionIndex};

/// Upper bound on the copy number of a gene, used to scale coverage thresholds
pub const MAX_CN: f64 = 20.0;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CnSolutionError {
    #[error("unknown copy-number configuration {config:?}")]
    UnknownConfig { config: String },
}

/// Upstream copy-number call: one structural configuration per gene copy.
#[derive(Clone, Debug, Serialize)]
pub struct CnSolution {
    /// Score assigned by the copy-number stage
    score: f64,
    /// One configuration name per gene copy, sorted
    configs: Vec<String>,
    /// Summed copy number of each region across all copies
    #[serde(skip)]
    region_cn: BTreeMap<GeneRegion, f64>,
    #[serde(skip)]
    regions: Arc<RegionIndex>,
}

impl CnSolution {
    /// Builds the per-region copy numbers from a list of configuration names.
    /// # Arguments
    /// * `gene` - the gene providing configurations and regions
    /// * `score` - the copy-number stage score
    /// * `configs` - one configuration name per copy
    /// # Errors
    /// * if a configuration is not defined in the gene
    pub fn new(gene: &Gene, score: f64, mut configs: Vec<String>) -> Result<Self, CnSolutionError> {
        configs.sort();
        let mut region_cn: BTreeMap<GeneRegion, f64> = gene.region_index().regions()
            .map(|r| (r.clone(), 0.0))
            .collect();
        for name in configs.iter() {
            let config = gene.cn_config(name)
                .ok_or_else(|| CnSolutionError::UnknownConfig { config: name.clone() })?;
            for (region, &cn) in config.copy_numbers().iter() {
                *region_cn.entry(region.clone()).or_default() += cn as f64;
            }
        }

        Ok(Self {
            score,
            configs,
            region_cn,
            regions: gene.region_index().clone()
        })
    }

    /// Total copy number at a position; 0 outside of the known regions
    pub fn position_cn(&self, position: u64) -> f64 {
        self.regions.region_at(position)
            .and_then(|region| self.region_cn.get(region))
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of gene copies in this solution
    pub fn total_copies(&self) -> usize {
        self.configs.len()
    }

    // getters
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn configs(&self) -> &[String] {
        &self.configs
    }

    pub fn region_cn(&self) -> &BTreeMap<GeneRegion, f64> {
        &self.region_cn
    }
}

impl fmt::Display for CnSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.configs.iter()
            .dedup_with_count()
            .map(|(count, name)| format!("{count}x*{name}"))
            .join(", ");
        write!(f, "CNSol[{:.2}; sol=({counts})]", self.score)
    }
}
