
use coitrees::{COITree, Interval, IntervalTree};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::data_types::mutation::{Mutation, MutationError};

#[derive(thiserror::Error, Debug)]
pub enum GeneError {
    #[error("region {name:?} has an empty or inverted range [{start}, {end})")]
    InvalidRange { name: String, start: u64, end: u64 },
    #[error("region {name:?} does not fit into 32-bit coordinates")]
    CoordinateOverflow { name: String },
    #[error("duplicate region {region}")]
    DuplicateRegion { region: GeneRegion },
    #[error("copy-number configuration {config:?} references unknown region {region}")]
    UnknownRegion { config: String, region: GeneRegion },
    #[error("major allele {allele:?} references unknown copy-number configuration {config:?}")]
    UnknownCnConfig { allele: String, config: String },
    #[error("major allele {allele:?} has no minor alleles")]
    NoMinorAlleles { allele: String },
    #[error("error while parsing mutation for allele {allele:?}: {source}")]
    Mutation { allele: String, source: MutationError },
}

/// A named region of one gene in the locus (e.g., exon 9 of the pseudogene).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GeneRegion {
    /// Index of the gene in the locus, 0 is the main gene
    gene: usize,
    /// Region name, e.g. "e9" or "i1"
    name: String,
}

impl GeneRegion {
    /// Constructor
    pub fn new(gene: usize, name: impl Into<String>) -> Self {
        Self { gene, name: name.into() }
    }

    // getters
    pub fn gene(&self) -> usize {
        self.gene
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for GeneRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.gene, self.name)
    }
}

/// Interval lookup from a position to the gene region covering it.
#[derive(Clone)]
pub struct RegionIndex {
    /// All regions; COITree metadata indexes into this
    regions: Vec<(GeneRegion, u64, u64)>,
    /// 0-based inclusive intervals
    lookup_tree: COITree<usize, usize>,
}

impl fmt::Debug for RegionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // COITree does not have Debug, the region list carries the same information
        f.debug_struct("RegionIndex").field("regions", &self.regions).finish()
    }
}

impl RegionIndex {
    /// Builds the lookup from half-open `[start, end)` ranges.
    /// # Errors
    /// * if a range is empty or does not fit into i32 coordinates
    /// * if a region name is repeated
    pub fn new(regions: Vec<(GeneRegion, u64, u64)>) -> Result<Self, GeneError> {
        let mut seen: BTreeSet<&GeneRegion> = Default::default();
        let mut intervals: Vec<Interval<usize>> = Vec::with_capacity(regions.len());
        for (index, (region, start, end)) in regions.iter().enumerate() {
            if start >= end {
                return Err(GeneError::InvalidRange { name: region.to_string(), start: *start, end: *end });
            }
            if !seen.insert(region) {
                return Err(GeneError::DuplicateRegion { region: region.clone() });
            }
            let first = i32::try_from(*start)
                .map_err(|_| GeneError::CoordinateOverflow { name: region.to_string() })?;
            let last = i32::try_from(*end - 1)
                .map_err(|_| GeneError::CoordinateOverflow { name: region.to_string() })?;
            intervals.push(Interval::new(first, last, index));
        }

        let lookup_tree = COITree::new(&intervals);
        Ok(Self {
            regions,
            lookup_tree
        })
    }

    /// Returns the region covering `position`; if regions overlap, the first declared one wins
    pub fn region_at(&self, position: u64) -> Option<&GeneRegion> {
        let query = i32::try_from(position).ok()?;
        let mut best: Option<usize> = None;
        self.lookup_tree.query(query, query, |node| {
            let index: usize = node.metadata.clone();
            best = Some(best.map_or(index, |b| b.min(index)));
        });
        best.map(|index| &self.regions[index].0)
    }

    /// Iterates all regions in declaration order
    pub fn regions(&self) -> impl Iterator<Item = &GeneRegion> {
        self.regions.iter().map(|(r, _, _)| r)
    }
}

/// Structural configuration of one gene copy, e.g. a full copy, a deletion, or a fusion.
#[derive(Clone, Debug)]
pub struct CnConfig {
    /// Configuration name
    name: String,
    /// Copy number of each region in this configuration; regions not listed have copy number 0
    copy_numbers: BTreeMap<GeneRegion, u32>,
}

impl CnConfig {
    /// Constructor
    pub fn new(name: String, copy_numbers: BTreeMap<GeneRegion, u32>) -> Self {
        Self { name, copy_numbers }
    }

    /// Copy number of `region` in this configuration
    pub fn region_cn(&self, region: &GeneRegion) -> u32 {
        self.copy_numbers.get(region).copied().unwrap_or(0)
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn copy_numbers(&self) -> &BTreeMap<GeneRegion, u32> {
        &self.copy_numbers
    }
}

/// A minor allele: the major allele plus a neutral mutation signature
#[derive(Clone, Debug)]
pub struct MinorAllele {
    name: String,
    alt_names: Vec<String>,
    neutral_muts: BTreeSet<Mutation>,
}

impl MinorAllele {
    /// Constructor
    pub fn new(name: String, alt_names: Vec<String>, neutral_muts: BTreeSet<Mutation>) -> Self {
        Self { name, alt_names, neutral_muts }
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alt_names(&self) -> &[String] {
        &self.alt_names
    }

    pub fn neutral_muts(&self) -> &BTreeSet<Mutation> {
        &self.neutral_muts
    }
}

/// A major allele: functional mutations, a structural configuration, and the minor alleles refining it
#[derive(Clone, Debug)]
pub struct MajorAllele {
    name: String,
    cn_config: String,
    func_muts: BTreeSet<Mutation>,
    minors: BTreeMap<String, MinorAllele>,
}

impl MajorAllele {
    /// Constructor
    pub fn new(name: String, cn_config: String, func_muts: BTreeSet<Mutation>, minors: BTreeMap<String, MinorAllele>) -> Self {
        Self { name, cn_config, func_muts, minors }
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cn_config(&self) -> &str {
        &self.cn_config
    }

    pub fn func_muts(&self) -> &BTreeSet<Mutation> {
        &self.func_muts
    }

    pub fn minors(&self) -> &BTreeMap<String, MinorAllele> {
        &self.minors
    }
}

/// Reference catalog for one gene locus.
#[derive(Clone, Debug)]
pub struct Gene {
    /// Gene name, e.g. CYP2D6
    name: String,
    /// Shared with each CnSolution built from this gene
    regions: Arc<RegionIndex>,
    cn_configs: BTreeMap<String, CnConfig>,
    alleles: BTreeMap<String, MajorAllele>,
}

impl Gene {
    /// Constructor with cross-reference checks
    /// # Errors
    /// * if a CN configuration references an unknown region
    /// * if an allele references an unknown CN configuration or has no minor alleles
    pub fn new(
        name: String, regions: RegionIndex,
        cn_configs: BTreeMap<String, CnConfig>, alleles: BTreeMap<String, MajorAllele>
    ) -> Result<Self, GeneError> {
        let known: BTreeSet<&GeneRegion> = regions.regions().collect();
        for config in cn_configs.values() {
            if let Some(region) = config.copy_numbers().keys().find(|r| !known.contains(r)) {
                return Err(GeneError::UnknownRegion { config: config.name().to_string(), region: region.clone() });
            }
        }
        for allele in alleles.values() {
            if !cn_configs.contains_key(allele.cn_config()) {
                return Err(GeneError::UnknownCnConfig {
                    allele: allele.name().to_string(),
                    config: allele.cn_config().to_string()
                });
            }
            if allele.minors().is_empty() {
                return Err(GeneError::NoMinorAlleles { allele: allele.name().to_string() });
            }
        }

        Ok(Self {
            name,
            regions: Arc::new(regions),
            cn_configs,
            alleles
        })
    }

    /// Returns the region covering a position, if any
    pub fn region_at(&self, position: u64) -> Option<&GeneRegion> {
        self.regions.region_at(position)
    }

    /// Returns true if the region at `position` has a non-zero copy number in the configuration of `major`.
    /// Positions outside every known region are considered covered; unknown alleles are not.
    pub fn has_coverage(&self, major: &str, position: u64) -> bool {
        let Some(config) = self.alleles.get(major).and_then(|a| self.cn_configs.get(a.cn_config())) else {
            return false;
        };
        match self.region_at(position) {
            Some(region) => config.region_cn(region) > 0,
            None => true
        }
    }

    /// Looks up a major allele
    pub fn allele(&self, major: &str) -> Option<&MajorAllele> {
        self.alleles.get(major)
    }

    /// Looks up a copy-number configuration
    pub fn cn_config(&self, name: &str) -> Option<&CnConfig> {
        self.cn_configs.get(name)
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alleles(&self) -> &BTreeMap<String, MajorAllele> {
        &self.alleles
    }

    pub fn region_index(&self) -> &Arc<RegionIndex> {
        &self.regions
    }
}

/// Serialized region definition, half-open coordinates
#[derive(Clone, Debug, Deserialize)]
pub struct RegionRecord {
    #[serde(default)]
    pub gene: usize,
    pub name: String,
    pub start: u64,
    pub end: u64,
}

/// Serialized copy-number configuration; `cn` is indexed by gene, then region name
#[derive(Clone, Debug, Deserialize)]
pub struct CnConfigRecord {
    pub cn: Vec<BTreeMap<String, u32>>,
}

/// Serialized minor allele
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MinorAlleleRecord {
    #[serde(default)]
    pub alt_names: Vec<String>,
    #[serde(default)]
    pub neutral_muts: Vec<String>,
}

/// Serialized major allele
#[derive(Clone, Debug, Deserialize)]
pub struct MajorAlleleRecord {
    pub cn_config: String,
    #[serde(default)]
    pub func_muts: Vec<String>,
    pub minors: BTreeMap<String, MinorAlleleRecord>,
}

/// Serialized gene catalog, the JSON form of `Gene`
#[derive(Clone, Debug, Deserialize)]
pub struct GeneRecord {
    pub name: String,
    pub regions: Vec<RegionRecord>,
    pub cn_configs: BTreeMap<String, CnConfigRecord>,
    pub alleles: BTreeMap<String, MajorAlleleRecord>,
    /// Legacy names (e.g. dbSNP ids) keyed by `<position>:<op>`
    #[serde(default)]
    pub old_names: BTreeMap<String, String>,
}

impl TryFrom<GeneRecord> for Gene {
    type Error = GeneError;

    fn try_from(record: GeneRecord) -> Result<Self, Self::Error> {
        let regions = RegionIndex::new(
            record.regions.into_iter()
                .map(|r| (GeneRegion::new(r.gene, r.name), r.start, r.end))
                .collect()
        )?;

        let cn_configs: BTreeMap<String, CnConfig> = record.cn_configs.into_iter()
            .map(|(name, config)| {
                let copy_numbers = config.cn.into_iter().enumerate()
                    .flat_map(|(gene, by_region)| {
                        by_region.into_iter().map(move |(region, cn)| (GeneRegion::new(gene, region), cn))
                    })
                    .collect();
                (name.clone(), CnConfig::new(name, copy_numbers))
            })
            .collect();

        let old_names = record.old_names;
        let parse_all = |allele: &str, values: Vec<String>, functional: bool| -> Result<BTreeSet<Mutation>, GeneError> {
            values.iter()
                .map(|v| -> Result<Mutation, GeneError> {
                    let mutation = Mutation::parse(v, functional)
                        .map_err(|source| GeneError::Mutation { allele: allele.to_string(), source })?;
                    let old_name = old_names.get(&mutation.to_string()).cloned();
                    Ok(mutation.with_old_name(old_name))
                })
                .collect()
        };

        let mut alleles: BTreeMap<String, MajorAllele> = Default::default();
        for (name, major) in record.alleles.into_iter() {
            let func_muts = parse_all(&name, major.func_muts, true)?;
            let mut minors: BTreeMap<String, MinorAllele> = Default::default();
            for (minor_name, minor) in major.minors.into_iter() {
                let neutral_muts = parse_all(&minor_name, minor.neutral_muts, false)?;
                minors.insert(minor_name.clone(), MinorAllele::new(minor_name, minor.alt_names, neutral_muts));
            }
            alleles.insert(name.clone(), MajorAllele::new(name, major.cn_config, func_muts, minors));
        }

        Gene::new(record.name, regions, cn_configs, alleles)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two-region mock gene: *1 is a full copy, *5 deletes region e2, and *1 has two minor alleles
    pub(crate) fn mock_gene_record() -> GeneRecord {
        serde_json::from_str(r#"{
            "name": "MOCK",
            "regions": [
                {"name": "e1", "start": 100, "end": 200},
                {"name": "e2", "start": 200, "end": 300}
            ],
            "cn_configs": {
                "1": {"cn": [{"e1": 1, "e2": 1}]},
                "5": {"cn": [{"e1": 1, "e2": 0}]}
            },
            "alleles": {
                "1": {
                    "cn_config": "1",
                    "minors": {
                        "1.001": {"neutral_muts": ["150:C>T"]},
                        "1.002": {"neutral_muts": ["250:A>G"]}
                    }
                },
                "4": {
                    "cn_config": "1",
                    "func_muts": ["120:G>A"],
                    "minors": {
                        "4.001": {"alt_names": ["4A"], "neutral_muts": ["150:C>T"]}
                    }
                },
                "5": {
                    "cn_config": "5",
                    "minors": {
                        "5.001": {"neutral_muts": ["250:A>G"]}
                    }
                }
            }
        }"#).unwrap()
    }

    #[test]
    fn test_region_lookup() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        assert_eq!(gene.region_at(100), Some(&GeneRegion::new(0, "e1")));
        assert_eq!(gene.region_at(199), Some(&GeneRegion::new(0, "e1")));
        assert_eq!(gene.region_at(200), Some(&GeneRegion::new(0, "e2")));
        assert_eq!(gene.region_at(99), None);
        assert_eq!(gene.region_at(300), None);
    }

    #[test]
    fn test_has_coverage() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        assert!(gene.has_coverage("1", 150));
        assert!(gene.has_coverage("1", 250));
        assert!(gene.has_coverage("5", 150));
        assert!(!gene.has_coverage("5", 250));

        // outside of the known regions is always covered; unknown alleles never are
        assert!(gene.has_coverage("5", 1000));
        assert!(!gene.has_coverage("7", 150));
    }

    #[test]
    fn test_functional_flags() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let major = gene.allele("4").unwrap();
        assert!(major.func_muts().iter().all(|m| m.is_functional()));
        let minor = &major.minors()["4.001"];
        assert_eq!(minor.alt_names(), &["4A".to_string()]);
        assert!(minor.neutral_muts().iter().all(|m| !m.is_functional()));
    }

    #[test]
    fn test_old_names() {
        let mut record = mock_gene_record();
        record.old_names.insert("120:G>A".to_string(), "rs3892097".to_string());
        let gene = Gene::try_from(record).unwrap();
        let functional = gene.allele("4").unwrap().func_muts().iter().next().unwrap();
        assert_eq!(functional.old_name(), Some("rs3892097"));
        let neutral = gene.allele("1").unwrap().minors()["1.001"].neutral_muts().iter().next().unwrap();
        assert_eq!(neutral.old_name(), None);
    }

    #[test]
    fn test_validation_errors() {
        let mut record = mock_gene_record();
        record.alleles.get_mut("1").unwrap().cn_config = "missing".to_string();
        assert!(matches!(Gene::try_from(record), Err(GeneError::UnknownCnConfig { .. })));

        let mut record = mock_gene_record();
        record.cn_configs.get_mut("5").unwrap().cn[0].insert("e3".to_string(), 1);
        assert!(matches!(Gene::try_from(record), Err(GeneError::UnknownRegion { .. })));

        let mut record = mock_gene_record();
        record.regions[1].end = 200;
        assert!(matches!(Gene::try_from(record), Err(GeneError::InvalidRange { .. })));

        let mut record = mock_gene_record();
        record.alleles.get_mut("4").unwrap().func_muts = vec!["oops".to_string()];
        assert!(matches!(Gene::try_from(record), Err(GeneError::Mutation { .. })));
    }
}
