
/*!
# Minor allele model
Encodes the refinement of one major solution as a mixed-integer program.

Every candidate instance gets a presence variable `A`, every defining mutation of an instance a "present" variable,
and every other relevant mutation (where the instance's major allele has coverage) an "added" variable.
Free error variables absorb the difference between the modeled and observed coverage fractions.
The objective is `sum(|E|) + miss * sum(A * (1 - P)) + add * sum(M)`.
*/

use itertools::Itertools;
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};

use crate::candidates::{Candidate, CandidateId};
use crate::data_types::coverage::Coverage;
use crate::data_types::gene::Gene;
use crate::data_types::major_solution::MajorSolution;
use crate::data_types::model_audit::{CnBound, ModelAudit, ObservedFraction};
use crate::data_types::mutation::Mutation;
use crate::data_types::solved_allele::SolvedAllele;
use crate::milp::backend::Solution;
use crate::milp::expression::{Expr, VarId};
use crate::milp::model::{Model, Sense};
use crate::minor_solver::MinorConfig;
use crate::util::allele_names::allele_sort_key;

/// Extra objective weight on the coverage error; never part of the reported score
pub const TIE_BREAK_WEIGHT: f64 = 1e-4;

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("unknown major allele {allele:?}")]
    UnknownAllele { allele: String },
    #[error("major key {key} has {count} copies but no candidate instances")]
    NoCandidates { key: SolvedAllele, count: u32 },
    #[error("candidate {candidate} defines {count} non-insertion mutations at position {position}")]
    MultipleMutationsAtLocus { candidate: String, position: u64, count: usize },
    #[error("copy-number bound [{lower}, {upper}] for {mutation} is outside of [0, {position_cn}]")]
    CopyNumberBoundOutOfRange { mutation: Mutation, lower: f64, upper: f64, position_cn: f64 },
    #[error("failed to build a thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A fully encoded refinement problem for one major solution
#[derive(Debug)]
pub struct MinorModel {
    model: Model,
    candidates: Vec<Candidate>,
    /// `A`, parallel to `candidates`
    presence: Vec<VarId>,
    /// `P`, defining mutation -> variable, parallel to `candidates`
    present: Vec<BTreeMap<Mutation, VarId>>,
    /// `M`, non-defining mutation -> variable, parallel to `candidates`
    added: Vec<BTreeMap<Mutation, VarId>>,
    /// `E`, one per relevant mutation and one per reference marker
    errors: BTreeMap<Mutation, VarId>,
    error_sum: Expr,
    miss_penalty: Expr,
    add_penalty: Expr,
    audit: ModelAudit,
}

impl MinorModel {
    /// Builds all variables and constraints.
    /// # Arguments
    /// * `gene` - the gene catalog
    /// * `candidates` - candidate instances for `major_solution`
    /// * `coverage` - the filtered coverage snapshot
    /// * `major_solution` - the major solution being refined
    /// * `relevant` - all mutations considered across every major solution
    /// * `config` - penalty weights and copy-number bound enforcement
    /// # Errors
    /// * if a candidate defines more than one non-insertion mutation at a position
    /// * if a copy-number bound falls outside of `[0, CN]`
    /// * if a major key has copies but no candidates
    pub fn encode(
        gene: &Gene, candidates: Vec<Candidate>, coverage: &Coverage, major_solution: &MajorSolution,
        relevant: &BTreeSet<Mutation>, config: &MinorConfig
    ) -> Result<Self, ModelError> {
        let cn_solution = major_solution.cn_solution();
        let mut model = Model::new(format!("refine_{}", gene.name()));
        let mut audit = ModelAudit {
            cn_solution: cn_solution.configs().to_vec(),
            major: major_solution.solution().iter().map(|(k, &c)| (k.clone(), c)).collect(),
            ..Default::default()
        };

        debug!("Refining {major_solution}");
        debug!("Possible candidates:");
        for candidate in candidates.iter()
            .filter(|c| c.id().copy() == 0)
            .sorted_by_key(|c| allele_sort_key(c.id().base().display_name())) {
            let cn_config = gene.allele(candidate.major()).map(|a| a.cn_config()).unwrap_or("?");
            debug!("  {} (cn=*{cn_config})", candidate.id().base());
            for m in candidate.mutations().iter() {
                let single_copy = coverage.single_copy(m.position(), cn_solution);
                let region = gene.region_at(m.position()).map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
                debug!(
                    "    {:26} {:.2} ({:4} / {} * {:.1}) {region} {}",
                    m.to_string(), coverage.get(m) as f64 / single_copy, coverage.get(m),
                    cn_solution.position_cn(m.position()), single_copy, m.old_name().unwrap_or("")
                );
            }
        }

        let var_suffix = |id: &CandidateId| format!("{}_{}", id.base().display_name(), id.copy());

        // presence and copy ordering
        let presence: Vec<VarId> = candidates.iter()
            .map(|c| model.add_binary(format!("A_{}", var_suffix(c.id()))))
            .collect();
        let index: BTreeMap<&CandidateId, usize> = candidates.iter().enumerate()
            .map(|(i, c)| (c.id(), i))
            .collect();
        for (i, candidate) in candidates.iter().enumerate() {
            if candidate.id().copy() == 0 {
                continue;
            }
            let previous = CandidateId::new(candidate.id().base().clone(), candidate.id().copy() - 1);
            if let Some(&j) = index.get(&previous) {
                model.add_constraint(presence[i], Sense::Leq, presence[j]);
            }
        }

        // copies of each major key are fixed by the major solution
        for (key, &count) in major_solution.solution().iter() {
            let instances: Vec<VarId> = candidates.iter().zip(presence.iter())
                .filter(|(c, _)| &c.id().base().major_key() == key)
                .map(|(_, &v)| v)
                .collect();
            if instances.is_empty() {
                if count > 0 {
                    return Err(ModelError::NoCandidates { key: key.clone(), count });
                }
                continue;
            }
            let expr = Model::quicksum(instances);
            trace!("LP constraint: {expr} == {count} for {key}");
            model.add_constraint(expr, Sense::Eq, count as f64);
        }

        let present: Vec<BTreeMap<Mutation, VarId>> = candidates.iter()
            .map(|c| {
                c.mutations().iter()
                    .map(|m| (m.clone(), model.add_binary(format!("P_{}_{}", m.label(), var_suffix(c.id())))))
                    .collect()
            })
            .collect();
        let added: Vec<BTreeMap<Mutation, VarId>> = candidates.iter()
            .map(|c| {
                relevant.iter()
                    .filter(|m| gene.has_coverage(c.major(), m.position()) && !c.defines(m))
                    .map(|m| (m.clone(), model.add_binary(format!("M_{}_{}", m.label(), var_suffix(c.id())))))
                    .collect()
            })
            .collect();

        // coverage consistency for every relevant mutation
        let mut errors: BTreeMap<Mutation, VarId> = Default::default();
        for m in relevant.iter() {
            let error = model.add_free(format!("E_{}", m.label()));
            let mut expr = Expr::default();
            for (i, a) in presence.iter().enumerate() {
                if let Some(&p) = present[i].get(m) {
                    expr += Expr::var(p) * *a;
                } else if let Some(&v) = added[i].get(m) {
                    expr += Expr::var(v) * *a;
                }
            }
            let observed = Self::observe(coverage, major_solution, m);
            trace!("LP constraint: {expr} + E == {:.3} for {m}", observed.fraction);
            model.add_constraint(expr + error, Sense::Eq, observed.fraction);
            errors.insert(m.clone(), error);
            audit.observed.push(observed);
        }

        // reference state, as the product of "not present" indicators of each covering instance
        let positions: BTreeSet<u64> = relevant.iter().map(|m| m.position()).collect();
        for &position in positions.iter() {
            let marker = Mutation::reference_at(position);
            let error = model.add_free(format!("E_{position}_REF"));
            let mut expr = Expr::default();
            for (i, candidate) in candidates.iter().enumerate() {
                if !gene.has_coverage(candidate.major(), position) {
                    continue;
                }
                // insertions always leave the reference base in place
                let defining: Vec<&Mutation> = candidate.mutations().iter()
                    .filter(|m| m.position() == position && !m.is_insertion())
                    .collect();
                let absent = match defining.len() {
                    0 => added[i].iter()
                        .filter(|(m, _)| m.position() == position && !m.is_insertion())
                        .fold(Expr::constant(1.0), |acc, (_, &v)| acc * Expr::complement(v)),
                    1 => Expr::complement(present[i][defining[0]]),
                    count => {
                        return Err(ModelError::MultipleMutationsAtLocus {
                            candidate: candidate.id().to_string(), position, count
                        });
                    }
                };
                expr += absent * presence[i];
            }
            let observed = Self::observe(coverage, major_solution, &marker);
            trace!("LP constraint: {expr} + E == {:.3} for {marker}", observed.fraction);
            model.add_constraint(expr + error, Sense::Eq, observed.fraction);
            errors.entry(marker).or_insert(error);
            audit.observed.push(observed);
        }

        // instances that are not selected carry no mutations
        for (i, &a) in presence.iter().enumerate() {
            for (m, &p) in present[i].iter() {
                trace!("LP constraint: {p} <= {a} for P[{}, {m}]", candidates[i].id());
                model.add_constraint(p, Sense::Leq, a);
            }
            for (m, &v) in added[i].iter() {
                trace!("LP constraint: {v} <= {a} for M[{}, {m}]", candidates[i].id());
                model.add_constraint(v, Sense::Leq, a);
            }
        }

        // 1) a minor allele expresses all of its functional mutations or none
        for (i, &a) in presence.iter().enumerate() {
            let functional: Vec<VarId> = present[i].iter()
                .filter(|(m, _)| m.is_functional())
                .map(|(_, &p)| p)
                .collect();
            if functional.is_empty() {
                continue;
            }
            let expected = Expr::var(a) * functional.len() as f64;
            let expr = Model::quicksum(functional);
            trace!("LP constraint 1: {expr} == {expected} for {}", candidates[i].id());
            model.add_constraint(expr, Sense::Eq, expected);
        }

        // 2) nothing is present in a region deleted for this allele
        for (i, candidate) in candidates.iter().enumerate() {
            for (m, &p) in present[i].iter() {
                if !gene.has_coverage(candidate.major(), m.position()) {
                    trace!("LP constraint 2: {p} <= 0 for {m} in {}", candidate.id());
                    model.add_constraint(p, Sense::Leq, 0.0);
                }
            }
        }

        // 3) functional mutations only come from the major solution
        for m in relevant.iter().filter(|m| m.is_functional()) {
            let additions: Vec<VarId> = added.iter()
                .filter_map(|by_mutation| by_mutation.get(m).copied())
                .collect();
            if additions.is_empty() {
                continue;
            }
            let expr = Model::quicksum(additions);
            trace!("LP constraint 3: {expr} <= 0 for {m}");
            model.add_constraint(expr, Sense::Leq, 0.0);
        }

        // 4) the copy number at each locus
        for m in relevant.iter() {
            let covering: Vec<VarId> = candidates.iter().zip(presence.iter())
                .filter(|(c, _)| gene.has_coverage(c.major(), m.position()))
                .map(|(_, &a)| a)
                .collect();
            let position_cn = cn_solution.position_cn(m.position());
            let expr = Model::quicksum(covering);
            trace!("LP constraint 4: {position_cn} == {expr} for {m}");
            if config.enforce_cn_bounds() && !expr.is_constant() {
                model.add_constraint(expr.clone(), Sense::Geq, position_cn.floor());
                model.add_constraint(expr, Sense::Leq, position_cn.ceil());
            }
        }

        // 5) the copy number of each mutation
        for m in relevant.iter() {
            let bound = Self::cn_bound(coverage, major_solution, m)?;
            let mut expr = Expr::default();
            for (i, &a) in presence.iter().enumerate() {
                if let Some(&v) = present[i].get(m).or_else(|| added[i].get(m)) {
                    expr += Expr::var(v) * a;
                }
            }
            trace!("LP constraint 5: {} <= {expr} <= {} for {m}", bound.lower, bound.upper);
            if config.enforce_cn_bounds() && !expr.is_constant() {
                model.add_constraint(expr.clone(), Sense::Geq, bound.lower);
                model.add_constraint(expr, Sense::Leq, bound.upper);
            }
            audit.cn_bounds.push(bound);
        }

        // objective parts
        let error_sum = model.abssum(errors.values().copied());
        let miss_penalty = presence.iter().enumerate()
            .flat_map(|(i, &a)| present[i].values().map(move |&p| Expr::complement(p) * a))
            .sum::<Expr>() * config.miss_penalty();
        let add_penalty = Model::quicksum(added.iter().flat_map(|by_mutation| by_mutation.values().copied()))
            * config.add_penalty();

        audit.num_variables = model.num_variables();
        audit.num_constraints = model.num_constraints();
        debug!(
            "Model {}: {} instances, {} variables, {} constraints",
            model.name(), candidates.len(), model.num_variables(), model.num_constraints()
        );

        Ok(Self {
            model,
            candidates,
            presence,
            present,
            added,
            errors,
            error_sum,
            miss_penalty,
            add_penalty,
            audit
        })
    }

    /// Observed coverage fraction of `mutation` relative to a single copy
    fn observe(coverage: &Coverage, major_solution: &MajorSolution, mutation: &Mutation) -> ObservedFraction {
        let count = coverage.get(mutation);
        let single_copy = coverage.single_copy(mutation.position(), major_solution.cn_solution());
        ObservedFraction {
            mutation: mutation.clone(),
            count,
            fraction: count as f64 / single_copy
        }
    }

    /// Copy-number range of the total expression of `mutation`: floor and ceiling of the expressed share, at least 1 if observed at all
    fn cn_bound(coverage: &Coverage, major_solution: &MajorSolution, mutation: &Mutation) -> Result<CnBound, ModelError> {
        let position_cn = major_solution.cn_solution().position_cn(mutation.position());
        let expressed = (coverage.percentage(mutation) / 100.0 * position_cn).floor();
        let (lower, upper) = if position_cn == 0.0 {
            (0.0, 0.0)
        } else if coverage.get(mutation) > 0 && expressed == 0.0 {
            (1.0, 1.0)
        } else {
            (expressed, (expressed + 1.0).min(position_cn))
        };

        if lower < 0.0 || upper > position_cn {
            return Err(ModelError::CopyNumberBoundOutOfRange {
                mutation: mutation.clone(), lower, upper, position_cn
            });
        }
        Ok(CnBound { mutation: mutation.clone(), position_cn, lower, upper })
    }

    /// Returns the objective to minimize.
    /// If the backend cannot take binary products in the objective, the miss penalty is moved into `penalty <= w` and `w` is minimized instead.
    /// Both forms carry a small extra weight on the coverage error, so equal scores resolve towards the reads.
    pub fn objective(&mut self, supports_nonlinear_objective: bool) -> Expr {
        let tie_break = self.error_sum.clone() * TIE_BREAK_WEIGHT;
        if supports_nonlinear_objective || self.miss_penalty.is_linear() {
            return self.score_expr() + tie_break;
        }
        let w = self.model.add_continuous("W", 0.0, f64::INFINITY);
        self.model.add_constraint(self.miss_penalty.clone(), Sense::Leq, w);
        self.audit.num_variables = self.model.num_variables();
        self.audit.num_constraints = self.model.num_constraints();
        self.error_sum.clone() + self.add_penalty.clone() + w + tie_break
    }

    /// The full penalized error, independent of how the objective was encoded
    pub fn score_expr(&self) -> Expr {
        self.error_sum.clone() + self.miss_penalty.clone() + self.add_penalty.clone()
    }

    /// Converts solved variable values into one allele per selected instance
    pub fn reconstruct(&self, solution: &Solution) -> Vec<SolvedAllele> {
        self.candidates.iter().enumerate()
            .filter(|&(i, _)| solution.is_set(self.presence[i]))
            .map(|(i, candidate)| {
                let base = candidate.id().base();
                let missing: Vec<Mutation> = self.present[i].iter()
                    .filter(|&(_, &p)| !solution.is_set(p))
                    .map(|(m, _)| m.clone())
                    .collect();
                let mut added = base.added().to_vec();
                added.extend(
                    self.added[i].iter()
                        .filter(|&(_, &v)| solution.is_set(v))
                        .map(|(m, _)| m.clone())
                );
                SolvedAllele::new(base.major().to_string(), base.minor().map(|s| s.to_string()), added, missing)
            })
            .collect()
    }

    /// Error variable of a relevant mutation or reference marker
    pub fn error_var(&self, mutation: &Mutation) -> Option<VarId> {
        self.errors.get(mutation).copied()
    }

    // getters
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn presence(&self) -> &[VarId] {
        &self.presence
    }

    pub fn audit(&self) -> &ModelAudit {
        &self.audit
    }

    pub fn into_audit(self) -> ModelAudit {
        self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::CandidateSpace;
    use crate::data_types::cn_solution::CnSolution;
    use crate::data_types::coverage::CoverageRecord;
    use crate::data_types::gene::tests::mock_gene_record;
    use crate::data_types::gene::GeneRecord;

    fn encode(gene: &Gene, counts: &str, configs: &[&str], alleles: &[(&str, u32)], config: &MinorConfig) -> Result<MinorModel, ModelError> {
        let cn = CnSolution::new(gene, 0.0, configs.iter().map(|c| c.to_string()).collect()).unwrap();
        let major = MajorSolution::new(
            0.0, alleles.iter().map(|&(a, c)| (SolvedAllele::major_only(a), c)).collect(), cn
        ).unwrap();
        let record: CoverageRecord = serde_json::from_str(&format!(r#"{{"counts": {counts}}}"#)).unwrap();
        let coverage = Coverage::try_from(record).unwrap();
        let space = CandidateSpace::new(gene, std::slice::from_ref(&major))?;
        let candidates = space.instantiate(&major);
        MinorModel::encode(gene, candidates, &coverage, &major, space.mutations(), config)
    }

    #[test]
    fn test_variables() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let config = MinorConfig::default();
        let model = encode(&gene, r#"{"150": {"C>T": 10}}"#, &["1", "5"], &[("1", 1), ("5", 1)], &config).unwrap();

        // 1.001, 1.002, 5.001
        assert_eq!(model.candidates().len(), 3);
        let names: Vec<&str> = model.model().variables().iter().map(|v| v.name()).collect();
        assert!(names.contains(&"A_1.001_0"));
        assert!(names.contains(&"P_150_CT_1.001_0"));
        assert!(names.contains(&"M_250_AG_1.001_0"));
        // *5 has e2 deleted, so it can never pick up 250:A>G
        assert!(names.contains(&"M_150_CT_5.001_0"));
        assert!(!names.contains(&"M_250_AG_5.001_0"));
        assert!(names.contains(&"E_150_REF"));
        assert!(model.error_var(&Mutation::reference_at(250)).is_some());
        assert!(model.error_var(&"150:C>T".parse().unwrap()).is_some());

        // the fractions are relative to a single copy: 10 reads over 2 copies of e1
        let observed = model.audit().observed.iter()
            .find(|o| o.mutation == "150:C>T".parse().unwrap())
            .unwrap();
        assert_eq!(observed.count, 10);
        assert_eq!(observed.fraction, 2.0);
    }

    #[test]
    fn test_multiple_mutations_at_locus() {
        let mut record: GeneRecord = mock_gene_record();
        record.alleles.get_mut("1").unwrap().minors.get_mut("1.001").unwrap()
            .neutral_muts.push("150:C>G".to_string());
        let gene = Gene::try_from(record).unwrap();
        let config = MinorConfig::default();
        let result = encode(&gene, "{}", &["1"], &[("1", 1)], &config);
        assert!(matches!(result, Err(ModelError::MultipleMutationsAtLocus { position: 150, count: 2, .. })));

        // insertions do not count towards the reference state
        let mut record: GeneRecord = mock_gene_record();
        record.alleles.get_mut("1").unwrap().minors.get_mut("1.001").unwrap()
            .neutral_muts.push("150:insAA".to_string());
        let gene = Gene::try_from(record).unwrap();
        assert!(encode(&gene, "{}", &["1"], &[("1", 1)], &config).is_ok());
    }

    #[test]
    fn test_cn_bounds() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let config = MinorConfig::default();
        let model = encode(
            &gene, r#"{"150": {"C>T": 1, "_": 19}, "250": {"A>G": 10, "_": 10}}"#,
            &["1", "1"], &[("1", 2)], &config
        ).unwrap();
        let bounds: BTreeMap<Mutation, (f64, f64)> = model.audit().cn_bounds.iter()
            .map(|b| (b.mutation.clone(), (b.lower, b.upper)))
            .collect();
        // 5% of two copies rounds down to 0, but anything observed needs at least one
        assert_eq!(bounds[&"150:C>T".parse().unwrap()], (1.0, 1.0));
        assert_eq!(bounds[&"250:A>G".parse().unwrap()], (1.0, 2.0));
    }

    #[test]
    fn test_epigraph_objective() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let config = MinorConfig::default();
        let mut model = encode(&gene, "{}", &["1"], &[("1", 1)], &config).unwrap();
        let before = model.model().num_variables();
        let objective = model.objective(false);
        assert!(objective.is_linear());
        assert_eq!(model.model().num_variables(), before + 1);
        assert_eq!(model.model().variables().last().map(|v| v.name()), Some("W"));
        assert!(!model.score_expr().is_linear());

        let mut model = encode(&gene, "{}", &["1"], &[("1", 1)], &config).unwrap();
        let objective = model.objective(true);
        assert!(!objective.is_linear());
        assert_eq!(model.model().num_variables(), before);
    }
}
