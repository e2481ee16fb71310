
use serde::Serialize;
use std::fmt;

use crate::data_types::mutation::Mutation;

/// An allele as reported by a solver, with its deviations from the catalog definition.
/// With `minor == None` this is a major-level key; otherwise a fully resolved minor allele.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct SolvedAllele {
    /// Major allele name
    major: String,
    /// Minor allele name, if resolved
    minor: Option<String>,
    /// Mutations present in the sample but not in the allele definition
    added: Vec<Mutation>,
    /// Defining mutations that are absent in the sample
    missing: Vec<Mutation>,
}

impl SolvedAllele {
    /// General constructor
    pub fn new(major: String, minor: Option<String>, added: Vec<Mutation>, missing: Vec<Mutation>) -> Self {
        Self { major, minor, added, missing }
    }

    /// Major-level key without modifications
    pub fn major_only(major: impl Into<String>) -> Self {
        Self::new(major.into(), None, vec![], vec![])
    }

    /// The major-level key this allele refines: same major and added mutations, no minor and no missing mutations
    pub fn major_key(&self) -> SolvedAllele {
        SolvedAllele::new(self.major.clone(), None, self.added.clone(), vec![])
    }

    /// Returns true if the allele matches its catalog definition exactly
    pub fn is_unmodified(&self) -> bool {
        self.added.is_empty() && self.missing.is_empty()
    }

    /// The most specific name available, minor if resolved
    pub fn display_name(&self) -> &str {
        self.minor.as_deref().unwrap_or(&self.major)
    }

    // getters
    pub fn major(&self) -> &str {
        &self.major
    }

    pub fn minor(&self) -> Option<&str> {
        self.minor.as_deref()
    }

    pub fn added(&self) -> &[Mutation] {
        &self.added
    }

    pub fn missing(&self) -> &[Mutation] {
        &self.missing
    }
}

impl fmt::Display for SolvedAllele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*{}", self.display_name())?;
        for m in self.added.iter() {
            write!(f, " +{m}")?;
        }
        for m in self.missing.iter() {
            write!(f, " -{m}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let added: Mutation = "250:A>G".parse().unwrap();
        let missing: Mutation = "150:C>T".parse().unwrap();
        let allele = SolvedAllele::new("1".to_string(), Some("1.001".to_string()), vec![added], vec![missing]);
        assert_eq!(allele.to_string(), "*1.001 +250:A>G -150:C>T");
        assert!(!allele.is_unmodified());
        assert_eq!(SolvedAllele::major_only("4").to_string(), "*4");
    }

    #[test]
    fn test_major_key() {
        let added: Mutation = "250:A>G".parse().unwrap();
        let missing: Mutation = "150:C>T".parse().unwrap();
        let allele = SolvedAllele::new("1".to_string(), Some("1.001".to_string()), vec![added.clone()], vec![missing]);
        let key = allele.major_key();
        assert_eq!(key, SolvedAllele::new("1".to_string(), None, vec![added], vec![]));
        assert_eq!(key.display_name(), "1");
    }
}
