
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MutationError {
    #[error("mutation must be formatted as \"<position>:<operation>\", found {value:?}")]
    MissingSeparator { value: String },
    #[error("invalid mutation position {value:?}")]
    InvalidPosition { value: String },
    #[error("unrecognized mutation operation {value:?}")]
    InvalidOperation { value: String },
    #[error("{op} requires a non-empty sequence")]
    EmptySequence { op: &'static str },
}

/// The change a mutation describes at its position.
/// Derived ordering is used for deterministic model construction, so do not re-order the variants.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Operation {
    /// Matches the reference genome, written `_`
    Reference,
    /// Single base change, written `C>T`
    Substitution { reference: char, alternate: char },
    /// Inserted sequence, written `insACG`
    Insertion(String),
    /// Deleted sequence, written `delACG`
    Deletion(String),
}

impl Operation {
    /// Returns true for insertions, which never displace the reference base at their locus
    pub fn is_insertion(&self) -> bool {
        matches!(self, Operation::Insertion(_))
    }

    /// Returns true for the reference marker
    pub fn is_reference(&self) -> bool {
        matches!(self, Operation::Reference)
    }

    /// Short label without punctuation, suitable for solver variable names
    pub fn label(&self) -> String {
        match self {
            Operation::Reference => "REF".to_string(),
            Operation::Substitution { reference, alternate } => format!("{reference}{alternate}"),
            Operation::Insertion(seq) => format!("INS{seq}"),
            Operation::Deletion(seq) => format!("DEL{seq}"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Reference => write!(f, "_"),
            Operation::Substitution { reference, alternate } => write!(f, "{reference}>{alternate}"),
            Operation::Insertion(seq) => write!(f, "ins{seq}"),
            Operation::Deletion(seq) => write!(f, "del{seq}"),
        }
    }
}

impl FromStr for Operation {
    type Err = MutationError;

    /// Accepts `_`, `C>T`, `insACG` / `INS.acg` and `delACG` / `DEL.acg`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MutationError::InvalidOperation { value: s.to_string() };
        if s == "_" {
            return Ok(Operation::Reference);
        }

        let lowered = s.to_ascii_lowercase();
        for (prefix, is_insertion) in [("ins", true), ("del", false)] {
            if let Some(rest) = lowered.strip_prefix(prefix) {
                let seq = rest.trim_start_matches('.').to_ascii_uppercase();
                if seq.is_empty() {
                    return Err(MutationError::EmptySequence { op: prefix });
                }
                if !seq.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(invalid());
                }
                return Ok(if is_insertion { Operation::Insertion(seq) } else { Operation::Deletion(seq) });
            }
        }

        let (reference, alternate) = s.split_once('>').ok_or_else(invalid)?;
        let mut ref_chars = reference.chars();
        let mut alt_chars = alternate.chars();
        match (ref_chars.next(), ref_chars.next(), alt_chars.next(), alt_chars.next()) {
            (Some(r), None, Some(a), None) if r.is_ascii_alphabetic() && a.is_ascii_alphabetic() => {
                Ok(Operation::Substitution {
                    reference: r.to_ascii_uppercase(),
                    alternate: a.to_ascii_uppercase()
                })
            },
            _ => Err(invalid())
        }
    }
}

/// A gene mutation, identified by its position and operation.
/// The functional flag and the legacy name are annotations only; they do not take part in equality, hashing, or ordering.
#[derive(Clone, Debug)]
pub struct Mutation {
    /// Genomic coordinate of the mutation
    position: u64,
    /// The change at `position`
    op: Operation,
    /// If true, this mutation alters the gene product
    functional: bool,
    /// Optional legacy name (e.g., from the source catalog), for diagnostics only
    old_name: Option<String>,
}

impl Mutation {
    /// Constructor
    pub fn new(position: u64, op: Operation, functional: bool) -> Self {
        Self {
            position,
            op,
            functional,
            old_name: None
        }
    }

    /// Builds the reference marker at a position
    pub fn reference_at(position: u64) -> Self {
        Self::new(position, Operation::Reference, false)
    }

    /// Attaches a legacy name
    pub fn with_old_name(mut self, old_name: Option<String>) -> Self {
        self.old_name = old_name;
        self
    }

    /// Parses `<position>:<op>` and sets the functional flag
    /// # Errors
    /// * if the string is not a valid mutation
    pub fn parse(value: &str, functional: bool) -> Result<Self, MutationError> {
        let mut mutation: Mutation = value.parse()?;
        mutation.functional = functional;
        Ok(mutation)
    }

    /// Returns true if this mutation is an insertion
    pub fn is_insertion(&self) -> bool {
        self.op.is_insertion()
    }

    /// Returns true if this is a reference marker
    pub fn is_reference(&self) -> bool {
        self.op.is_reference()
    }

    /// Label used when naming solver variables, e.g. `100_CT`
    pub fn label(&self) -> String {
        format!("{}_{}", self.position, self.op.label())
    }

    // getters
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn op(&self) -> &Operation {
        &self.op
    }

    pub fn is_functional(&self) -> bool {
        self.functional
    }

    pub fn old_name(&self) -> Option<&str> {
        self.old_name.as_deref()
    }
}

impl PartialEq for Mutation {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.op == other.op
    }
}

impl Eq for Mutation {}

impl Hash for Mutation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.position.hash(state);
        self.op.hash(state);
    }
}

impl PartialOrd for Mutation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Mutation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.position.cmp(&other.position)
            .then_with(|| self.op.cmp(&other.op))
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.position, self.op)
    }
}

impl FromStr for Mutation {
    type Err = MutationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (position, op) = s.trim().split_once(':')
            .ok_or_else(|| MutationError::MissingSeparator { value: s.to_string() })?;
        let position: u64 = position.parse()
            .map_err(|_| MutationError::InvalidPosition { value: position.to_string() })?;
        Ok(Mutation::new(position, op.parse()?, false))
    }
}

impl Serialize for Mutation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Mutation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_parse_operations() {
        assert_eq!("_".parse::<Operation>().unwrap(), Operation::Reference);
        assert_eq!("c>t".parse::<Operation>().unwrap(), Operation::Substitution { reference: 'C', alternate: 'T' });
        assert_eq!("INS.ac".parse::<Operation>().unwrap(), Operation::Insertion("AC".to_string()));
        assert_eq!("insAC".parse::<Operation>().unwrap(), Operation::Insertion("AC".to_string()));
        assert_eq!("DEL.G".parse::<Operation>().unwrap(), Operation::Deletion("G".to_string()));
        assert_eq!("del".parse::<Operation>(), Err(MutationError::EmptySequence { op: "del" }));
        assert!("CC>T".parse::<Operation>().is_err());
        assert!("X".parse::<Operation>().is_err());
    }

    #[test]
    fn test_mutation_round_trip_text() {
        let m = Mutation::parse("42522612:C>G", true).unwrap();
        assert_eq!(m.position(), 42522612);
        assert!(m.is_functional());
        assert_eq!(m.to_string(), "42522612:C>G");
        assert_eq!(m.label(), "42522612_CG");

        assert!("42522612".parse::<Mutation>().is_err());
        assert!("abc:C>G".parse::<Mutation>().is_err());
    }

    #[test]
    fn test_identity_ignores_annotations() {
        let functional = Mutation::parse("100:C>T", true).unwrap();
        let neutral = Mutation::parse("100:C>T", false).unwrap().with_old_name(Some("rs123".to_string()));
        assert_eq!(functional, neutral);

        let set: BTreeSet<Mutation> = [functional, neutral].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_ordering() {
        let mut muts: Vec<Mutation> = ["200:A>G", "100:insA", "100:C>T", "100:_"].iter()
            .map(|s| s.parse().unwrap())
            .collect();
        muts.sort();
        let ordered: Vec<String> = muts.iter().map(|m| m.to_string()).collect();
        assert_eq!(ordered, vec!["100:_", "100:C>T", "100:insA", "200:A>G"]);
        assert!(muts[0].is_reference());
        assert!(muts[2].is_insertion());
    }
}
