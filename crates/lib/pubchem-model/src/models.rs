use serde::{Deserialize, Serialize};

/// Canonical integer key PubChem uses for a compound record.
pub type Cid = u64;

/// Canonical compound attributes projected from a full PubChem record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CompoundRecord {
    pub cid: Cid,
    pub iupac_name: Option<String>,
    pub molecular_formula: Option<String>,
    pub molecular_weight: Option<f64>,
    pub monoisotopic_mass: Option<f64>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub charge: i64,
    pub search_term: String,
}

/// Self-describing failure for a single name in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LookupFailure {
    pub error: String,
    pub compound_name: String,
}

impl LookupFailure {
    #[must_use]
    pub fn new(compound_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            compound_name: compound_name.into(),
        }
    }

    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::new(name, format!("Compound '{name}' not found in PubChem."))
    }

    #[must_use]
    pub fn http_error(name: &str) -> Self {
        Self::new(
            name,
            format!("Compound '{name}' not found in PubChem (HTTP Error)."),
        )
    }

    #[must_use]
    pub fn general(name: &str, detail: &str) -> Self {
        Self::new(name, format!("General error for '{name}': {detail}"))
    }

    #[must_use]
    pub fn retries_exhausted(name: &str, attempts: u32) -> Self {
        Self::new(
            name,
            format!("Failed to get data for '{name}' after {attempts} retries."),
        )
    }

    #[must_use]
    pub fn unprocessable(name: &str, cid: Cid) -> Self {
        Self::new(
            name,
            format!("Could not process full record for '{name}' (CID: {cid})."),
        )
    }
}

/// Result of looking up one name: a record or a failure, never both.
///
/// Serialized without a tag so callers see either the record attributes or an
/// object carrying `error` and `compound_name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LookupOutcome {
    Found(CompoundRecord),
    Failed(LookupFailure),
}

impl LookupOutcome {
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    #[must_use]
    pub const fn record(&self) -> Option<&CompoundRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub const fn failure(&self) -> Option<&LookupFailure> {
        match self {
            Self::Found(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    /// The name this outcome answers for.
    #[must_use]
    pub fn search_term(&self) -> &str {
        match self {
            Self::Found(record) => &record.search_term,
            Self::Failed(failure) => &failure.compound_name,
        }
    }
}

impl From<CompoundRecord> for LookupOutcome {
    fn from(record: CompoundRecord) -> Self {
        Self::Found(record)
    }
}

impl From<LookupFailure> for LookupOutcome {
    fn from(failure: LookupFailure) -> Self {
        Self::Failed(failure)
    }
}
