//! Full-record retrieval and projection onto [`CompoundRecord`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use pubchem_model::schema::{
    PROP_CHARGE,
    PROP_IUPAC_NAME,
    PROP_MOLECULAR_FORMULA,
    PROP_MOLECULAR_WEIGHT,
    PROP_MONOISOTOPIC_MASS,
};
use pubchem_model::{Cid, CompoundRecord};
use serde_json::{Map, Value};

use crate::upstream::{CompoundSource, RawCompound, UpstreamError};

#[derive(Debug)]
pub enum FetchError {
    Upstream(UpstreamError),
    Unusable(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream(err) => write!(f, "{err}"),
            Self::Unusable(message) => write!(f, "unusable record: {message}"),
        }
    }
}

impl Error for FetchError {}

impl From<UpstreamError> for FetchError {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err)
    }
}

pub struct RecordFetcher<S> {
    source: Arc<S>,
}

impl<S> Clone for RecordFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<S: CompoundSource> RecordFetcher<S> {
    #[must_use]
    pub const fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Retrieves the full record for `cid` and projects it.
    ///
    /// # Errors
    /// Returns `FetchError` if the upstream call fails or the payload carries
    /// no property row.
    pub async fn fetch(&self, cid: Cid, search_term: &str) -> Result<CompoundRecord, FetchError> {
        let raw = self.source.compound_record(cid).await?;
        project_record(raw, search_term)
    }
}

/// Projects a raw upstream record onto the canonical attribute set.
///
/// Individual missing or malformed fields become absent; only a payload
/// without a property row is rejected.
///
/// # Errors
/// Returns `FetchError::Unusable` if `raw.properties` is not an object.
pub fn project_record(raw: RawCompound, search_term: &str) -> Result<CompoundRecord, FetchError> {
    let Value::Object(row) = raw.properties else {
        return Err(FetchError::Unusable(format!(
            "no property row for CID {}",
            raw.cid
        )));
    };

    Ok(CompoundRecord {
        cid: row.get("CID").and_then(Value::as_u64).unwrap_or(raw.cid),
        iupac_name: text(&row, PROP_IUPAC_NAME),
        molecular_formula: text(&row, PROP_MOLECULAR_FORMULA),
        molecular_weight: decimal(&row, PROP_MOLECULAR_WEIGHT),
        monoisotopic_mass: decimal(&row, PROP_MONOISOTOPIC_MASS),
        synonyms: raw.synonyms.unwrap_or_default(),
        charge: integer(&row, PROP_CHARGE).unwrap_or(0),
        search_term: search_term.to_string(),
    })
}

fn text(row: &Map<String, Value>, key: &str) -> Option<String> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// PUG REST reports weights as strings in newer responses and numbers in older ones.
fn decimal(row: &Map<String, Value>, key: &str) -> Option<f64> {
    match row.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

fn integer(row: &Map<String, Value>, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}
