//! Upstream chemical database collaborator.
//!
//! The lookup pipeline only depends on [`CompoundSource`]; [`PugRestClient`]
//! is the production implementation backed by PubChem PUG REST.

use std::error::Error;
use std::fmt;
use std::future::Future;

use pubchem_model::Cid;
use serde_json::Value;

mod pug_rest;

pub use pug_rest::{DEFAULT_BASE_URL, PugRestClient};

#[derive(Debug)]
pub enum UpstreamError {
    /// Service busy or rate limited; worth retrying.
    Busy { status: u16, message: String },
    Status { status: u16, message: String },
    Request(reqwest::Error),
    Decode(String),
    InvalidUrl(String),
}

impl UpstreamError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy { status, message } => write!(f, "server busy (HTTP {status}): {message}"),
            Self::Status { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Request(err) => write!(f, "request failed: {err}"),
            Self::Decode(message) => write!(f, "unexpected response: {message}"),
            Self::InvalidUrl(url) => write!(f, "invalid upstream url: {url}"),
        }
    }
}

impl Error for UpstreamError {}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err)
    }
}

/// One entry of a substance-domain name search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstanceMatch {
    pub sid: Option<u64>,
    pub cids: Vec<Cid>,
}

/// Unprojected compound record as returned by the upstream service.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCompound {
    pub cid: Cid,
    /// Property row keyed by upstream property name; `Null` when missing.
    pub properties: Value,
    pub synonyms: Option<Vec<String>>,
}

/// Name search in two domains plus full-record retrieval by identifier.
pub trait CompoundSource: Send + Sync + 'static {
    /// Exact-name search in the compound domain, 3-D records, first hit only.
    fn compound_cid_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Cid>, UpstreamError>> + Send;

    /// Exact-name search in the substance domain.
    fn substance_cids_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<SubstanceMatch>, UpstreamError>> + Send;

    fn compound_record(
        &self,
        cid: Cid,
    ) -> impl Future<Output = Result<RawCompound, UpstreamError>> + Send;
}
