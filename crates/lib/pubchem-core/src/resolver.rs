//! Name resolution with compound/substance fallback and bounded retry.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use pubchem_model::schema::{DOMAIN_COMPOUND, DOMAIN_SUBSTANCE};
use pubchem_model::{Cid, LookupFailure, LookupOutcome};
use tracing::{error, info, warn};

use crate::fetcher::RecordFetcher;
use crate::policy::RetryPolicy;
use crate::upstream::{CompoundSource, UpstreamError};

#[derive(Debug)]
pub enum ResolveError {
    /// Neither domain knows the name.
    NotFound,
    /// The service stayed busy for every permitted attempt.
    TransientFailure { attempts: u32 },
    Upstream(UpstreamError),
}

impl ResolveError {
    /// Failure reported to the caller for `name`.
    #[must_use]
    pub fn to_failure(&self, name: &str) -> LookupFailure {
        match self {
            Self::NotFound => LookupFailure::not_found(name),
            Self::TransientFailure { attempts } => LookupFailure::retries_exhausted(name, *attempts),
            Self::Upstream(UpstreamError::Status { .. }) => LookupFailure::http_error(name),
            Self::Upstream(err) => LookupFailure::general(name, &err.to_string()),
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no identifier in any domain"),
            Self::TransientFailure { attempts } => {
                write!(f, "service busy after {attempts} attempts")
            }
            Self::Upstream(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolveError {}

/// Resolves free-text names to identifiers and fetches their records.
pub struct Resolver<S> {
    source: Arc<S>,
    fetcher: RecordFetcher<S>,
    retry: RetryPolicy,
    connection: String,
}

impl<S> Clone for Resolver<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            fetcher: self.fetcher.clone(),
            retry: self.retry,
            connection: self.connection.clone(),
        }
    }
}

impl<S: CompoundSource> Resolver<S> {
    #[must_use]
    pub fn new(source: Arc<S>, retry: RetryPolicy) -> Self {
        Self {
            fetcher: RecordFetcher::new(source.clone()),
            source,
            retry,
            connection: "Direct".to_string(),
        }
    }

    /// Sets the connection description included in attempt logs.
    #[must_use]
    pub fn with_connection_label(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Finds the identifier for `name`.
    ///
    /// One attempt queries the compound domain and then the substance domain.
    /// Only busy responses are retried; a clean miss is final.
    ///
    /// # Errors
    /// Returns `ResolveError::NotFound` when no domain yields an identifier,
    /// `ResolveError::TransientFailure` when every attempt hit a busy service,
    /// and `ResolveError::Upstream` for any other upstream failure.
    pub async fn resolve(&self, name: &str) -> Result<Cid, ResolveError> {
        if name.trim().is_empty() {
            warn!("blank compound name; skipping upstream queries");
            return Err(ResolveError::NotFound);
        }

        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1;
        loop {
            info!(
                name,
                attempt,
                max_attempts,
                connection = %self.connection,
                "searching compound"
            );
            match self.resolve_once(name).await {
                Ok(Some(cid)) => return Ok(cid),
                Ok(None) => {
                    warn!(name, "no valid CID found in any domain");
                    return Err(ResolveError::NotFound);
                }
                Err(err) if err.is_transient() => {
                    if attempt >= max_attempts {
                        error!(name, max_attempts, "giving up after repeated busy responses");
                        return Err(ResolveError::TransientFailure {
                            attempts: max_attempts,
                        });
                    }
                    warn!(
                        name,
                        attempt,
                        "server busy; retrying in {:?}",
                        self.retry.delay()
                    );
                    tokio::time::sleep(self.retry.delay()).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(name, "PubChem error: {err}");
                    return Err(ResolveError::Upstream(err));
                }
            }
        }
    }

    async fn resolve_once(&self, name: &str) -> Result<Option<Cid>, UpstreamError> {
        info!(name, domain = DOMAIN_COMPOUND, "querying primary domain");
        if let Some(cid) = self.source.compound_cid_by_name(name).await? {
            return Ok(Some(cid));
        }

        warn!(name, domain = DOMAIN_SUBSTANCE, "compound search missed; falling back");
        let matches = self.source.substance_cids_by_name(name).await?;
        Ok(matches
            .first()
            .and_then(|entry| entry.cids.first().copied()))
    }

    /// Resolves `name` and fetches its record, reporting every failure as data.
    pub async fn lookup(&self, name: &str) -> LookupOutcome {
        let cid = match self.resolve(name).await {
            Ok(cid) => cid,
            Err(err) => return err.to_failure(name).into(),
        };

        info!(name, cid, "CID found; fetching full record");
        match self.fetcher.fetch(cid, name).await {
            Ok(record) => record.into(),
            Err(err) => {
                error!(name, cid, "could not process full record: {err}");
                LookupFailure::unprocessable(name, cid).into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_carry_caller_facing_messages() {
        assert_eq!(
            ResolveError::NotFound.to_failure("Xyz").error,
            "Compound 'Xyz' not found in PubChem."
        );
        assert_eq!(
            ResolveError::TransientFailure { attempts: 2 }
                .to_failure("Xyz")
                .error,
            "Failed to get data for 'Xyz' after 2 retries."
        );
        assert_eq!(
            ResolveError::Upstream(UpstreamError::Status {
                status: 400,
                message: "bad request".to_string(),
            })
            .to_failure("Xyz")
            .error,
            "Compound 'Xyz' not found in PubChem (HTTP Error)."
        );
        let general = ResolveError::Upstream(UpstreamError::Decode("eof".to_string()))
            .to_failure("Xyz");
        assert_eq!(general.error, "General error for 'Xyz': unexpected response: eof");
        assert_eq!(general.compound_name, "Xyz");
    }
}
