//! Sequential, paced batch lookups.
//!
//! A batch never has more than one lookup in flight. Concurrent batches each
//! keep their own sequencing; nothing mutable is shared between them.
//! Dropping the future returned by [`BatchOrchestrator::run`] stops the batch
//! at its next suspension point.

use std::sync::Arc;

use pubchem_model::LookupOutcome;
use tracing::{info, warn};

use crate::policy::{PacingPolicy, RetryPolicy};
use crate::resolver::Resolver;
use crate::upstream::CompoundSource;

pub struct BatchOrchestrator<S> {
    resolver: Resolver<S>,
    pacing: PacingPolicy,
}

impl<S> Clone for BatchOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            pacing: self.pacing,
        }
    }
}

impl<S: CompoundSource> BatchOrchestrator<S> {
    #[must_use]
    pub const fn new(resolver: Resolver<S>, pacing: PacingPolicy) -> Self {
        Self { resolver, pacing }
    }

    /// Builds an orchestrator with its own resolver over `source`.
    #[must_use]
    pub fn from_source(source: Arc<S>, retry: RetryPolicy, pacing: PacingPolicy) -> Self {
        Self::new(Resolver::new(source, retry), pacing)
    }

    #[must_use]
    pub const fn resolver(&self) -> &Resolver<S> {
        &self.resolver
    }

    #[must_use]
    pub const fn pacing(&self) -> PacingPolicy {
        self.pacing
    }

    /// Looks up every name in order, one at a time.
    ///
    /// Returns exactly one outcome per name, in input order. The pacing delay
    /// separates each pair of consecutive lookups whatever their result; no
    /// delay follows the last name.
    pub async fn run<N: AsRef<str> + Sync>(&self, names: &[N]) -> Vec<LookupOutcome> {
        info!(count = names.len(), "starting sequential compound search");
        let delay = self.pacing.delay_between_items;
        let mut outcomes = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                info!("pausing for {:.1}s", delay.as_secs_f64());
                tokio::time::sleep(delay).await;
            }
            outcomes.push(self.resolver.lookup(name.as_ref()).await);
        }
        log_outcomes(&outcomes);
        outcomes
    }
}

fn log_outcomes(outcomes: &[LookupOutcome]) {
    match serde_json::to_string_pretty(outcomes) {
        Ok(payload) => {
            info!("--- batch result sent to caller ---");
            info!("{payload}");
            info!("--- end of batch result ---");
        }
        Err(err) => warn!("could not serialize batch result for logging: {err}"),
    }
}
