use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use pubchem_core::batch::BatchOrchestrator;
use pubchem_core::policy::{PacingPolicy, RetryPolicy};
use pubchem_core::upstream::{CompoundSource, RawCompound, SubstanceMatch, UpstreamError};
use pubchem_model::{Cid, LookupOutcome};
use serde_json::{Value, json};
use tokio::time::Instant;

#[derive(Default)]
struct StubSource {
    compounds: HashMap<String, Cid>,
    substances: HashMap<String, Vec<SubstanceMatch>>,
    broken_records: HashSet<Cid>,
    busy_responses: AtomicU32,
    latency: Duration,
    compound_calls: AtomicUsize,
    substance_calls: AtomicUsize,
    record_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubSource {
    fn with_compound(mut self, name: &str, cid: Cid) -> Self {
        self.compounds.insert(name.to_string(), cid);
        self
    }

    fn with_substance(mut self, name: &str, cids: Vec<Cid>) -> Self {
        self.substances.insert(
            name.to_string(),
            vec![SubstanceMatch {
                sid: Some(1000 + cids.len() as u64),
                cids,
            }],
        );
        self
    }

    fn with_broken_record(mut self, cid: Cid) -> Self {
        self.broken_records.insert(cid);
        self
    }

    fn with_busy_responses(self, count: u32) -> Self {
        self.busy_responses.store(count, Ordering::SeqCst);
        self
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_request(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl CompoundSource for StubSource {
    async fn compound_cid_by_name(&self, name: &str) -> Result<Option<Cid>, UpstreamError> {
        self.compound_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_request().await;
        let busy = self
            .busy_responses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if busy {
            return Err(UpstreamError::Busy {
                status: 503,
                message: "PUGREST.ServerBusy".to_string(),
            });
        }
        Ok(self.compounds.get(name).copied())
    }

    async fn substance_cids_by_name(&self, name: &str) -> Result<Vec<SubstanceMatch>, UpstreamError> {
        self.substance_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_request().await;
        Ok(self.substances.get(name).cloned().unwrap_or_default())
    }

    async fn compound_record(&self, cid: Cid) -> Result<RawCompound, UpstreamError> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_request().await;
        let properties = if self.broken_records.contains(&cid) {
            Value::Null
        } else {
            json!({
                "CID": cid,
                "MolecularFormula": "C9H8O4",
                "MolecularWeight": "180.16",
                "IUPACName": "2-acetyloxybenzoic acid",
                "MonoisotopicMass": "180.04225873",
                "Charge": 0
            })
        };
        Ok(RawCompound {
            cid,
            properties,
            synonyms: Some(vec![format!("compound-{cid}")]),
        })
    }
}

fn orchestrator(
    source: &Arc<StubSource>,
    max_attempts: u32,
    pacing: Duration,
) -> BatchOrchestrator<StubSource> {
    BatchOrchestrator::from_source(
        source.clone(),
        RetryPolicy::new(max_attempts, Duration::from_secs(5)),
        PacingPolicy::new(pacing),
    )
}

#[tokio::test]
async fn aspirin_resolves_from_primary_domain() {
    let source = Arc::new(StubSource::default().with_compound("Aspirin", 2244));
    let batch = orchestrator(&source, 3, Duration::ZERO);

    let outcomes = batch.run(&["Aspirin"]).await;

    assert_eq!(outcomes.len(), 1);
    let record = outcomes[0].record().expect("aspirin should resolve");
    assert_eq!(record.cid, 2244);
    assert_eq!(record.search_term, "Aspirin");
    assert_eq!(record.synonyms, vec!["compound-2244".to_string()]);
    let wire = serde_json::to_value(&outcomes[0]).expect("serialize outcome");
    assert!(wire.get("error").is_none());
    assert_eq!(StubSource::calls(&source.substance_calls), 0);
}

#[tokio::test]
async fn substance_fallback_yields_same_record_shape() {
    let source = Arc::new(
        StubSource::default()
            .with_compound("Aspirin", 2244)
            .with_substance("Hydroxocobalamin", vec![11_953_898, 5_460_373]),
    );
    let batch = orchestrator(&source, 3, Duration::ZERO);

    let outcomes = batch.run(&["Aspirin", "Hydroxocobalamin"]).await;

    let fallback = outcomes[1].record().expect("substance fallback should resolve");
    assert_eq!(fallback.cid, 11_953_898);
    assert_eq!(fallback.search_term, "Hydroxocobalamin");

    let keys = |outcome: &LookupOutcome| -> Vec<String> {
        let value = serde_json::to_value(outcome).expect("serialize outcome");
        let mut keys: Vec<String> = value
            .as_object()
            .expect("record serializes as an object")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    };
    assert_eq!(keys(&outcomes[0]), keys(&outcomes[1]));
    assert_eq!(StubSource::calls(&source.compound_calls), 2);
    assert_eq!(StubSource::calls(&source.substance_calls), 1);
}

#[tokio::test]
async fn unknown_name_is_not_found_after_one_pass() {
    let source = Arc::new(StubSource::default().with_substance("Placeholder", Vec::new()));
    let batch = orchestrator(&source, 3, Duration::ZERO);

    let outcomes = batch.run(&["Placeholder"]).await;

    let failure = outcomes[0].failure().expect("name should not resolve");
    assert_eq!(failure.error, "Compound 'Placeholder' not found in PubChem.");
    assert_eq!(failure.compound_name, "Placeholder");
    assert_eq!(StubSource::calls(&source.compound_calls), 1);
    assert_eq!(StubSource::calls(&source.substance_calls), 1);
    assert_eq!(StubSource::calls(&source.record_calls), 0);
}

#[tokio::test]
async fn blank_name_is_not_found_without_querying() {
    let source = Arc::new(StubSource::default());
    let batch = orchestrator(&source, 3, Duration::ZERO);

    let outcomes = batch.run(&["  "]).await;

    let failure = outcomes[0].failure().expect("blank name should not resolve");
    assert_eq!(failure.compound_name, "  ");
    assert_eq!(StubSource::calls(&source.compound_calls), 0);
}

#[tokio::test(start_paused = true)]
async fn busy_service_recovers_within_retry_budget() {
    let source = Arc::new(
        StubSource::default()
            .with_compound("Caffeine", 2519)
            .with_busy_responses(2),
    );
    let batch = orchestrator(&source, 3, Duration::ZERO);
    let started = Instant::now();

    let outcomes = batch.run(&["Caffeine"]).await;

    assert_eq!(outcomes[0].record().map(|record| record.cid), Some(2519));
    assert_eq!(StubSource::calls(&source.compound_calls), 3);
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn busy_service_exhausts_smaller_retry_budget() {
    let source = Arc::new(
        StubSource::default()
            .with_compound("Caffeine", 2519)
            .with_busy_responses(2),
    );
    let batch = orchestrator(&source, 2, Duration::ZERO);

    let outcomes = batch.run(&["Caffeine"]).await;

    let failure = outcomes[0].failure().expect("retries should be exhausted");
    assert_eq!(failure.error, "Failed to get data for 'Caffeine' after 2 retries.");
    assert_eq!(StubSource::calls(&source.compound_calls), 2);
    assert_eq!(StubSource::calls(&source.substance_calls), 0);
}

#[tokio::test]
async fn fetch_failure_is_reported_without_retry() {
    let source = Arc::new(
        StubSource::default()
            .with_compound("Aspirin", 2244)
            .with_broken_record(2244),
    );
    let batch = orchestrator(&source, 3, Duration::ZERO);

    let outcomes = batch.run(&["Aspirin"]).await;

    let failure = outcomes[0].failure().expect("fetch should fail");
    assert_eq!(
        failure.error,
        "Could not process full record for 'Aspirin' (CID: 2244)."
    );
    assert_eq!(StubSource::calls(&source.compound_calls), 1);
    assert_eq!(StubSource::calls(&source.record_calls), 1);
}

#[tokio::test]
async fn batch_preserves_length_and_order() {
    let source = Arc::new(
        StubSource::default()
            .with_compound("Aspirin", 2244)
            .with_compound("Caffeine", 2519)
            .with_substance("Cobalamin", vec![5_311_498]),
    );
    let batch = orchestrator(&source, 3, Duration::ZERO);
    let names = vec![
        "Caffeine".to_string(),
        "Nonexistium".to_string(),
        "Aspirin".to_string(),
        "Cobalamin".to_string(),
    ];

    let outcomes = batch.run(&names).await;

    assert_eq!(outcomes.len(), names.len());
    let terms: Vec<&str> = outcomes.iter().map(LookupOutcome::search_term).collect();
    assert_eq!(terms, names.iter().map(String::as_str).collect::<Vec<_>>());
    let found: Vec<bool> = outcomes.iter().map(LookupOutcome::is_found).collect();
    assert_eq!(found, vec![true, false, true, true]);
}

#[tokio::test]
async fn empty_batch_returns_no_outcomes() {
    let source = Arc::new(StubSource::default());
    let batch = orchestrator(&source, 3, Duration::from_secs(2));

    let outcomes = batch.run::<String>(&[]).await;

    assert!(outcomes.is_empty());
    assert_eq!(StubSource::calls(&source.compound_calls), 0);
}

#[tokio::test(start_paused = true)]
async fn pacing_separates_every_pair_of_items() {
    let source = Arc::new(StubSource::default().with_compound("Aspirin", 2244));
    let batch = orchestrator(&source, 3, Duration::from_secs(2));
    let started = Instant::now();

    let outcomes = batch.run(&["Aspirin", "Nonexistium", "Aspirin"]).await;

    let elapsed = started.elapsed();
    assert_eq!(outcomes.len(), 3);
    assert!(elapsed >= Duration::from_secs(4), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "no trailing pause expected: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn lookups_within_a_batch_never_overlap() {
    let source = Arc::new(
        StubSource::default()
            .with_compound("Aspirin", 2244)
            .with_substance("Cobalamin", vec![5_311_498])
            .with_latency(Duration::from_millis(250)),
    );
    let batch = orchestrator(&source, 3, Duration::ZERO);

    let outcomes = batch
        .run(&["Aspirin", "Cobalamin", "Aspirin", "Nonexistium"])
        .await;

    assert_eq!(outcomes.len(), 4);
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_batches_pace_independently() {
    let source = Arc::new(StubSource::default().with_compound("Aspirin", 2244));
    let left = orchestrator(&source, 3, Duration::from_secs(2));
    let right = left.clone();
    let started = Instant::now();

    let (left_outcomes, right_outcomes) = tokio::join!(
        left.run(&["Aspirin", "Aspirin"]),
        right.run(&["Aspirin", "Aspirin"])
    );

    assert_eq!(left_outcomes.len(), 2);
    assert_eq!(right_outcomes.len(), 2);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn dropping_a_batch_stops_further_lookups() {
    let source = Arc::new(
        StubSource::default()
            .with_compound("Aspirin", 2244)
            .with_latency(Duration::from_secs(1)),
    );
    let batch = orchestrator(&source, 3, Duration::from_secs(2));
    let names = ["Aspirin"; 5];

    let result = tokio::time::timeout(Duration::from_millis(5500), batch.run(&names)).await;
    assert!(result.is_err(), "batch should have been cut short");
    let calls_at_cancel = StubSource::calls(&source.compound_calls);

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(calls_at_cancel, 2);
    assert_eq!(StubSource::calls(&source.compound_calls), calls_at_cancel);
}
