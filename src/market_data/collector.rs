//! Depth fetch orchestration.
//!
//! One task per (venue, symbol) pair on a `JoinSet`. Every attempt first waits
//! for its venue's rate-limit permit and only then takes one of the global
//! in-flight slots, holding it for the venue call alone. A throttled venue
//! therefore queues on its own limiter without occupying slots that other
//! venues could use. Every fetch runs under the retry coordinator. Collection
//! ends when all tasks finish or the global deadline passes; whatever is still
//! running then is aborted and recorded as a `Timeout` failure.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::market_data::adapters::VenueAdapter;
use crate::market_data::resolver::SymbolUniverse;
use crate::market_data::types::{CanonicalSymbol, SymbolDescriptor, VenueId};
use crate::rate_limit::RateLimiter;
use crate::retry::{with_retry, FetchFailure, FetchOutcome, Outcome, RetryPolicy};

pub type PairKey = (VenueId, CanonicalSymbol);

/// One logical depth fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub venue: VenueId,
    pub descriptor: SymbolDescriptor,
}

impl FetchRequest {
    pub fn key(&self) -> PairKey {
        (self.venue.clone(), self.descriptor.canonical.clone())
    }
}

/// The single outcome recorded for one requested pair.
#[derive(Debug, Clone, Serialize)]
pub struct PairOutcome {
    pub venue: VenueId,
    pub symbol: CanonicalSymbol,
    pub outcome: FetchOutcome,
    pub elapsed_ms: u64,
}

/// Requests for every `symbols` entry on every venue that lists it.
///
/// Symbol-major order, so consecutive requests rotate across venues instead of
/// draining one venue's backlog before the next starts.
pub fn plan(universe: &SymbolUniverse, symbols: &BTreeSet<CanonicalSymbol>) -> Vec<FetchRequest> {
    symbols
        .iter()
        .flat_map(|symbol| {
            universe.venues_for(symbol).filter_map(move |venue| {
                universe
                    .descriptor(venue, symbol)
                    .map(|descriptor| FetchRequest { venue: venue.clone(), descriptor: descriptor.clone() })
            })
        })
        .collect()
}

pub struct DepthCollector {
    adapters: HashMap<VenueId, Arc<dyn VenueAdapter>>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    levels: usize,
    max_in_flight: usize,
    deadline: Duration,
}

impl DepthCollector {
    pub fn new(
        adapters: &[Arc<dyn VenueAdapter>],
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        levels: usize,
        max_in_flight: usize,
        deadline: Duration,
    ) -> Self {
        Self {
            adapters: adapters.iter().map(|a| (a.venue().clone(), a.clone())).collect(),
            limiter,
            policy,
            levels,
            max_in_flight: max_in_flight.max(1),
            deadline,
        }
    }

    /// Fetches every requested pair. The returned map holds exactly one
    /// outcome per distinct requested pair.
    pub async fn collect(&self, requests: Vec<FetchRequest>) -> BTreeMap<PairKey, PairOutcome> {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut results: BTreeMap<PairKey, PairOutcome> = BTreeMap::new();
        let mut attempts: BTreeMap<PairKey, Arc<AtomicU32>> = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for request in requests {
            let key = request.key();
            if attempts.contains_key(&key) || results.contains_key(&key) {
                debug!(venue = %key.0, symbol = %key.1, "duplicate request ignored");
                continue;
            }
            let Some(adapter) = self.adapters.get(&request.venue).cloned() else {
                let failure = FetchFailure { error: FetchError::unavailable("no adapter for venue"), attempts: 0 };
                results.insert(key.clone(), pair_outcome(key, Outcome::TerminalFailure(failure), Duration::ZERO));
                continue;
            };
            let counter = Arc::new(AtomicU32::new(0));
            attempts.insert(key.clone(), counter.clone());

            let semaphore = semaphore.clone();
            let limiter = self.limiter.clone();
            let policy = self.policy.clone();
            let levels = self.levels;
            tasks.spawn(async move {
                let begin = Instant::now();
                let outcome =
                    fetch_pair(adapter.as_ref(), &limiter, &semaphore, &policy, &request, levels, &counter).await;
                (key, outcome, begin.elapsed())
            });
        }

        let mut timed_out = false;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((key, outcome, elapsed)))) => {
                    record_metrics(&key.0, &outcome, elapsed);
                    results.insert(key.clone(), pair_outcome(key, outcome, elapsed));
                }
                Ok(Some(Err(e))) => warn!(error = %e, "fetch task failed to complete"),
                Ok(None) => break,
                Err(_) => {
                    warn!(pending = tasks.len(), "collection deadline elapsed, abandoning in-flight fetches");
                    tasks.abort_all();
                    timed_out = true;
                    break;
                }
            }
        }

        for (key, counter) in attempts {
            if results.contains_key(&key) {
                continue;
            }
            let consumed = counter.load(Ordering::SeqCst);
            let outcome = if timed_out {
                Outcome::timed_out(consumed)
            } else {
                Outcome::TerminalFailure(FetchFailure {
                    error: FetchError::unavailable("fetch task aborted"),
                    attempts: consumed,
                })
            };
            record_metrics(&key.0, &outcome, started.elapsed());
            results.insert(key.clone(), pair_outcome(key, outcome, started.elapsed()));
        }

        let succeeded = results.values().filter(|p| p.outcome.is_success()).count();
        info!(
            pairs = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "depth collection finished"
        );
        results
    }
}

/// One pair under retry. The global slot is taken after the venue permit and
/// released before any backoff sleep.
async fn fetch_pair(
    adapter: &dyn VenueAdapter,
    limiter: &RateLimiter,
    slots: &Semaphore,
    policy: &RetryPolicy,
    request: &FetchRequest,
    levels: usize,
    counter: &AtomicU32,
) -> FetchOutcome {
    let venue = &request.venue;
    let descriptor = &request.descriptor;
    with_retry(policy, FetchError::disposition, |attempt| {
        counter.store(attempt, Ordering::SeqCst);
        metrics::counter!("depthx_fetch_attempts_total", "venue" => venue.to_string()).increment(1);
        async move {
            limiter.acquire(venue).await?;
            // Never closed; a closed semaphore would only lift the cap.
            let _slot = slots.acquire().await.ok();
            adapter.fetch_depth(descriptor, levels).await
        }
    })
    .await
}

fn pair_outcome(key: PairKey, outcome: FetchOutcome, elapsed: Duration) -> PairOutcome {
    let (venue, symbol) = key;
    PairOutcome { venue, symbol, outcome, elapsed_ms: elapsed.as_millis() as u64 }
}

fn record_metrics(venue: &VenueId, outcome: &FetchOutcome, elapsed: Duration) {
    metrics::counter!(
        "depthx_fetch_outcomes_total",
        "venue" => venue.to_string(),
        "outcome" => outcome.label()
    )
    .increment(1);
    if outcome.is_success() {
        metrics::histogram!("depthx_fetch_latency_ms", "venue" => venue.to_string())
            .record(elapsed.as_secs_f64() * 1000.0);
    }
}
