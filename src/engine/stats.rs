//! Per-venue availability accounting for a run.

use std::collections::BTreeMap;

use hdrhistogram::Histogram;
use serde::Serialize;

use crate::error::FetchError;
use crate::market_data::collector::PairOutcome;
use crate::market_data::resolver::SymbolUniverse;
use crate::market_data::types::VenueId;
use crate::retry::Outcome;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ListingStatus {
    Available { symbols: usize },
    Unavailable { error: FetchError, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueStats {
    pub venue: VenueId,
    pub listing: ListingStatus,
    pub requested: usize,
    pub succeeded: usize,
    pub retryable_failures: usize,
    pub terminal_failures: usize,
    /// `None` when nothing was requested from the venue.
    pub success_rate: Option<f64>,
    /// Over successful fetches only.
    pub latency_p50_ms: Option<u64>,
    pub latency_p99_ms: Option<u64>,
}

#[derive(Default)]
struct Tally {
    requested: usize,
    succeeded: usize,
    retryable: usize,
    terminal: usize,
    latencies: Vec<u64>,
}

/// One entry per venue that took part in resolution, ordered by venue id.
pub fn venue_stats(universe: &SymbolUniverse, outcomes: &[PairOutcome]) -> Vec<VenueStats> {
    let mut tallies: BTreeMap<&VenueId, Tally> = BTreeMap::new();
    for venue in universe.available_venues().chain(universe.unavailable.keys()) {
        tallies.entry(venue).or_default();
    }
    for pair in outcomes {
        let tally = tallies.entry(&pair.venue).or_default();
        tally.requested += 1;
        match &pair.outcome {
            Outcome::Success(_) => {
                tally.succeeded += 1;
                tally.latencies.push(pair.elapsed_ms);
            }
            Outcome::RetryableFailure(_) => tally.retryable += 1,
            Outcome::TerminalFailure(_) => tally.terminal += 1,
        }
    }

    tallies
        .into_iter()
        .map(|(venue, tally)| {
            let listing = match (universe.per_venue.get(venue), universe.unavailable.get(venue)) {
                (Some(symbols), _) => ListingStatus::Available { symbols: symbols.len() },
                (None, Some(failure)) => {
                    ListingStatus::Unavailable { error: failure.error.clone(), attempts: failure.attempts }
                }
                (None, None) => ListingStatus::Available { symbols: 0 },
            };
            let (p50, p99) = percentiles(&tally.latencies);
            VenueStats {
                venue: venue.clone(),
                listing,
                requested: tally.requested,
                succeeded: tally.succeeded,
                retryable_failures: tally.retryable,
                terminal_failures: tally.terminal,
                success_rate: (tally.requested > 0).then(|| tally.succeeded as f64 / tally.requested as f64),
                latency_p50_ms: p50,
                latency_p99_ms: p99,
            }
        })
        .collect()
}

fn percentiles(samples: &[u64]) -> (Option<u64>, Option<u64>) {
    if samples.is_empty() {
        return (None, None);
    }
    let Ok(mut hist) = Histogram::<u64>::new(3) else {
        return (None, None);
    };
    for &ms in samples {
        let _ = hist.record(ms);
    }
    (Some(hist.value_at_quantile(0.5)), Some(hist.value_at_quantile(0.99)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FetchFailure;
    use crate::testutil::{descriptor, snapshot, sym};

    fn pair(venue: &str, outcome: Outcome<crate::market_data::types::DepthSnapshot>, ms: u64) -> PairOutcome {
        PairOutcome { venue: VenueId::from(venue), symbol: sym("BTC/USDT"), outcome, elapsed_ms: ms }
    }

    #[test]
    fn test_counts_and_rates_per_venue() {
        let per_venue = BTreeMap::from([(
            VenueId::from("a"),
            BTreeMap::from([(sym("BTC/USDT"), descriptor("BTC/USDT", "BTCUSDT", 1.0))]),
        )]);
        let unavailable = BTreeMap::from([(
            VenueId::from("b"),
            FetchFailure { error: FetchError::unavailable("down"), attempts: 3 },
        )]);
        let universe = SymbolUniverse::from_parts(per_venue, unavailable);
        let ok = || Outcome::Success(snapshot("a", "BTC/USDT", &[(1.0, 1.0)], &[(2.0, 1.0)]));
        let outcomes = vec![
            pair("a", ok(), 10),
            pair("a", ok(), 30),
            pair("a", Outcome::timed_out(1), 5000),
            pair("a", Outcome::TerminalFailure(FetchFailure { error: FetchError::malformed("x"), attempts: 1 }), 3),
        ];

        let stats = venue_stats(&universe, &outcomes);
        assert_eq!(stats.len(), 2);
        let a = &stats[0];
        assert_eq!((a.requested, a.succeeded, a.retryable_failures, a.terminal_failures), (4, 2, 1, 1));
        assert_eq!(a.success_rate, Some(0.5));
        assert_eq!(a.latency_p50_ms, Some(10));
        assert_eq!(a.listing, ListingStatus::Available { symbols: 1 });

        let b = &stats[1];
        assert_eq!(b.requested, 0);
        assert_eq!(b.success_rate, None);
        assert!(matches!(b.listing, ListingStatus::Unavailable { attempts: 3, .. }));
    }
}
