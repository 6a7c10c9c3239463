//! Symbol discovery across venues.
//!
//! Every venue is listed concurrently. Native names are canonicalised here
//! and nowhere else, so the orchestrator and metric engine only see
//! [`CanonicalSymbol`]s. A venue whose listing fails is recorded as
//! unavailable and simply drops out of the union and intersection.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SymbolScope;
use crate::error::FetchError;
use crate::market_data::adapters::VenueAdapter;
use crate::market_data::normaliser::SymbolConvention;
use crate::market_data::types::{CanonicalSymbol, NativeSymbol, SymbolDescriptor, VenueId};
use crate::rate_limit::RateLimiter;
use crate::retry::{with_retry, FetchFailure, Outcome, RetryPolicy};

/// Symbols confirmed tradable per venue, plus the derived union and
/// intersection. Read-only once resolution finishes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolUniverse {
    pub per_venue: BTreeMap<VenueId, BTreeMap<CanonicalSymbol, SymbolDescriptor>>,
    pub unavailable: BTreeMap<VenueId, FetchFailure>,
    /// Every symbol seen on any available venue.
    pub union: BTreeSet<CanonicalSymbol>,
    /// Symbols listed on every available venue.
    pub intersection: BTreeSet<CanonicalSymbol>,
}

impl SymbolUniverse {
    /// Builds the union and intersection from per-venue sets.
    pub fn from_parts(
        per_venue: BTreeMap<VenueId, BTreeMap<CanonicalSymbol, SymbolDescriptor>>,
        unavailable: BTreeMap<VenueId, FetchFailure>,
    ) -> Self {
        let union: BTreeSet<CanonicalSymbol> = per_venue.values().flat_map(|s| s.keys().cloned()).collect();
        let intersection = if per_venue.is_empty() {
            BTreeSet::new()
        } else {
            union
                .iter()
                .filter(|sym| per_venue.values().all(|s| s.contains_key(*sym)))
                .cloned()
                .collect()
        };
        Self { per_venue, unavailable, union, intersection }
    }

    pub fn symbols(&self, scope: SymbolScope) -> &BTreeSet<CanonicalSymbol> {
        match scope {
            SymbolScope::Intersection => &self.intersection,
            SymbolScope::Union => &self.union,
        }
    }

    pub fn available_venues(&self) -> impl Iterator<Item = &VenueId> {
        self.per_venue.keys()
    }

    pub fn descriptor(&self, venue: &VenueId, symbol: &CanonicalSymbol) -> Option<&SymbolDescriptor> {
        self.per_venue.get(venue).and_then(|s| s.get(symbol))
    }

    /// Venues on which `symbol` is listed.
    pub fn venues_for<'a>(&'a self, symbol: &'a CanonicalSymbol) -> impl Iterator<Item = &'a VenueId> + 'a {
        self.per_venue.iter().filter(move |(_, s)| s.contains_key(symbol)).map(|(v, _)| v)
    }
}

pub struct SymbolResolver<'a> {
    limiter: &'a RateLimiter,
    policy: &'a RetryPolicy,
    conventions: HashMap<VenueId, SymbolConvention>,
    quotes: Vec<String>,
    deadline: Duration,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(
        limiter: &'a RateLimiter,
        policy: &'a RetryPolicy,
        conventions: HashMap<VenueId, SymbolConvention>,
        quotes: Vec<String>,
        deadline: Duration,
    ) -> Self {
        Self { limiter, policy, conventions, quotes, deadline }
    }

    /// Lists every adapter's venue concurrently and assembles the universe.
    /// `filter`, when given, restricts every per-venue set to those symbols.
    pub async fn resolve(
        &self,
        adapters: &[Arc<dyn VenueAdapter>],
        filter: Option<&BTreeSet<CanonicalSymbol>>,
    ) -> SymbolUniverse {
        let listings = join_all(adapters.iter().map(|adapter| async move {
            let venue = adapter.venue().clone();
            let outcome = match tokio::time::timeout(self.deadline, self.list_with_retry(adapter.as_ref())).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(%venue, "symbol listing hit the deadline");
                    Outcome::timed_out(0)
                }
            };
            (venue, outcome)
        }))
        .await;

        let mut per_venue = BTreeMap::new();
        let mut unavailable = BTreeMap::new();
        for (venue, outcome) in listings {
            match outcome {
                Outcome::Success(natives) => {
                    let symbols = self.canonicalise(&venue, natives, filter);
                    metrics::gauge!("depthx_symbols_listed", "venue" => venue.to_string()).set(symbols.len() as f64);
                    info!(%venue, symbols = symbols.len(), "venue listed");
                    per_venue.insert(venue, symbols);
                }
                Outcome::RetryableFailure(failure) | Outcome::TerminalFailure(failure) => {
                    warn!(%venue, error = %failure.error, attempts = failure.attempts, "venue unavailable for this run");
                    unavailable.insert(venue, failure);
                }
            }
        }

        let universe = SymbolUniverse::from_parts(per_venue, unavailable);
        info!(
            available = universe.per_venue.len(),
            unavailable = universe.unavailable.len(),
            union = universe.union.len(),
            intersection = universe.intersection.len(),
            "symbol universe resolved"
        );
        universe
    }

    async fn list_with_retry(&self, adapter: &dyn VenueAdapter) -> Outcome<Vec<NativeSymbol>> {
        let venue = adapter.venue();
        with_retry(self.policy, FetchError::disposition, |_| async move {
            self.limiter.acquire(venue).await?;
            adapter.list_symbols().await
        })
        .await
    }

    fn canonicalise(
        &self,
        venue: &VenueId,
        natives: Vec<NativeSymbol>,
        filter: Option<&BTreeSet<CanonicalSymbol>>,
    ) -> BTreeMap<CanonicalSymbol, SymbolDescriptor> {
        let convention = self.conventions.get(venue).cloned().unwrap_or_default();
        let mut symbols = BTreeMap::new();
        let mut skipped = 0usize;
        for native in natives {
            let Some(canonical) = convention.to_canonical(&native.native, &self.quotes) else {
                skipped += 1;
                continue;
            };
            if filter.is_some_and(|f| !f.contains(&canonical)) {
                continue;
            }
            symbols.entry(canonical.clone()).or_insert(SymbolDescriptor {
                canonical,
                native: native.native,
                contract_size: native.contract_size,
            });
        }
        if skipped > 0 {
            debug!(%venue, skipped, "native symbols not matching the venue convention");
        }
        symbols
    }
}
