//! One collection run: resolve -> plan -> collect -> metrics -> comparison.

pub mod stats;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::analytics::comparison::{build_comparison, group_metrics, ComparisonRow};
use crate::analytics::depth_metrics::compute_metrics;
use crate::config::{Settings, SymbolScope};
use crate::error::Result;
use crate::market_data::adapters::{build_adapters, VenueAdapter};
use crate::market_data::collector::{plan, DepthCollector, PairOutcome};
use crate::market_data::resolver::{SymbolResolver, SymbolUniverse};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

pub use stats::{ListingStatus, VenueStats};

/// Everything a run produces, handed to external consumers as-is.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub generated_at: DateTime<Utc>,
    pub scope: SymbolScope,
    pub universe: SymbolUniverse,
    /// Exactly one entry per requested (venue, symbol) pair, ordered by venue
    /// then symbol.
    pub outcomes: Vec<PairOutcome>,
    pub comparison: Vec<ComparisonRow>,
    pub venue_stats: Vec<VenueStats>,
}

impl Dataset {
    pub fn failures(&self) -> impl Iterator<Item = &PairOutcome> {
        self.outcomes.iter().filter(|p| !p.outcome.is_success())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

pub struct Engine {
    settings: Settings,
    adapters: Vec<Arc<dyn VenueAdapter>>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl Engine {
    /// Engine over the venues enabled in `settings`, with live HTTP adapters.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let adapters = build_adapters(&settings)?;
        Self::new(settings, adapters)
    }

    /// Engine over caller-supplied adapters. Rate budgets and symbol
    /// conventions still come from the matching `settings.venues` entries.
    pub fn new(settings: Settings, adapters: Vec<Arc<dyn VenueAdapter>>) -> Result<Self> {
        settings.validate()?;
        let limiter = RateLimiter::from_venues(settings.enabled_venues())?;
        let policy = RetryPolicy::from(&settings.retry);
        Ok(Self { settings, adapters, limiter: Arc::new(limiter), policy })
    }

    #[instrument(skip(self), fields(venues = self.adapters.len()))]
    pub async fn run(&self) -> Dataset {
        let collection = &self.settings.collection;
        let conventions: HashMap<_, _> =
            self.settings.enabled_venues().map(|v| (v.id.clone(), v.convention())).collect();

        let resolver = SymbolResolver::new(
            &self.limiter,
            &self.policy,
            conventions,
            collection.quotes.clone(),
            collection.deadline(),
        );
        let filter = collection.symbol_filter();
        let universe = resolver.resolve(&self.adapters, filter.as_ref()).await;

        let symbols = universe.symbols(collection.scope).clone();
        let requests = plan(&universe, &symbols);
        info!(symbols = symbols.len(), pairs = requests.len(), scope = ?collection.scope, "collecting depth");

        let collector = DepthCollector::new(
            &self.adapters,
            self.limiter.clone(),
            self.policy.clone(),
            collection.levels,
            collection.max_in_flight,
            collection.deadline(),
        );
        let outcomes: Vec<PairOutcome> = collector.collect(requests).await.into_values().collect();

        let metrics = outcomes.iter().filter_map(|p| compute_metrics(&p.outcome, &self.settings.depth));
        let comparison = build_comparison(&group_metrics(metrics));
        let venue_stats = stats::venue_stats(&universe, &outcomes);

        info!(
            rows = comparison.len(),
            failures = outcomes.iter().filter(|p| !p.outcome.is_success()).count(),
            "run complete"
        );
        Dataset { generated_at: Utc::now(), scope: collection.scope, universe, outcomes, comparison, venue_stats }
    }
}
