//! Cross-venue comparison table.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::analytics::depth_metrics::{DepthMetrics, RiskTier};
use crate::market_data::types::{CanonicalSymbol, VenueId};

pub type MetricsBySymbol = BTreeMap<CanonicalSymbol, BTreeMap<VenueId, DepthMetrics>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub symbol: CanonicalSymbol,
    /// Ascending tier, then descending volume, then venue id.
    pub venues: Vec<DepthMetrics>,
    pub best_liquidity: VenueId,
    pub best_liquidity_volume: f64,
    /// `None` when no venue has both sides.
    pub tightest_spread: Option<VenueId>,
    pub tightest_spread_bps: Option<f64>,
    /// Tier of the best-liquidity venue.
    pub risk_tier: RiskTier,
}

/// Groups metrics by symbol and venue.
pub fn group_metrics(metrics: impl IntoIterator<Item = DepthMetrics>) -> MetricsBySymbol {
    let mut grouped = MetricsBySymbol::new();
    for m in metrics {
        grouped.entry(m.symbol.clone()).or_default().insert(m.venue.clone(), m);
    }
    grouped
}

/// Rows ordered by ascending risk tier, descending best-liquidity volume,
/// then symbol. The output depends only on the input values, never on the
/// order results arrived in.
pub fn build_comparison(metrics: &MetricsBySymbol) -> Vec<ComparisonRow> {
    let mut rows: Vec<ComparisonRow> = metrics.iter().filter_map(|(symbol, by_venue)| row(symbol, by_venue)).collect();
    rows.sort_by(|a, b| {
        (a.risk_tier, Reverse(OrderedFloat(a.best_liquidity_volume)), &a.symbol).cmp(&(
            b.risk_tier,
            Reverse(OrderedFloat(b.best_liquidity_volume)),
            &b.symbol,
        ))
    });
    rows
}

fn row(symbol: &CanonicalSymbol, by_venue: &BTreeMap<VenueId, DepthMetrics>) -> Option<ComparisonRow> {
    let mut venues: Vec<DepthMetrics> = by_venue.values().cloned().collect();
    venues.sort_by(|a, b| {
        (a.risk_tier, Reverse(OrderedFloat(a.largest.total)), &a.venue).cmp(&(
            b.risk_tier,
            Reverse(OrderedFloat(b.largest.total)),
            &b.venue,
        ))
    });

    let best = venues
        .iter()
        .min_by(|a, b| {
            (Reverse(OrderedFloat(a.largest.total)), &a.venue).cmp(&(Reverse(OrderedFloat(b.largest.total)), &b.venue))
        })?
        .clone();
    let tightest = venues
        .iter()
        .filter_map(|m| m.spread_bps.map(|bps| (OrderedFloat(bps), &m.venue)))
        .min();

    Some(ComparisonRow {
        symbol: symbol.clone(),
        best_liquidity: best.venue,
        best_liquidity_volume: best.largest.total,
        tightest_spread: tightest.map(|(_, v)| v.clone()),
        tightest_spread_bps: tightest.map(|(bps, _)| bps.into_inner()),
        risk_tier: best.risk_tier,
        venues,
    })
}
