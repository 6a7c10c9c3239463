//! Per-snapshot liquidity metrics.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{DepthConfig, RiskThresholds, VolumeUnit};
use crate::market_data::types::{CanonicalSymbol, DepthSnapshot, Level, VenueId};
use crate::retry::FetchOutcome;

/// Ordinal liquidity risk. `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Step function of cumulative volume; non-increasing in `volume`.
    pub fn classify(volume: f64, thresholds: &RiskThresholds) -> Self {
        if volume < thresholds.high_below {
            RiskTier::High
        } else if volume < thresholds.medium_below {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => f.write_str("low"),
            RiskTier::Medium => f.write_str("medium"),
            RiskTier::High => f.write_str("high"),
        }
    }
}

/// Volume summed over the first `levels` levels of each side. Sides with
/// fewer levels contribute what they have.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CutoffVolume {
    pub levels: usize,
    pub bid: f64,
    pub ask: f64,
    pub total: f64,
}

impl CutoffVolume {
    fn over(snapshot: &DepthSnapshot, levels: usize, unit: VolumeUnit) -> Self {
        let bid = side_volume(snapshot.bids(), levels, unit);
        let ask = side_volume(snapshot.asks(), levels, unit);
        Self { levels, bid, ask, total: bid + ask }
    }
}

fn side_volume(side: &[Level], levels: usize, unit: VolumeUnit) -> f64 {
    side.iter()
        .take(levels)
        .map(|l| match unit {
            VolumeUnit::Base => l.size,
            VolumeUnit::Quote => l.size * l.price,
        })
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthMetrics {
    pub venue: VenueId,
    pub symbol: CanonicalSymbol,
    pub timestamp: DateTime<Utc>,
    pub unit: VolumeUnit,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub mid: Option<f64>,
    pub spread: Option<f64>,
    pub spread_bps: Option<f64>,
    pub level1: CutoffVolume,
    /// One entry per configured cutoff, ascending.
    pub cutoffs: Vec<CutoffVolume>,
    /// Volume at the largest cutoff; drives the risk tier.
    pub largest: CutoffVolume,
    /// Bid over ask volume at the largest cutoff; `None` when ask volume is 0.
    pub bid_ask_ratio: Option<f64>,
    /// `(bid - ask) / (bid + ask)` at the largest cutoff.
    pub imbalance: Option<f64>,
    pub risk_tier: RiskTier,
    pub bid_levels: usize,
    pub ask_levels: usize,
}

impl DepthMetrics {
    pub fn cutoff(&self, levels: usize) -> Option<&CutoffVolume> {
        self.cutoffs.iter().find(|c| c.levels == levels)
    }
}

/// Metrics for a successful outcome; failures are skipped.
pub fn compute_metrics(outcome: &FetchOutcome, config: &DepthConfig) -> Option<DepthMetrics> {
    outcome.success().map(|snapshot| metrics_for(snapshot, config))
}

pub fn metrics_for(snapshot: &DepthSnapshot, config: &DepthConfig) -> DepthMetrics {
    let unit = config.unit;
    let cutoffs: Vec<CutoffVolume> =
        config.sorted_cutoffs().into_iter().map(|n| CutoffVolume::over(snapshot, n, unit)).collect();
    let largest = CutoffVolume::over(snapshot, config.largest_cutoff(), unit);
    let level1 = CutoffVolume::over(snapshot, 1, unit);

    let mid = snapshot.mid();
    let spread = snapshot.spread();
    let spread_bps = match (spread, mid) {
        (Some(s), Some(m)) if m > 0.0 => Some(s / m * 10_000.0),
        _ => None,
    };
    let bid_ask_ratio = (largest.ask > 0.0).then(|| largest.bid / largest.ask);
    let imbalance = (largest.total > 0.0).then(|| (largest.bid - largest.ask) / largest.total);

    DepthMetrics {
        venue: snapshot.venue().clone(),
        symbol: snapshot.symbol().clone(),
        timestamp: snapshot.timestamp(),
        unit,
        best_bid: snapshot.best_bid().map(|l| l.price),
        best_ask: snapshot.best_ask().map(|l| l.price),
        mid,
        spread,
        spread_bps,
        level1,
        cutoffs,
        largest,
        bid_ask_ratio,
        imbalance,
        risk_tier: RiskTier::classify(largest.total, &config.risk),
        bid_levels: snapshot.bids().len(),
        ask_levels: snapshot.asks().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::retry::{FetchFailure, Outcome};
    use crate::testutil::snapshot;
    use proptest::prelude::*;

    fn config(cutoffs: &[usize]) -> DepthConfig {
        DepthConfig { cutoffs: cutoffs.to_vec(), ..DepthConfig::default() }
    }

    #[test]
    fn test_level1_and_cumulative_sums() {
        let snap = snapshot("a", "BTC/USDT", &[(100.0, 2.0), (99.0, 3.0)], &[(101.0, 1.0)]);
        let m = metrics_for(&snap, &config(&[1, 2]));
        assert_eq!(m.level1.total, 3.0);
        assert_eq!(m.level1.bid, 2.0);
        assert_eq!(m.level1.ask, 1.0);
        // Only one ask level exists; nothing is padded in.
        assert_eq!(m.cutoff(2).unwrap().bid, 5.0);
        assert_eq!(m.cutoff(2).unwrap().ask, 1.0);
        assert_eq!(m.bid_ask_ratio, Some(5.0));
        assert_eq!(m.spread, Some(1.0));
        assert_eq!(m.bid_levels, 2);
    }

    #[test]
    fn test_ratio_undefined_without_ask_volume() {
        let snap = snapshot("a", "BTC/USDT", &[(100.0, 2.0)], &[]);
        let m = metrics_for(&snap, &config(&[1, 3]));
        assert_eq!(m.bid_ask_ratio, None);
        assert_eq!(m.imbalance, Some(1.0));
        assert_eq!(m.spread_bps, None);
    }

    #[test]
    fn test_quote_unit_uses_notional() {
        let snap = snapshot("a", "BTC/USDT", &[(100.0, 2.0)], &[(101.0, 1.0)]);
        let cfg = DepthConfig { unit: VolumeUnit::Quote, ..config(&[1]) };
        assert_eq!(metrics_for(&snap, &cfg).level1.total, 301.0);
    }

    #[test]
    fn test_risk_tier_step_function() {
        let t = RiskThresholds { high_below: 10.0, medium_below: 100.0 };
        assert_eq!(RiskTier::classify(0.0, &t), RiskTier::High);
        assert_eq!(RiskTier::classify(9.99, &t), RiskTier::High);
        assert_eq!(RiskTier::classify(10.0, &t), RiskTier::Medium);
        assert_eq!(RiskTier::classify(100.0, &t), RiskTier::Low);
        assert!(RiskTier::Low < RiskTier::High);
    }

    #[test]
    fn test_failures_are_skipped() {
        let outcome: FetchOutcome =
            Outcome::TerminalFailure(FetchFailure { error: FetchError::malformed("x"), attempts: 1 });
        assert!(compute_metrics(&outcome, &DepthConfig::default()).is_none());
        let outcome: FetchOutcome = Outcome::Success(snapshot("a", "BTC/USDT", &[(1.0, 1.0)], &[(2.0, 1.0)]));
        assert!(compute_metrics(&outcome, &DepthConfig::default()).is_some());
    }

    proptest! {
        #[test]
        fn prop_volume_monotone_in_cutoff(sizes in prop::collection::vec(0.0f64..100.0, 1..40)) {
            let bids: Vec<(f64, f64)> = sizes.iter().enumerate().map(|(i, s)| (1000.0 - i as f64, *s)).collect();
            let asks: Vec<(f64, f64)> = sizes.iter().enumerate().map(|(i, s)| (1001.0 + i as f64, *s)).collect();
            let snap = snapshot("p", "BTC/USDT", &bids, &asks);
            let m = metrics_for(&snap, &config(&[1, 3, 5, 10, 20, 50]));
            prop_assert!(m.cutoffs.windows(2).all(|w| w[0].total <= w[1].total));
        }

        #[test]
        fn prop_tier_non_increasing_in_volume(a in 0.0f64..1e6, b in 0.0f64..1e6) {
            let t = RiskThresholds::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(RiskTier::classify(hi, &t) <= RiskTier::classify(lo, &t));
        }
    }
}
