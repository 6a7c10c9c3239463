//! Run configuration.
//!
//! Loaded from an optional TOML file and `DEPTHX__*` environment overrides
//! (e.g. `DEPTHX__COLLECTION__LEVELS=50`).

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::market_data::normaliser::SymbolConvention;
use crate::market_data::types::{CanonicalSymbol, VenueId};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub collection: CollectionConfig,
    pub depth: DepthConfig,
    pub retry: RetryConfig,
    pub venues: Vec<VenueConfig>,
}

impl Settings {
    /// Reads `path` (if it exists) and applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix("DEPTHX")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("collection.symbols")
                    .with_list_parse_key("collection.quotes")
                    .with_list_parse_key("depth.cutoffs"),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.collection.validate()?;
        self.depth.validate()?;
        self.retry.validate()?;
        let mut seen = BTreeSet::new();
        for venue in &self.venues {
            venue.validate()?;
            if !seen.insert(venue.id.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate venue id {}", venue.id)));
            }
        }
        Ok(())
    }

    pub fn enabled_venues(&self) -> impl Iterator<Item = &VenueConfig> {
        self.venues.iter().filter(|v| v.enabled)
    }
}

/// Which symbols are collected once the universe is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SymbolScope {
    /// Symbols tradable on every available venue.
    #[default]
    Intersection,
    /// Every symbol seen anywhere, fetched where listed.
    Union,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Depth levels requested per side.
    pub levels: usize,
    /// Global cap on concurrently running fetches.
    pub max_in_flight: usize,
    /// Deadline for each phase (listing, depth collection).
    pub deadline_ms: u64,
    pub scope: SymbolScope,
    /// Optional explicit symbol filter; empty means the whole universe.
    pub symbols: Vec<CanonicalSymbol>,
    /// Quote assets used to split concatenated native symbols.
    pub quotes: Vec<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            levels: 20,
            max_in_flight: 16,
            deadline_ms: 120_000,
            scope: SymbolScope::Intersection,
            symbols: Vec::new(),
            quotes: vec!["USDT".into(), "USDC".into(), "USD".into()],
        }
    }
}

impl CollectionConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn symbol_filter(&self) -> Option<BTreeSet<CanonicalSymbol>> {
        (!self.symbols.is_empty()).then(|| self.symbols.iter().cloned().collect())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.levels == 0 {
            return Err(ConfigError::Invalid("collection.levels must be > 0".into()));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid("collection.max_in_flight must be > 0".into()));
        }
        if self.deadline_ms == 0 {
            return Err(ConfigError::Invalid("collection.deadline_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// Whether cumulative volumes are summed in base units or quote notional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VolumeUnit {
    #[default]
    Base,
    Quote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    /// Level counts over which volume is summed, e.g. `[1, 3, 20]`.
    pub cutoffs: Vec<usize>,
    pub unit: VolumeUnit,
    pub risk: RiskThresholds,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self { cutoffs: vec![1, 3, 20], unit: VolumeUnit::Base, risk: RiskThresholds::default() }
    }
}

impl DepthConfig {
    /// Cutoffs sorted ascending without duplicates.
    pub fn sorted_cutoffs(&self) -> Vec<usize> {
        self.cutoffs.iter().copied().sorted_unstable().dedup().collect()
    }

    pub fn largest_cutoff(&self) -> usize {
        self.cutoffs.iter().copied().max().unwrap_or(1)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cutoffs.is_empty() {
            return Err(ConfigError::Invalid("depth.cutoffs must not be empty".into()));
        }
        if self.cutoffs.contains(&0) {
            return Err(ConfigError::Invalid("depth.cutoffs must be > 0".into()));
        }
        self.risk.validate()
    }
}

/// Largest-cutoff volume bounds: below `high_below` is high risk, below
/// `medium_below` is medium risk, anything else low risk.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RiskThresholds {
    pub high_below: f64,
    pub medium_below: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self { high_below: 10.0, medium_below: 100.0 }
    }
}

impl RiskThresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        let finite = self.high_below.is_finite() && self.medium_below.is_finite();
        if !finite || self.high_below < 0.0 || self.high_below > self.medium_below {
            return Err(ConfigError::Invalid(format!(
                "depth.risk requires 0 <= high_below <= medium_below, got {} / {}",
                self.high_below, self.medium_below
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 500, backoff_factor: 2.0, max_delay_ms: 10_000, jitter: true }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be >= 1".into()));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid("retry.backoff_factor must be >= 1.0".into()));
        }
        Ok(())
    }
}

/// Supported venue integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    Binance,
    Okx,
    Gate,
    Mexc,
    Bingx,
    Weex,
    Bybit,
    Bitunix,
    Blofin,
}

impl VenueKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            VenueKind::Binance => "https://fapi.binance.com",
            VenueKind::Okx => "https://www.okx.com",
            VenueKind::Gate => "https://api.gateio.ws",
            VenueKind::Mexc => "https://contract.mexc.com",
            VenueKind::Bingx => "https://open-api.bingx.com",
            VenueKind::Weex => "https://api-contract.weex.com",
            VenueKind::Bybit => "https://api.bybit.com",
            VenueKind::Bitunix => "https://fapi.bitunix.com",
            VenueKind::Blofin => "https://openapi.blofin.com",
        }
    }

    pub fn default_convention(self) -> SymbolConvention {
        match self {
            VenueKind::Binance | VenueKind::Bybit | VenueKind::Bitunix => SymbolConvention::concatenated(),
            VenueKind::Okx => SymbolConvention::separated("-").with_suffix("-SWAP"),
            VenueKind::Gate | VenueKind::Mexc => SymbolConvention::separated("_"),
            VenueKind::Bingx | VenueKind::Blofin => SymbolConvention::separated("-"),
            VenueKind::Weex => SymbolConvention::concatenated().with_prefix("cmt_"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub id: VenueId,
    pub kind: VenueKind,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Token refill rate.
    #[serde(default = "default_rps")]
    pub requests_per_second: f64,
    /// Token bucket capacity.
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Longest a caller waits for a permit before `RateLimitTimeout`.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Overrides the kind's default symbol spelling.
    #[serde(default)]
    pub symbols: Option<SymbolConvention>,
}

fn default_rps() -> f64 {
    5.0
}
fn default_burst() -> u32 {
    5
}
fn default_max_wait_ms() -> u64 {
    30_000
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_enabled() -> bool {
    true
}

impl VenueConfig {
    pub fn new(id: &str, kind: VenueKind) -> Self {
        Self {
            id: VenueId::from(id),
            kind,
            base_url: None,
            requests_per_second: default_rps(),
            burst: default_burst(),
            max_wait_ms: default_max_wait_ms(),
            timeout_ms: default_timeout_ms(),
            enabled: true,
            symbols: None,
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or_else(|| self.kind.default_base_url())
    }

    pub fn convention(&self) -> SymbolConvention {
        self.symbols.clone().unwrap_or_else(|| self.kind.default_convention())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(ConfigError::Invalid(format!("venue {}: requests_per_second must be > 0", self.id)));
        }
        if self.burst == 0 {
            return Err(ConfigError::Invalid(format!("venue {}: burst must be > 0", self.id)));
        }
        Ok(())
    }
}
