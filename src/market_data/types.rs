//! Canonical market-data model shared by every venue adapter.
//!
//! Adapters translate wire payloads into these types; nothing downstream of
//! an adapter ever sees a venue-native symbol or level encoding.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifier of a configured venue (e.g. "binance").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(String);

impl VenueId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VenueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Venue-independent instrument identifier, rendered as `BASE/QUOTE`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalSymbol {
    base: String,
    quote: String,
}

impl CanonicalSymbol {
    /// Builds a symbol from its two assets. Both are upper-cased; empty or
    /// non-alphanumeric assets are rejected.
    pub fn new(base: &str, quote: &str) -> Option<Self> {
        let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid(base) || !valid(quote) {
            return None;
        }
        Some(Self {
            base: base.to_ascii_uppercase(),
            quote: quote.to_ascii_uppercase(),
        })
    }
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid symbol {0:?}: expected BASE/QUOTE")]
pub struct ParseSymbolError(pub String);

impl FromStr for CanonicalSymbol {
    type Err = ParseSymbolError;

    /// Accepts `/`, `_` and `-` as the asset separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .split_once(['/', '_', '-'])
            .and_then(|(base, quote)| CanonicalSymbol::new(base, quote))
            .ok_or_else(|| ParseSymbolError(s.to_string()))
    }
}

impl Serialize for CanonicalSymbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanonicalSymbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A venue-native symbol as reported by `VenueAdapter::list_symbols`, before
/// canonicalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSymbol {
    pub native: String,
    /// Base-asset units represented by one size unit on the wire.
    pub contract_size: f64,
}

impl NativeSymbol {
    pub fn new(native: impl Into<String>) -> Self {
        Self { native: native.into(), contract_size: 1.0 }
    }

    pub fn with_contract_size(mut self, contract_size: f64) -> Self {
        self.contract_size = contract_size;
        self
    }
}

/// A symbol confirmed tradable on one venue, with its native alias.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolDescriptor {
    pub canonical: CanonicalSymbol,
    pub native: String,
    pub contract_size: f64,
}

/// One (price, size) pair. Size is expressed in base-asset units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

impl Level {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bid => f.write_str("bid"),
            BookSide::Ask => f.write_str("ask"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("{side} level {index} has invalid price {price}")]
    InvalidPrice { side: BookSide, index: usize, price: f64 },

    #[error("{side} level {index} has invalid size {size}")]
    InvalidSize { side: BookSide, index: usize, size: f64 },

    #[error("{side} levels not strictly ordered at index {index}: {previous} then {price}")]
    NotMonotonic { side: BookSide, index: usize, previous: f64, price: f64 },
}

/// Immutable order-book depth captured from one venue for one symbol.
///
/// Bids are strictly decreasing in price, asks strictly increasing. The only
/// way to build one is [`DepthSnapshot::new`], which enforces that.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthSnapshot {
    venue: VenueId,
    symbol: CanonicalSymbol,
    timestamp: DateTime<Utc>,
    bids: Vec<Level>,
    asks: Vec<Level>,
}

impl DepthSnapshot {
    pub fn new(
        venue: VenueId,
        symbol: CanonicalSymbol,
        timestamp: DateTime<Utc>,
        bids: Vec<Level>,
        asks: Vec<Level>,
    ) -> Result<Self, SnapshotError> {
        validate_side(BookSide::Bid, &bids)?;
        validate_side(BookSide::Ask, &asks)?;
        Ok(Self { venue, symbol, timestamp, bids, asks })
    }

    pub fn venue(&self) -> &VenueId {
        &self.venue
    }

    pub fn symbol(&self) -> &CanonicalSymbol {
        &self.symbol
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn bids(&self) -> &[Level] {
        &self.bids
    }

    pub fn asks(&self) -> &[Level] {
        &self.asks
    }

    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }

    /// Best ask minus best bid; `None` when either side is empty.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((ask.price + bid.price) / 2.0),
            _ => None,
        }
    }
}

fn validate_side(side: BookSide, levels: &[Level]) -> Result<(), SnapshotError> {
    for (index, level) in levels.iter().enumerate() {
        if !level.price.is_finite() || level.price <= 0.0 {
            return Err(SnapshotError::InvalidPrice { side, index, price: level.price });
        }
        if !level.size.is_finite() || level.size < 0.0 {
            return Err(SnapshotError::InvalidSize { side, index, size: level.size });
        }
        if index > 0 {
            let previous = levels[index - 1].price;
            let ordered = match side {
                BookSide::Bid => level.price < previous,
                BookSide::Ask => level.price > previous,
            };
            if !ordered {
                return Err(SnapshotError::NotMonotonic { side, index, previous, price: level.price });
            }
        }
    }
    Ok(())
}
